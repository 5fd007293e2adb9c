//! Command metadata and the help index derived from it.
//!
//! Every command contributed by an extension is described by a [`CommandInfo`].
//! Help text comes either from a structured [`HelpMetadata`] record or from a
//! legacy documentation block that the parser scans for an examples section.

pub mod index;
pub mod parser;

pub use index::{HelpIndex, ModuleHelp};
pub use parser::{parse_help, ParsedHelp, EXAMPLES_MARKER};

use thiserror::Error;

use crate::{Data, Error};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HelpError {
    #[error("command `{command}` in `{module}` has no `Command examples:` section")]
    MalformedMetadata { module: String, command: String },
}

/// Structured help attached to a command at registration time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelpMetadata {
    pub description: String,
    /// Invocations without the prefix, e.g. `tts hello there`
    pub examples: Vec<String>,
}

impl HelpMetadata {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            examples: Vec::new(),
        }
    }

    pub fn example(mut self, invocation: impl Into<String>) -> Self {
        self.examples.push(invocation.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelpSource {
    /// Free-text documentation block
    Docs(String),
    Metadata(HelpMetadata),
}

/// A command as seen by the registry, dispatch gate and help index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: String,
    pub aliases: Vec<String>,
    pub enabled: bool,
    pub hidden: bool,
    /// Identifier of the owning module (extension id, or `main` for core commands)
    pub module: String,
    pub subcommands: Vec<String>,
    pub help: HelpSource,
    /// Lets this command's aliases share names with other commands' aliases
    pub allow_alias_overlap: bool,
}

impl CommandInfo {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            enabled: true,
            hidden: false,
            module: module.into(),
            subcommands: Vec::new(),
            help: HelpSource::Docs(String::new()),
            allow_alias_overlap: false,
        }
    }

    /// Builds the descriptor from a poise command: name, aliases, visibility,
    /// subcommands and its doc comment as the documentation block.
    pub fn from_poise(command: &poise::Command<Data, Error>, module: impl Into<String>) -> Self {
        let docs = match (&command.description, &command.help_text) {
            (Some(description), Some(help_text)) => format!("{}\n{}", description, help_text),
            (Some(description), None) => description.clone(),
            (None, Some(help_text)) => format!("\n{}", help_text),
            (None, None) => String::new(),
        };

        Self {
            name: command.name.clone(),
            aliases: command.aliases.clone(),
            enabled: true,
            hidden: command.hide_in_help,
            module: module.into(),
            subcommands: command.subcommands.iter().map(|c| c.name.clone()).collect(),
            help: HelpSource::Docs(docs),
            allow_alias_overlap: false,
        }
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn subcommands<I, S>(mut self, subcommands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subcommands = subcommands.into_iter().map(Into::into).collect();
        self
    }

    pub fn docs(mut self, docs: impl Into<String>) -> Self {
        self.help = HelpSource::Docs(docs.into());
        self
    }

    pub fn metadata(mut self, metadata: HelpMetadata) -> Self {
        self.help = HelpSource::Metadata(metadata);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn allow_alias_overlap(mut self) -> Self {
        self.allow_alias_overlap = true;
        self
    }

    /// True when `name` is this command's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }

    pub fn is_listed(&self) -> bool {
        self.enabled && !self.hidden
    }
}
