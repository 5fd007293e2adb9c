use tracing::warn;

use super::{parse_help, CommandInfo, HelpError, ParsedHelp};

/// Help entries of one module, in registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHelp {
    pub name: String,
    pub commands: Vec<(String, ParsedHelp)>,
}

impl ModuleHelp {
    pub fn get(&self, command: &str) -> Option<&ParsedHelp> {
        let key = command.to_lowercase();
        self.commands
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, help)| help)
    }

    fn upsert(&mut self, command: String, help: ParsedHelp) {
        match self.commands.iter_mut().find(|(name, _)| *name == command) {
            Some(entry) => entry.1 = help,
            None => self.commands.push((command, help)),
        }
    }
}

/// Module -> lowercase command name -> rendered help.
///
/// Both levels keep insertion order from the command traversal; nothing is
/// sorted. The index is never patched in place: the registry builds a new one
/// and swaps it in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelpIndex {
    modules: Vec<ModuleHelp>,
}

impl HelpIndex {
    /// Builds the index from commands in registration order.
    ///
    /// Disabled and hidden commands are left out entirely. A command whose
    /// documentation cannot be parsed is skipped and reported in the returned
    /// diagnostics; it never aborts the build.
    pub fn build<'a, I>(commands: I, prefix: &str) -> (Self, Vec<HelpError>)
    where
        I: IntoIterator<Item = &'a CommandInfo>,
    {
        let mut index = HelpIndex::default();
        let mut diagnostics = Vec::new();

        for command in commands {
            if !command.is_listed() {
                continue;
            }

            match parse_help(command, prefix) {
                Ok(help) => index.insert(&command.module, command.name.to_lowercase(), help),
                Err(e) => {
                    warn!("Help index: skipping `{}` from `{}`: {}", command.name, command.module, e);
                    diagnostics.push(e);
                }
            }
        }

        (index, diagnostics)
    }

    fn insert(&mut self, module: &str, command: String, help: ParsedHelp) {
        match self.modules.iter_mut().find(|m| m.name == module) {
            Some(entry) => entry.upsert(command, help),
            None => self.modules.push(ModuleHelp {
                name: module.to_string(),
                commands: vec![(command, help)],
            }),
        }
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleHelp> {
        self.modules.iter()
    }

    pub fn module(&self, name: &str) -> Option<&ModuleHelp> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn get(&self, module: &str, command: &str) -> Option<&ParsedHelp> {
        self.module(module)?.get(command)
    }

    /// Looks a command up across all modules.
    pub fn find(&self, command: &str) -> Option<(&str, &ParsedHelp)> {
        self.modules
            .iter()
            .find_map(|m| m.get(command).map(|help| (m.name.as_str(), help)))
    }

    pub fn contains(&self, command: &str) -> bool {
        self.find(command).is_some()
    }

    /// Number of indexed commands.
    pub fn len(&self) -> usize {
        self.modules.iter().map(|m| m.commands.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
