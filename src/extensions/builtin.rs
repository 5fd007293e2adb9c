use std::sync::Arc;

use async_trait::async_trait;

use super::Extension;
use crate::commands::{admin, help, info, tts};
use crate::config::Config;
use crate::help::{CommandInfo, HelpMetadata};

/// Module name of the commands that ship with the runtime itself.
pub const CORE_MODULE: &str = "main";

pub const INFO_EXTENSION: &str = "cogs.meta.info";
pub const TTS_EXTENSION: &str = "cogs.requesters.tts";

/// Always-on commands, registered outside the extension lifecycle.
pub fn core_commands() -> Vec<CommandInfo> {
    vec![
        CommandInfo::from_poise(&admin::reload(), CORE_MODULE).metadata(
            HelpMetadata::new("Reloads every known extension.").example("reload"),
        ),
        CommandInfo::from_poise(&admin::extensions(), CORE_MODULE).metadata(
            HelpMetadata::new("Lists extensions and whether they are loaded.").example("extensions"),
        ),
        CommandInfo::from_poise(&admin::exit(), CORE_MODULE).metadata(
            HelpMetadata::new("Records the session and logs the bot out.").example("exit"),
        ),
        CommandInfo::from_poise(&help::help(), CORE_MODULE).metadata(
            HelpMetadata::new("Shows help for every command, or for one.")
                .example("help")
                .example("help tts"),
        ),
    ]
}

/// Discovery step: every extension the runtime knows how to load.
pub fn discover(config: &Config) -> Vec<Arc<dyn Extension>> {
    vec![
        Arc::new(InfoExtension) as Arc<dyn Extension>,
        Arc::new(TtsExtension::new(config.tts_enabled())),
    ]
}

pub struct InfoExtension;

#[async_trait]
impl Extension for InfoExtension {
    fn id(&self) -> &str {
        INFO_EXTENSION
    }

    async fn register(&self) -> anyhow::Result<Vec<CommandInfo>> {
        Ok(vec![
            CommandInfo::from_poise(&info::invite(), INFO_EXTENSION),
            CommandInfo::from_poise(&info::info(), INFO_EXTENSION),
        ])
    }
}

pub struct TtsExtension {
    has_credentials: bool,
}

impl TtsExtension {
    pub fn new(has_credentials: bool) -> Self {
        Self { has_credentials }
    }
}

#[async_trait]
impl Extension for TtsExtension {
    fn id(&self) -> &str {
        TTS_EXTENSION
    }

    async fn register(&self) -> anyhow::Result<Vec<CommandInfo>> {
        if !self.has_credentials {
            anyhow::bail!("GOOGLE_TTS_API_KEY is not set, TTS is disabled");
        }
        Ok(vec![CommandInfo::from_poise(&tts::tts(), TTS_EXTENSION)])
    }
}
