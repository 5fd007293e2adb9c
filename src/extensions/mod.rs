//! Dynamically loadable command modules.
//!
//! An [`Extension`] contributes a set of commands when it is loaded. The
//! [`ExtensionRegistry`] owns every extension discovered at startup, tracks
//! which ones are loaded and keeps the help index in step with them.

pub mod builtin;
pub mod registry;

pub use registry::{ExtensionRegistry, ReloadReport};

use async_trait::async_trait;
use thiserror::Error;

use crate::help::CommandInfo;

#[async_trait]
pub trait Extension: Send + Sync {
    /// Dotted identifier, e.g. `cogs.requesters.tts`
    fn id(&self) -> &str;

    /// Sets the extension up and returns the commands it contributes.
    async fn register(&self) -> anyhow::Result<Vec<CommandInfo>>;

    /// Releases whatever `register` acquired.
    async fn deregister(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionState {
    Unloaded,
    Loaded,
    /// Last load attempt failed; the message is the captured cause
    FailedLoad(String),
}

impl ExtensionState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ExtensionState::Loaded)
    }
}

impl std::fmt::Display for ExtensionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtensionState::Unloaded => write!(f, "unloaded"),
            ExtensionState::Loaded => write!(f, "loaded"),
            ExtensionState::FailedLoad(cause) => write!(f, "failed: {}", cause),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("extension `{0}` is already loaded")]
    AlreadyLoaded(String),
    #[error("extension `{0}` is not loaded")]
    NotLoaded(String),
    #[error("no extension named `{0}` was discovered")]
    UnknownExtension(String),
    #[error("extension `{id}` failed to load: {cause}")]
    LoadFailed {
        id: String,
        #[source]
        cause: anyhow::Error,
    },
    #[error("extension `{id}` declares `{command}`, which is already taken")]
    CommandConflict { id: String, command: String },
}
