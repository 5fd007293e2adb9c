pub mod audio;
pub mod cleanup;
pub mod commands;
pub mod config;
pub mod db;
pub mod extensions;
pub mod help;
pub mod rate_limiter;

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Runtime context passed to all commands
pub struct Data {
    pub config: config::Config,
    pub db: db::Database,
    pub extensions: Arc<extensions::ExtensionRegistry>,
    pub audio: Arc<audio::AudioCoordinator>,
    /// Moment the gateway reported ready; paired with the logout time on exit
    pub startup_time: DateTime<Utc>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
