//! Text-to-speech playback, one exclusive session per guild.

pub mod coordinator;
pub mod google;
pub mod voice;

pub use coordinator::AudioCoordinator;
pub use google::GoogleTts;
pub use voice::SongbirdGateway;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Synthesizing,
    Playing,
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Cannot play anything since some audio is currently running.")]
    SessionBusy,
    #[error("You are being rate limited, try again in {}s.", .retry_after.as_secs().max(1))]
    RateLimited { retry_after: Duration },
    #[error("You must be in a voice channel to use this command.")]
    NoVoiceChannel,
    #[error("Could not connect to the voice channel: {0}")]
    ConnectFailed(String),
    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),
}

impl AudioError {
    /// Rejections happen before any session state is touched.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AudioError::SessionBusy | AudioError::RateLimited { .. } | AudioError::NoVoiceChannel
        )
    }
}

/// Turns text into encoded audio. Blocking; always called from the blocking pool.
pub trait Synthesizer: Send + Sync + 'static {
    fn synthesize(&self, text: &str) -> anyhow::Result<Vec<u8>>;
}

#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Voice channel `user` currently sits in, if any.
    fn voice_channel_of(&self, guild: u64, user: u64) -> Option<u64>;

    /// Existing connection for the guild.
    fn connection(&self, guild: u64) -> Option<Arc<dyn VoiceConnection>>;

    async fn connect(&self, guild: u64, channel: u64) -> anyhow::Result<Arc<dyn VoiceConnection>>;
}

#[async_trait]
pub trait VoiceConnection: Send + Sync {
    async fn play(&self, audio: Vec<u8>) -> anyhow::Result<Box<dyn Playback>>;
}

/// A started track.
#[async_trait]
pub trait Playback: Send {
    /// Resolves once the output source has ended; a track that could not be
    /// decoded or played resolves to an error.
    async fn finished(&mut self) -> anyhow::Result<()>;

    fn stop(&self) -> anyhow::Result<()>;
}
