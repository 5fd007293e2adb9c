use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AudioError, SessionState, Synthesizer, VoiceGateway};
use crate::rate_limiter::RateLimiter;

/// Serializes speech playback per guild.
///
/// Only non-idle sessions have an entry in `sessions`; claiming a guild is a
/// single `entry` call, so two requests for the same guild cannot both get
/// past the busy check. Sessions for different guilds never wait on each
/// other.
pub struct AudioCoordinator {
    sessions: DashMap<u64, SessionState>,
    gateway: Arc<dyn VoiceGateway>,
    synthesizer: Arc<dyn Synthesizer>,
    limiter: RateLimiter,
}

/// Holds a guild's session; dropping it returns the guild to `Idle`.
struct SessionGuard<'a> {
    sessions: &'a DashMap<u64, SessionState>,
    guild: u64,
}

impl SessionGuard<'_> {
    fn advance(&self, state: SessionState) {
        debug!("Audio session in guild {} -> {:?}", self.guild, state);
        self.sessions.insert(self.guild, state);
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.sessions.remove(&self.guild);
        debug!("Audio session in guild {} -> Idle", self.guild);
    }
}

impl AudioCoordinator {
    pub fn new(
        gateway: Arc<dyn VoiceGateway>,
        synthesizer: Arc<dyn Synthesizer>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            gateway,
            synthesizer,
            limiter,
        }
    }

    pub fn state(&self, guild: u64) -> SessionState {
        self.sessions
            .get(&guild)
            .map(|state| *state)
            .unwrap_or(SessionState::Idle)
    }

    /// Speaks `text` in the requester's voice channel and returns once
    /// playback has finished.
    pub async fn request(&self, guild: u64, requester: u64, text: &str) -> Result<(), AudioError> {
        self.limiter
            .check(requester)
            .map_err(|retry_after| AudioError::RateLimited { retry_after })?;

        let channel = self
            .gateway
            .voice_channel_of(guild, requester)
            .ok_or(AudioError::NoVoiceChannel)?;

        let existing = self.gateway.connection(guild);
        let initial = if existing.is_some() {
            SessionState::Synthesizing
        } else {
            SessionState::Connecting
        };
        let session = self.claim(guild, initial)?;

        let connection = match existing {
            Some(connection) => connection,
            None => {
                info!("Joining voice channel {} in guild {}", channel, guild);
                self.gateway.connect(guild, channel).await.map_err(|e| {
                    warn!("Voice connection in guild {} failed: {:#}", guild, e);
                    AudioError::ConnectFailed(e.to_string())
                })?
            }
        };

        session.advance(SessionState::Synthesizing);
        let synthesizer = self.synthesizer.clone();
        let text = text.to_owned();
        let audio = tokio::task::spawn_blocking(move || synthesizer.synthesize(&text))
            .await
            .map_err(|e| AudioError::SynthesisFailed(e.to_string()))?
            .map_err(|e| {
                warn!("Speech synthesis for guild {} failed: {:#}", guild, e);
                AudioError::SynthesisFailed(e.to_string())
            })?;

        session.advance(SessionState::Playing);
        let mut playback = connection
            .play(audio)
            .await
            .map_err(|e| AudioError::PlaybackFailed(e.to_string()))?;
        let outcome = playback.finished().await;
        if let Err(e) = playback.stop() {
            debug!("Stopping finished track in guild {}: {:#}", guild, e);
        }

        outcome.map_err(|e| {
            warn!("Playback in guild {} failed: {:#}", guild, e);
            AudioError::PlaybackFailed(e.to_string())
        })
    }

    fn claim(&self, guild: u64, initial: SessionState) -> Result<SessionGuard<'_>, AudioError> {
        match self.sessions.entry(guild) {
            Entry::Occupied(_) => Err(AudioError::SessionBusy),
            Entry::Vacant(slot) => {
                slot.insert(initial);
                debug!("Audio session in guild {} -> {:?}", guild, initial);
                Ok(SessionGuard {
                    sessions: &self.sessions,
                    guild,
                })
            }
        }
    }
}
