use async_trait::async_trait;
use serenity::all::{ChannelId, GuildId, UserId};
use serenity::cache::Cache;
use songbird::input::Input;
use songbird::tracks::{PlayMode, TrackHandle};
use songbird::{Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use super::{Playback, VoiceConnection, VoiceGateway};

/// Voice access through the songbird manager registered on the client.
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
    cache: Arc<Cache>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>, cache: Arc<Cache>) -> Self {
        Self { manager, cache }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    fn voice_channel_of(&self, guild: u64, user: u64) -> Option<u64> {
        let guild = self.cache.guild(GuildId::new(guild))?;
        guild
            .voice_states
            .get(&UserId::new(user))
            .and_then(|vs| vs.channel_id)
            .map(|channel| channel.get())
    }

    fn connection(&self, guild: u64) -> Option<Arc<dyn VoiceConnection>> {
        self.manager
            .get(GuildId::new(guild))
            .map(|call| Arc::new(SongbirdConnection { call }) as Arc<dyn VoiceConnection>)
    }

    async fn connect(&self, guild: u64, channel: u64) -> anyhow::Result<Arc<dyn VoiceConnection>> {
        let call = self
            .manager
            .join(GuildId::new(guild), ChannelId::new(channel))
            .await?;
        Ok(Arc::new(SongbirdConnection { call }))
    }
}

struct SongbirdConnection {
    call: Arc<Mutex<Call>>,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn play(&self, audio: Vec<u8>) -> anyhow::Result<Box<dyn Playback>> {
        let track = {
            let mut call = self.call.lock().await;
            call.play_input(Input::from(audio))
        };

        let (tx, done) = oneshot::channel();
        let tx = Arc::new(StdMutex::new(Some(tx)));
        track.add_event(
            Event::Track(TrackEvent::End),
            TrackDoneNotifier::new(tx.clone(), false),
        )?;
        track.add_event(
            Event::Track(TrackEvent::Error),
            TrackDoneNotifier::new(tx, true),
        )?;

        Ok(Box::new(SongbirdPlayback { track, done }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TrackOutcome {
    Ended,
    Failed(String),
}

struct SongbirdPlayback {
    track: TrackHandle,
    done: oneshot::Receiver<TrackOutcome>,
}

#[async_trait]
impl Playback for SongbirdPlayback {
    async fn finished(&mut self) -> anyhow::Result<()> {
        wait_for_outcome(&mut self.done).await
    }

    fn stop(&self) -> anyhow::Result<()> {
        self.track.stop()?;
        Ok(())
    }
}

async fn wait_for_outcome(done: &mut oneshot::Receiver<TrackOutcome>) -> anyhow::Result<()> {
    match done.await {
        Ok(TrackOutcome::Ended) => Ok(()),
        Ok(TrackOutcome::Failed(reason)) => Err(anyhow::anyhow!(reason)),
        // the driver went away before the track finished
        Err(_) => Err(anyhow::anyhow!("voice driver dropped the track")),
    }
}

/// Reports the first `End` or `Error` event of a track. Both handlers share
/// one sender; whichever fires first wins.
struct TrackDoneNotifier {
    tx: Arc<StdMutex<Option<oneshot::Sender<TrackOutcome>>>>,
    errored: bool,
}

impl TrackDoneNotifier {
    fn new(tx: Arc<StdMutex<Option<oneshot::Sender<TrackOutcome>>>>, errored: bool) -> Self {
        Self { tx, errored }
    }

    fn outcome(&self, ctx: &EventContext<'_>) -> TrackOutcome {
        if !self.errored {
            return TrackOutcome::Ended;
        }
        let reason = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(e.to_string()),
                _ => None,
            }),
            _ => None,
        };
        TrackOutcome::Failed(reason.unwrap_or_else(|| "track could not be played".to_string()))
    }
}

#[async_trait]
impl VoiceEventHandler for TrackDoneNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let outcome = self.outcome(ctx);
        debug!("Track done: {:?}", outcome);
        let sender = self.tx.lock().ok().and_then(|mut slot| slot.take());
        if let Some(sender) = sender {
            let _ = sender.send(outcome);
        }
        Some(Event::Cancel)
    }
}
