use tracing::{info, warn};

use crate::audio::AudioError;
use crate::{Context, Error};

/// Speaks a message in your current voice channel.
///
/// Command examples:
///     >>> [prefix]tts Hello there
///     >>> [prefix]tts Graphs are ready
#[poise::command(prefix_command, guild_only, owners_only)]
pub async fn tts(ctx: Context<'_>, #[rest] message: String) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    if message.trim().is_empty() {
        ctx.say("Give me something to say.").await?;
        return Ok(());
    }

    info!("TTS request in guild {} from {}", guild_id, ctx.author().name);
    match ctx
        .data()
        .audio
        .request(guild_id.get(), ctx.author().id.get(), &message)
        .await
    {
        Ok(()) => {}
        Err(e) if e.is_rejection() => {
            ctx.say(e.to_string()).await?;
        }
        Err(e @ AudioError::SynthesisFailed(_)) => {
            warn!("TTS synthesis failed in guild {}: {}", guild_id, e);
            ctx.say("Could not create speech for that message.").await?;
        }
        Err(e) => {
            warn!("TTS playback failed in guild {}: {}", guild_id, e);
            ctx.say(format!("❌ {}", e)).await?;
        }
    }
    Ok(())
}
