pub mod admin;
pub mod help;
pub mod info;
pub mod tts;

use crate::{Context, Data, Error};
use tracing::{debug, error};

/// Every command the framework knows about. Whether one may actually run is
/// decided per invocation by [`check_available`].
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        admin::reload(),
        admin::extensions(),
        admin::exit(),
        help::help(),
        info::invite(),
        info::info(),
        tts::tts(),
    ]
}

/// Only commands owned by a loaded extension (or the core) are dispatched.
pub async fn check_available(ctx: Context<'_>) -> Result<bool, Error> {
    let root = ctx
        .parent_commands()
        .first()
        .map(|command| command.name.as_str())
        .unwrap_or(ctx.command().name.as_str());
    Ok(ctx.data().extensions.is_command_available(root))
}

pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {}", ctx.command().name, error);
            let _ = ctx.say(format!("❌ {}", error)).await;
        }
        poise::FrameworkError::CommandCheckFailed { ctx, .. } => {
            debug!("Command `{}` is not available, ignoring", ctx.command().name);
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}
