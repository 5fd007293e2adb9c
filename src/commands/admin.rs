use crate::extensions::ExtensionState;
use crate::{Context, Error};
use chrono::Utc;
use std::time::Duration;
use tracing::{info, warn};

/// Reload every known extension (Owner only)
#[poise::command(prefix_command, owners_only, aliases("refresh", "r"))]
pub async fn reload(ctx: Context<'_>) -> Result<(), Error> {
    info!("Reload command received from owner: {}", ctx.author().name);
    let report = ctx.data().extensions.reload_all().await;

    if report.is_clean() {
        let reply = ctx.say("Reloaded extensions.").await?;
        tokio::time::sleep(Duration::from_secs(5)).await;
        reply.delete(ctx).await?;
        return Ok(());
    }

    let mut response = format!(
        "Reloaded {} extension(s), {} failed:\n",
        report.reloaded.len(),
        report.failed.len()
    );
    for (id, e) in &report.failed {
        response.push_str(&format!("- `{}`: {}\n", id, e));
    }
    ctx.say(response).await?;
    Ok(())
}

/// List extensions and their load state (Owner only)
#[poise::command(prefix_command, owners_only, aliases("exts"))]
pub async fn extensions(ctx: Context<'_>) -> Result<(), Error> {
    let states = ctx.data().extensions.states();

    let mut response = String::from("## Extensions\n");
    if states.is_empty() {
        response.push_str("_No extensions discovered._");
    }
    for (id, state) in states {
        let marker = match state {
            ExtensionState::Loaded => "🟢",
            ExtensionState::Unloaded => "⚪",
            ExtensionState::FailedLoad(_) => "🔴",
        };
        response.push_str(&format!("- {} **{}**: {}\n", marker, id, state));
    }

    ctx.say(response).await?;
    Ok(())
}

/// Record this session and log out (Owner only)
#[poise::command(prefix_command, owners_only, aliases("logout"))]
pub async fn exit(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    // bookkeeping only; shutdown goes ahead regardless
    if let Err(e) = data.db.record_runtime(data.startup_time, Utc::now()).await {
        warn!("Could not record runtime before logout: {}", e);
    }

    info!("Logout command received from owner: {}", ctx.author().name);
    ctx.say("👋 Logging out...").await?;
    ctx.framework().shard_manager().shutdown_all().await;
    Ok(())
}
