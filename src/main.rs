use poise::serenity_prelude as serenity;
use songbird::serenity::SerenityInit;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};
use xythrion::audio::{AudioCoordinator, GoogleTts, SongbirdGateway};
use xythrion::extensions::{builtin, ExtensionRegistry};
use xythrion::rate_limiter::RateLimiter;
use xythrion::{cleanup, commands, config::Config, db::Database, Data};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;
    let log_to_file = std::env::args().skip(1).any(|arg| arg == "log");
    init_logging(&config.tmp_dir, log_to_file)?;

    let db = Database::new(&config)?;
    db.execute_init()?;

    let discord_token = config.discord_token.clone();
    let tmp_dir = config.tmp_dir.clone();

    let mut owners = HashSet::new();
    if let Some(owner) = config.owner_id {
        owners.insert(serenity::UserId::new(owner));
    }

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.current_prefix().to_string()),
                mention_as_prefix: true,
                case_insensitive_commands: true,
                ..Default::default()
            },
            owners,
            command_check: Some(|ctx| Box::pin(commands::check_available(ctx))),
            on_error: |error| Box::pin(commands::on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, _framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                ctx.set_activity(Some(serenity::ActivityData::playing(&config.status_message)));

                let manager = songbird::get(ctx)
                    .await
                    .ok_or("Songbird Voice client not initialized")?;
                let audio = AudioCoordinator::new(
                    Arc::new(SongbirdGateway::new(manager, ctx.cache.clone())),
                    Arc::new(GoogleTts::new(&config)),
                    RateLimiter::new(
                        config.tts_rate_limit,
                        Duration::from_secs(config.tts_rate_window_secs),
                    ),
                );

                let registry = builtin::discover(&config).into_iter().fold(
                    ExtensionRegistry::new(config.current_prefix())
                        .with_core_commands(builtin::core_commands())
                        .with_disabled_commands(&config.disabled_commands),
                    |registry, extension| registry.with_extension(extension),
                );
                let report = registry.reload_all().await;
                for (id, e) in &report.failed {
                    warn!("Extension {} failed to load: {}", id, e);
                }
                info!(
                    "Loaded {} extension(s), {} help entries",
                    report.reloaded.len(),
                    registry.help_index().len()
                );

                Ok(Data {
                    config,
                    db,
                    extensions: Arc::new(registry),
                    audio: Arc::new(audio),
                    startup_time: chrono::Utc::now(),
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .register_songbird()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    match cleanup::cleanup_tmp(&tmp_dir) {
        Ok(removed) => info!("Removed {} temporary file(s)", removed),
        Err(e) => warn!("Temporary directory cleanup failed: {}", e),
    }

    Ok(())
}

fn init_logging(tmp_dir: &str, log_to_file: bool) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let file_layer = if log_to_file {
        fs::create_dir_all(tmp_dir)?;
        let file = File::create(Path::new(tmp_dir).join("discord.log"))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}
