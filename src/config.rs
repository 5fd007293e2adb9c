use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub owner_id: Option<u64>,
    /// Prefix for text commands; also substituted into rendered help examples
    pub prefix: String,
    pub database_url: String,
    pub tmp_dir: String,
    pub status_message: String,
    /// Commands listed here stay registered but are disabled for dispatch and help
    pub disabled_commands: Vec<String>,

    // Text-to-speech settings
    pub google_tts_api_key: Option<String>,
    pub tts_language: String,
    pub tts_voice: String,
    pub tts_rate_limit: usize,
    pub tts_rate_window_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            owner_id: env::var("OWNER_ID").ok().and_then(|id| id.parse().ok()),
            prefix: env::var("COMMAND_PREFIX")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| ";".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "data/xythrion.db".to_string()),
            tmp_dir: env::var("TMP_DIR").unwrap_or_else(|_| "tmp".to_string()),
            status_message: env::var("STATUS_MESSAGE")
                .unwrap_or_else(|_| "with graphs".to_string()),
            disabled_commands: env::var("DISABLED_COMMANDS")
                .map(|list| parse_list(&list))
                .unwrap_or_default(),
            google_tts_api_key: env::var("GOOGLE_TTS_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            tts_language: env::var("TTS_LANGUAGE").unwrap_or_else(|_| "en-US".to_string()),
            tts_voice: env::var("TTS_VOICE").unwrap_or_else(|_| "en-US-Wavenet-D".to_string()),
            tts_rate_limit: env::var("TTS_RATE_LIMIT")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .unwrap_or(12),
            tts_rate_window_secs: env::var("TTS_RATE_WINDOW_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
        })
    }

    /// Current command prefix
    pub fn current_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn tts_enabled(&self) -> bool {
        self.google_tts_api_key.is_some()
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("owner_id", &self.owner_id)
            .field("prefix", &self.prefix)
            .field("database_url", &self.database_url)
            .field("tmp_dir", &self.tmp_dir)
            .field("status_message", &self.status_message)
            .field("disabled_commands", &self.disabled_commands)
            .field(
                "google_tts_api_key",
                &self.google_tts_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("tts_language", &self.tts_language)
            .field("tts_voice", &self.tts_voice)
            .field("tts_rate_limit", &self.tts_rate_limit)
            .field("tts_rate_window_secs", &self.tts_rate_window_secs)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        discord_token: "test".to_string(),
        owner_id: None,
        prefix: ";".to_string(),
        database_url: ":memory:".to_string(),
        tmp_dir: "tmp".to_string(),
        status_message: "with graphs".to_string(),
        disabled_commands: Vec::new(),
        google_tts_api_key: None,
        tts_language: "en-US".to_string(),
        tts_voice: "en-US-Wavenet-D".to_string(),
        tts_rate_limit: 12,
        tts_rate_window_secs: 60,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_logic() {
        // 1. Missing token
        env::remove_var("DISCORD_TOKEN");
        let result = Config::build();
        assert!(result.is_err(), "Should fail when DISCORD_TOKEN is missing");

        // 2. Defaults
        env::set_var("DISCORD_TOKEN", "test_token");
        env::remove_var("COMMAND_PREFIX");
        env::remove_var("TTS_RATE_LIMIT");
        let config = Config::build().unwrap();
        assert_eq!(config.discord_token, "test_token");
        assert_eq!(config.current_prefix(), ";");
        assert_eq!(config.tts_rate_limit, 12);
        assert_eq!(config.tts_rate_window_secs, 60);

        // 3. Debug redaction
        env::set_var("GOOGLE_TTS_API_KEY", "secret_api_key");
        let config_redacted = Config::build().unwrap();
        assert!(config_redacted.tts_enabled());
        let debug_output = format!("{:?}", config_redacted);
        assert!(!debug_output.contains("test_token"));
        assert!(!debug_output.contains("secret_api_key"));
        assert!(debug_output.contains("[REDACTED]"));

        env::remove_var("DISCORD_TOKEN");
        env::remove_var("GOOGLE_TTS_API_KEY");
    }

    #[test]
    fn test_disabled_command_list() {
        assert_eq!(parse_list(" Weather, tts ,,"), vec!["weather", "tts"]);
        assert!(parse_list("").is_empty());
    }
}
