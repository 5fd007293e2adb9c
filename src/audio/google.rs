use anyhow::Context as _;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::Synthesizer;
use crate::config::Config;

const ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Google Cloud Text-to-Speech over its REST API. Produces Ogg/Opus.
pub struct GoogleTts {
    api_key: Option<String>,
    language: String,
    voice: String,
    timeout: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

impl GoogleTts {
    pub fn new(config: &Config) -> Self {
        Self {
            api_key: config.google_tts_api_key.clone(),
            language: config.tts_language.clone(),
            voice: config.tts_voice.clone(),
            timeout: Duration::from_secs(30),
        }
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        json!({
            "input": { "text": text },
            "voice": {
                "languageCode": self.language,
                "name": self.voice,
                "ssmlGender": "MALE"
            },
            "audioConfig": { "audioEncoding": "OGG_OPUS" }
        })
    }
}

impl Synthesizer for GoogleTts {
    fn synthesize(&self, text: &str) -> anyhow::Result<Vec<u8>> {
        let api_key = self
            .api_key
            .as_deref()
            .context("Google Text-to-Speech API key is not configured")?;

        // Built per call: the blocking client must not be created or dropped
        // on an async worker thread.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        debug!("Synthesizing {} characters with voice {}", text.len(), self.voice);
        let response: SynthesizeResponse = client
            .post(ENDPOINT)
            .query(&[("key", api_key)])
            .json(&self.request_body(text))
            .send()
            .context("Failed to reach Google Text-to-Speech")?
            .error_for_status()
            .context("Google Text-to-Speech rejected the request")?
            .json()
            .context("Unexpected Google Text-to-Speech response")?;

        let audio = base64::engine::general_purpose::STANDARD
            .decode(response.audio_content)
            .context("Google Text-to-Speech returned invalid audio content")?;
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_request_body() {
        let tts = GoogleTts::new(&test_config());
        let body = tts.request_body("hello");
        assert_eq!(body["input"]["text"], "hello");
        assert_eq!(body["voice"]["name"], "en-US-Wavenet-D");
        assert_eq!(body["voice"]["languageCode"], "en-US");
        assert_eq!(body["audioConfig"]["audioEncoding"], "OGG_OPUS");
    }

    #[test]
    fn test_missing_key_fails_without_network() {
        let tts = GoogleTts::new(&test_config());
        let err = tts.synthesize("hello").unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
