//! Network speech synthesis over an OpenAI-compatible `/audio/speech` endpoint.

use super::SpeechBackend;
use crate::config_loader::Settings;
use crate::error::{FaceError, FaceResult};
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct NetworkBackend {
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
    timeout: Duration,
}

impl NetworkBackend {
    pub fn new(settings: &Settings) -> Self {
        let api_key = if settings.tts_api_key.is_empty() {
            std::env::var("TTS_API_KEY").unwrap_or_default()
        } else {
            settings.tts_api_key.clone()
        };

        Self {
            base_url: settings.tts_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.tts_model.clone(),
            voice: settings.tts_voice.clone(),
            timeout: Duration::from_secs(settings.tts_timeout_secs),
        }
    }

    fn client(&self, timeout: Duration) -> FaceResult<reqwest::blocking::Client> {
        Ok(reqwest::blocking::Client::builder().timeout(timeout).build()?)
    }
}

impl SpeechBackend for NetworkBackend {
    fn id(&self) -> &'static str {
        "network"
    }

    fn probe(&self) -> FaceResult<()> {
        if self.api_key.is_empty() {
            return Err(FaceError::Tts("no API key configured".to_string()));
        }

        let res = self
            .client(PROBE_TIMEOUT)?
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()?;

        if res.status().is_success() {
            Ok(())
        } else {
            Err(FaceError::Tts(format!("probe returned {}", res.status())))
        }
    }

    fn synthesize(&self, text: &str) -> FaceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
            "response_format": "mp3",
        });

        let res = self
            .client(self.timeout)?
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(FaceError::Tts(format!("TTS API error {}: {}", status, body)));
        }

        Ok(res.bytes()?.to_vec())
    }
}
