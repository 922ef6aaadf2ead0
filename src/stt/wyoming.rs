//! Client for the Wyoming protocol (e.g. a wyoming-faster-whisper server).
//!
//! Each event is one JSON line, optionally followed by `data_length` bytes of
//! extra JSON and `payload_length` bytes of binary payload.

use super::{clean_transcript, Recognizer, STT_SAMPLE_RATE};
use crate::config_loader::Settings;
use crate::error::{FaceError, FaceResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::runtime::Handle;

const SAMPLES_PER_CHUNK: usize = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize, Deserialize)]
pub struct WyomingEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub data_length: Option<usize>,
    #[serde(default)]
    pub payload_length: Option<usize>,
}

pub struct WyomingClient {
    stream: BufReader<TcpStream>,
}

impl WyomingClient {
    pub async fn connect(host: &str, port: u16) -> FaceResult<Self> {
        let stream = TcpStream::connect(format!("{}:{}", host, port)).await?;
        Ok(Self {
            stream: BufReader::new(stream),
        })
    }

    pub async fn transcribe(&mut self, language: &str) -> FaceResult<()> {
        self.write_event("transcribe", Some(json!({ "language": language })), &[])
            .await
    }

    pub async fn start_audio(&mut self, rate: u32) -> FaceResult<()> {
        self.write_event("audio-start", Some(audio_format(rate)), &[])
            .await
    }

    pub async fn send_chunk(&mut self, rate: u32, pcm: &[u8]) -> FaceResult<()> {
        self.write_event("audio-chunk", Some(audio_format(rate)), pcm)
            .await
    }

    pub async fn stop_audio(&mut self) -> FaceResult<()> {
        self.write_event("audio-stop", None, &[]).await
    }

    pub async fn wait_for_transcript(&mut self) -> FaceResult<String> {
        loop {
            let event = self.read_event().await?;
            if event.event_type == "transcript" {
                let text = event
                    .data
                    .as_ref()
                    .and_then(|d| d["text"].as_str())
                    .unwrap_or("")
                    .to_string();
                return Ok(text);
            }
        }
    }

    async fn write_event(
        &mut self,
        event_type: &str,
        data: Option<serde_json::Value>,
        payload: &[u8],
    ) -> FaceResult<()> {
        let mut header = json!({ "type": event_type, "data": data });
        if !payload.is_empty() {
            header["payload_length"] = json!(payload.len());
        }

        let stream = self.stream.get_mut();
        stream.write_all(header.to_string().as_bytes()).await?;
        stream.write_all(b"\n").await?;
        if !payload.is_empty() {
            stream.write_all(payload).await?;
        }
        Ok(())
    }

    async fn read_event(&mut self) -> FaceResult<WyomingEvent> {
        let mut line = String::new();
        if self.stream.read_line(&mut line).await? == 0 {
            return Err(FaceError::Stt("Wyoming server closed the connection".to_string()));
        }

        let mut event: WyomingEvent = serde_json::from_str(&line)
            .map_err(|e| FaceError::Stt(format!("bad Wyoming event: {}", e)))?;

        if let Some(len) = event.data_length {
            let mut buf = vec![0u8; len];
            self.stream.read_exact(&mut buf).await?;
            let extra: serde_json::Value = serde_json::from_slice(&buf)
                .map_err(|e| FaceError::Stt(format!("bad Wyoming data: {}", e)))?;
            event.data = Some(extra);
        }
        if let Some(len) = event.payload_length {
            let mut skip = vec![0u8; len];
            self.stream.read_exact(&mut skip).await?;
        }
        Ok(event)
    }
}

fn audio_format(rate: u32) -> serde_json::Value {
    json!({ "rate": rate, "width": 2, "channels": 1 })
}

/// Little-endian 16-bit PCM, the format Wyoming audio chunks carry.
pub fn to_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|s| {
            let v = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
            v.to_le_bytes()
        })
        .collect()
}

pub struct WyomingRecognizer {
    host: String,
    port: u16,
    language: String,
    runtime: Handle,
}

impl WyomingRecognizer {
    pub fn new(settings: &Settings, runtime: Handle) -> Self {
        Self {
            host: settings.wyoming_host.clone(),
            port: settings.wyoming_port,
            language: settings.stt_language.clone(),
            runtime,
        }
    }

    async fn round_trip(&self, samples: &[f32]) -> FaceResult<String> {
        let mut client = WyomingClient::connect(&self.host, self.port).await?;
        client.transcribe(&self.language).await?;
        client.start_audio(STT_SAMPLE_RATE).await?;
        for chunk in samples.chunks(SAMPLES_PER_CHUNK) {
            client.send_chunk(STT_SAMPLE_RATE, &to_pcm16(chunk)).await?;
        }
        client.stop_audio().await?;
        client.wait_for_transcript().await
    }
}

impl Recognizer for WyomingRecognizer {
    fn id(&self) -> &'static str {
        "wyoming"
    }

    fn recognize(&mut self, samples: &[f32]) -> FaceResult<Option<String>> {
        let text = self
            .runtime
            .block_on(async {
                tokio::time::timeout(REQUEST_TIMEOUT, self.round_trip(samples)).await
            })
            .map_err(|_| FaceError::Stt("Wyoming request timed out".to_string()))??;
        Ok(clean_transcript(&text))
    }
}
