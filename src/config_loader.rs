use crate::expression::Expression;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Interaction
    pub wake_words: Vec<String>,
    pub command_window_ms: u64,
    pub sad_duration_ms: u64,
    pub pain_duration_ms: u64,
    pub pain_cooldown_ms: u64,
    pub idle_cycle_ms: u64,
    pub idle_expressions: Vec<Expression>,
    pub fps_target: u32,
    // Phrases
    pub intro_delay_ms: u64,
    pub intro_phrase: String,
    pub listening_prompt: String,
    pub ouch_phrase: String,
    pub fallback_phrase: String,
    // TTS
    pub enable_tts: bool,
    pub tts_prefer_network: bool,
    pub tts_url: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_api_key: String,
    pub tts_timeout_secs: u64,
    pub local_tts: String, // "espeak" or "piper"
    pub espeak_voice: String,
    pub espeak_rate: u32,
    pub piper_binary: String,
    pub piper_model: String,
    pub playback_volume: f32,
    // ASR
    pub enable_asr: bool,
    pub asr_energy_threshold: f32,
    pub asr_pause_ms: u64,
    pub asr_timeout_ms: u64,
    pub asr_phrase_limit_ms: u64,
    pub asr_ambient_ms: u64,
    pub mic_hints: Vec<String>,
    pub stt_backend: String, // "wyoming" or "whisper"
    pub stt_language: String,
    pub wyoming_host: String,
    pub wyoming_port: u16,
    pub whisper_model_path: String,
    pub debug_wav_path: String, // empty disables
    // Daemon
    pub enable_dbus: bool,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wake_words: vec!["unip".to_string()],
            command_window_ms: 7000,
            sad_duration_ms: 3000,
            pain_duration_ms: 1500,
            pain_cooldown_ms: 1200,
            idle_cycle_ms: 1200,
            idle_expressions: vec![
                Expression::HappyOpen,
                Expression::SmileEyes,
                Expression::Wink,
            ],
            fps_target: 45,
            intro_delay_ms: 2000,
            intro_phrase: "Olá! Eu sou o seu assistente. Diga 'UNIP' para falar comigo."
                .to_string(),
            listening_prompt: "Estou ouvindo.".to_string(),
            ouch_phrase: "Ai! Isso dói!".to_string(),
            fallback_phrase: "Desculpe, não entendi. Pode repetir?".to_string(),
            enable_tts: true,
            tts_prefer_network: true,
            tts_url: "https://api.openai.com/v1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "onyx".to_string(),
            tts_api_key: String::new(),
            tts_timeout_secs: 15,
            local_tts: "espeak".to_string(),
            espeak_voice: "pt-br".to_string(),
            espeak_rate: 170,
            piper_binary: "piper".to_string(),
            piper_model: format!(
                "{}/.local/share/piper/models/pt_BR-faber-medium.onnx",
                std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
            ),
            playback_volume: 1.0,
            enable_asr: true,
            // RMS on [-1, 1] samples; 300 on the i16 scale.
            asr_energy_threshold: 0.009,
            asr_pause_ms: 600,
            asr_timeout_ms: 5000,
            asr_phrase_limit_ms: 5000,
            asr_ambient_ms: 1000,
            mic_hints: [
                "usb", "external", "headset", "mic", "microfone", "logitech", "hyperx", "fifine",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            stt_backend: "wyoming".to_string(),
            stt_language: "pt".to_string(),
            wyoming_host: "127.0.0.1".to_string(),
            wyoming_port: 10300,
            whisper_model_path: format!(
                "{}/.cache/whisper/ggml-small.bin",
                std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
            ),
            debug_wav_path: String::new(),
            enable_dbus: true,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Layers, lowest first: compiled defaults, `./Face.*`,
    /// `~/.config/face-ng/Face.*`, `explicit`, then `FACE_*` environment variables.
    pub fn load(explicit: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name("Face").required(false));

        if let Some(config_dir) = dirs::config_dir() {
            let user_file = config_dir.join("face-ng").join("Face");
            builder = builder.add_source(
                File::with_name(&user_file.to_string_lossy()).required(false),
            );
        }

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("FACE")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("wake_words")
                .with_list_parse_key("mic_hints")
                .with_list_parse_key("idle_expressions"),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.wake_words.iter().all(|w| w.trim().is_empty()) {
            return Err(config::ConfigError::Message(
                "wake_words must contain at least one non-empty word".to_string(),
            ));
        }
        if self.fps_target == 0 {
            return Err(config::ConfigError::Message(
                "fps_target must be greater than 0".to_string(),
            ));
        }
        if self.command_window_ms == 0 {
            return Err(config::ConfigError::Message(
                "command_window_ms must be greater than 0".to_string(),
            ));
        }
        if self.playback_volume < 0.0 || self.playback_volume > 1.0 {
            return Err(config::ConfigError::Message(format!(
                "Invalid playback_volume: {}. Must be between 0.0 and 1.0",
                self.playback_volume
            )));
        }
        if self.idle_expressions.is_empty() {
            return Err(config::ConfigError::Message(
                "idle_expressions must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn command_window(&self) -> Duration {
        Duration::from_millis(self.command_window_ms)
    }

    pub fn sad_duration(&self) -> Duration {
        Duration::from_millis(self.sad_duration_ms)
    }

    pub fn pain_duration(&self) -> Duration {
        Duration::from_millis(self.pain_duration_ms)
    }

    pub fn pain_cooldown(&self) -> Duration {
        Duration::from_millis(self.pain_cooldown_ms)
    }

    pub fn idle_cycle(&self) -> Duration {
        Duration::from_millis(self.idle_cycle_ms)
    }

    pub fn intro_delay(&self) -> Duration {
        Duration::from_millis(self.intro_delay_ms)
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps_target.max(1)))
    }
}
