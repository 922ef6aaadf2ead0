//! Local recognition through whisper.cpp (whisper-rs bindings).

use super::{clean_transcript, Recognizer};
use crate::error::{FaceError, FaceResult};
use std::time::Instant;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

pub struct WhisperRecognizer {
    ctx: WhisperContext,
    language: String,
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().into_owned(),
        _ => path.to_string(),
    }
}

impl WhisperRecognizer {
    /// Loads the model eagerly so a bad path fails at startup, not on the first phrase.
    pub fn new(model_path: &str, language: &str) -> FaceResult<Self> {
        let path = expand_home(model_path);
        info!(%path, "Whisper: loading model");
        let ctx = WhisperContext::new_with_params(&path, WhisperContextParameters::default())
            .map_err(|e| FaceError::Stt(format!("Failed to load Whisper model: {:?}", e)))?;
        Ok(Self {
            ctx,
            language: language.to_string(),
        })
    }
}

impl Recognizer for WhisperRecognizer {
    fn id(&self) -> &'static str {
        "whisper"
    }

    fn recognize(&mut self, samples: &[f32]) -> FaceResult<Option<String>> {
        let start = Instant::now();
        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| FaceError::Stt(format!("Failed to create state: {:?}", e)))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        if !self.language.is_empty() && self.language != "auto" {
            params.set_language(Some(&self.language));
        }
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_single_segment(true);

        state
            .full(params, samples)
            .map_err(|e| FaceError::Stt(format!("Transcription failed: {:?}", e)))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            if let Ok(segment_text) = segment.to_str() {
                text.push_str(segment_text);
                text.push(' ');
            }
        }

        debug!(text = %text.trim(), elapsed = ?start.elapsed(), "Whisper: transcribed");
        Ok(clean_transcript(&text))
    }
}
