//! Speech-to-text backends used by the capture loop.

#[cfg(feature = "whisper")]
pub mod whisper;
pub mod wyoming;

use crate::config_loader::Settings;
use crate::error::{FaceError, FaceResult};
use tokio::runtime::Handle;

/// Sample rate every recognizer receives.
pub const STT_SAMPLE_RATE: u32 = 16000;

pub trait Recognizer: Send {
    fn id(&self) -> &'static str;

    /// Transcribes 16 kHz mono audio. `Ok(None)` means nothing intelligible.
    fn recognize(&mut self, samples: &[f32]) -> FaceResult<Option<String>>;
}

/// Recognizers emit markers like "[BLANK_AUDIO]" or "(música)" for non-speech.
pub fn clean_transcript(raw: &str) -> Option<String> {
    let text = raw.trim();
    let is_marker = (text.starts_with('[') && text.ends_with(']'))
        || (text.starts_with('(') && text.ends_with(')'));
    if text.is_empty() || is_marker {
        None
    } else {
        Some(text.to_string())
    }
}

/// Averages interleaved frames down to one channel.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Simple linear interpolation resampling
pub fn resample(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input.to_vec();
    }
    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_len = (input.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_idx = i as f64 * ratio;
        let idx = src_idx as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < input.len() {
            input[idx] * (1.0 - frac) + input[idx + 1] * frac
        } else {
            input[idx.min(input.len() - 1)]
        };
        output.push(sample);
    }
    output
}

pub fn build_recognizer(settings: &Settings, runtime: Handle) -> FaceResult<Box<dyn Recognizer>> {
    match settings.stt_backend.as_str() {
        "wyoming" => Ok(Box::new(wyoming::WyomingRecognizer::new(settings, runtime))),
        #[cfg(feature = "whisper")]
        "whisper" => Ok(Box::new(whisper::WhisperRecognizer::new(
            &settings.whisper_model_path,
            &settings.stt_language,
        )?)),
        #[cfg(not(feature = "whisper"))]
        "whisper" => Err(FaceError::Stt(
            "whisper backend requires building with --features whisper".to_string(),
        )),
        other => Err(FaceError::Stt(format!("unknown stt_backend '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_transcript() {
        assert_eq!(clean_transcript("  vá para a sala "), Some("vá para a sala".to_string()));
        assert_eq!(clean_transcript("[BLANK_AUDIO]"), None);
        assert_eq!(clean_transcript("(música)"), None);
        assert_eq!(clean_transcript("   "), None);
    }

    #[test]
    fn test_resample() {
        let input = vec![1.0, 2.0, 3.0, 4.0];
        let up = resample(&input, 8000, 16000);
        assert_eq!(up.len(), 8);
        assert!((up[1] - 1.5).abs() < 1e-6);

        let down = resample(&vec![0.25; 48000], 48000, 16000);
        assert_eq!(down.len(), 16000);
        assert_eq!(resample(&input, 16000, 16000), input);
    }

    #[test]
    fn test_downmix_stereo() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.3, 0.4], 1), vec![0.3, 0.4]);
    }

    #[tokio::test]
    async fn test_unknown_backend_is_rejected() {
        let mut settings = Settings::default();
        settings.stt_backend = "vosk".to_string();
        assert!(build_recognizer(&settings, Handle::current()).is_err());
    }
}
