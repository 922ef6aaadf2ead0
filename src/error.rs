//! Error types shared by the face daemon's collaborators.

use thiserror::Error;

pub type FaceResult<T> = Result<T, FaceError>;

#[derive(Error, Debug)]
pub enum FaceError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Capture stream error: {0}")]
    Capture(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("D-Bus error: {0}")]
    DBus(#[from] zbus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::DevicesError> for FaceError {
    fn from(err: cpal::DevicesError) -> Self {
        FaceError::AudioDevice(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for FaceError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        FaceError::AudioDevice(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for FaceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        FaceError::Capture(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for FaceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        FaceError::Capture(err.to_string())
    }
}

impl From<reqwest::Error> for FaceError {
    fn from(err: reqwest::Error) -> Self {
        FaceError::Tts(err.to_string())
    }
}
