pub mod espeak;
pub mod network;
pub mod piper;

use crate::config_loader::Settings;
use crate::error::FaceResult;
use tracing::{info, warn};

/// Trait that all speech synthesis backends must implement.
/// Network and local engines are interchangeable behind it.
pub trait SpeechBackend: Send + Sync {
    /// Returns the unique ID of the backend (e.g., "espeak-ng")
    fn id(&self) -> &'static str;

    /// Cheap startup health check. An `Err` keeps the backend out of rotation.
    fn probe(&self) -> FaceResult<()>;

    /// Returns encoded audio (WAV or MP3) for `text`.
    fn synthesize(&self, text: &str) -> FaceResult<Vec<u8>>;
}

fn local_backend(settings: &Settings) -> Box<dyn SpeechBackend> {
    match settings.local_tts.as_str() {
        "piper" => Box::new(piper::PiperBackend::new(settings)),
        _ => Box::new(espeak::EspeakBackend::new(settings)),
    }
}

/// Probes backends in preference order and keeps the healthy ones, still in
/// that order. An empty result means speech is unavailable.
pub fn select_backends(settings: &Settings) -> Vec<Box<dyn SpeechBackend>> {
    let network: Box<dyn SpeechBackend> = Box::new(network::NetworkBackend::new(settings));
    let local = local_backend(settings);

    let ordered = if settings.tts_prefer_network {
        vec![network, local]
    } else {
        vec![local, network]
    };

    probe_in_order(ordered)
}

pub fn probe_in_order(candidates: Vec<Box<dyn SpeechBackend>>) -> Vec<Box<dyn SpeechBackend>> {
    let mut healthy = Vec::new();
    for backend in candidates {
        match backend.probe() {
            Ok(()) => {
                info!(backend = backend.id(), "TTS backend available");
                healthy.push(backend);
            }
            Err(e) => warn!(backend = backend.id(), error = %e, "TTS backend unavailable"),
        }
    }
    healthy
}

/// Tries each backend in turn; the first success wins.
pub fn synthesize_with_fallback(
    backends: &[Box<dyn SpeechBackend>],
    text: &str,
) -> Option<(&'static str, Vec<u8>)> {
    for backend in backends {
        match backend.synthesize(text) {
            Ok(audio) if !audio.is_empty() => return Some((backend.id(), audio)),
            Ok(_) => warn!(backend = backend.id(), "TTS backend returned no audio"),
            Err(e) => warn!(backend = backend.id(), error = %e, "TTS backend failed, trying next"),
        }
    }
    None
}
