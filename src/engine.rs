//! Speech output: synthesis on a dedicated audio thread, playback through rodio.
//!
//! The controller only ever sees [`SpeechOutput`]. Every call returns
//! immediately; failures are logged here and show up to the caller as
//! "not speaking".

use crate::backends::{self, SpeechBackend};
use crate::config_loader::Settings;
use crate::error::{FaceError, FaceResult};
use rodio::{Decoder, OutputStream, Sink, Source};
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

pub trait SpeechOutput: Send + Sync {
    /// Queue `text` behind whatever is already playing.
    fn speak(&self, text: &str);

    /// Stop current audio and discard queued text, then say `text`.
    fn speak_now(&self, text: &str);

    /// Non-blocking: true while text is waiting for synthesis or audio is playing.
    fn is_speaking(&self) -> bool;
}

/// Used when synthesis is disabled or no backend is healthy.
#[derive(Debug, Default)]
pub struct SilentOutput;

impl SpeechOutput for SilentOutput {
    fn speak(&self, text: &str) {
        debug!(%text, "speech disabled, not speaking");
    }

    fn speak_now(&self, text: &str) {
        debug!(%text, "speech disabled, not speaking");
    }

    fn is_speaking(&self) -> bool {
        false
    }
}

enum PlaybackCommand {
    Say { text: String, generation: u64 },
    Shutdown,
}

/// One interruptible playback queue. The audio thread opens a fresh one for
/// every generation, so a stopped queue is never reused.
pub(crate) trait Voice: Send {
    /// Queues encoded audio behind whatever this voice is already playing.
    fn append(&self, audio: Vec<u8>) -> FaceResult<()>;
    fn stop(&self);
    fn is_empty(&self) -> bool;
}

type OpenVoice = Box<dyn FnMut() -> FaceResult<Box<dyn Voice>>>;

struct RodioVoice {
    sink: Sink,
}

impl Voice for RodioVoice {
    fn append(&self, audio: Vec<u8>) -> FaceResult<()> {
        let source =
            Decoder::new(Cursor::new(audio)).map_err(|e| FaceError::Playback(e.to_string()))?;
        self.sink.append(source.convert_samples::<f32>());
        Ok(())
    }

    fn stop(&self) {
        self.sink.stop();
    }

    fn is_empty(&self) -> bool {
        self.sink.empty()
    }
}

struct Shared {
    generation: AtomicU64,
    pending: AtomicUsize,
    // Also serializes "is this command still current?" against speak_now.
    voice: Mutex<Option<Box<dyn Voice>>>,
}

pub struct AudioEngine {
    tx: Sender<PlaybackCommand>,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AudioEngine {
    /// Spawns the audio thread. Fails if no output device can be opened.
    pub fn start(backends: Vec<Box<dyn SpeechBackend>>, volume: f32) -> FaceResult<Self> {
        Self::spawn(backends, move || {
            // Audio stream must live on this thread
            let (stream, handle) =
                OutputStream::try_default().map_err(|e| FaceError::Playback(e.to_string()))?;
            let open: OpenVoice = Box::new(move || {
                let _stream = &stream;
                let sink = Sink::try_new(&handle).map_err(|e| FaceError::Playback(e.to_string()))?;
                sink.set_volume(volume);
                Ok(Box::new(RodioVoice { sink }) as Box<dyn Voice>)
            });
            Ok(open)
        })
    }

    /// `init` runs on the audio thread and returns the voice factory.
    fn spawn<F>(backends: Vec<Box<dyn SpeechBackend>>, init: F) -> FaceResult<Self>
    where
        F: FnOnce() -> FaceResult<OpenVoice> + Send + 'static,
    {
        let (tx, rx) = channel::<PlaybackCommand>();
        let (ready_tx, ready_rx) = channel::<FaceResult<()>>();
        let shared = Arc::new(Shared {
            generation: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
            voice: Mutex::new(None),
        });

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("face-audio".to_string())
            .spawn(move || {
                let mut open_voice = match init() {
                    Ok(open) => open,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                playback_loop(rx, &worker_shared, &backends, &mut open_voice);
            })?;

        ready_rx
            .recv()
            .map_err(|_| FaceError::Playback("audio thread exited during startup".to_string()))??;

        Ok(Self {
            tx,
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    fn enqueue(&self, text: &str, generation: u64) {
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        let cmd = PlaybackCommand::Say {
            text: text.to_string(),
            generation,
        };
        if self.tx.send(cmd).is_err() {
            self.shared.pending.fetch_sub(1, Ordering::SeqCst);
            warn!("audio thread gone, dropping speech");
        }
    }

    /// Stops playback and joins the audio thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(PlaybackCommand::Shutdown);
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl SpeechOutput for AudioEngine {
    fn speak(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let generation = self.shared.generation.load(Ordering::SeqCst);
        self.enqueue(text, generation);
    }

    fn speak_now(&self, text: &str) {
        let generation = {
            let guard = self.shared.voice.lock();
            let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
            if let Ok(guard) = guard {
                if let Some(voice) = guard.as_ref() {
                    voice.stop();
                }
            }
            generation
        };
        debug!(generation, "playback interrupted");
        if !text.trim().is_empty() {
            self.enqueue(text, generation);
        }
    }

    fn is_speaking(&self) -> bool {
        if self.shared.pending.load(Ordering::SeqCst) > 0 {
            return true;
        }
        self.shared
            .voice
            .lock()
            .map(|guard| guard.as_ref().map(|v| !v.is_empty()).unwrap_or(false))
            .unwrap_or(false)
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn playback_loop(
    rx: Receiver<PlaybackCommand>,
    shared: &Shared,
    backends: &[Box<dyn SpeechBackend>],
    open_voice: &mut OpenVoice,
) {
    let mut voice_generation: Option<u64> = None;

    while let Ok(cmd) = rx.recv() {
        let (text, generation) = match cmd {
            PlaybackCommand::Say { text, generation } => (text, generation),
            PlaybackCommand::Shutdown => break,
        };

        if generation < shared.generation.load(Ordering::SeqCst) {
            debug!(%text, "discarding speech superseded by an interruption");
            shared.pending.fetch_sub(1, Ordering::SeqCst);
            continue;
        }

        info!(%text, "Audio Thread: synthesizing");
        let audio = backends::synthesize_with_fallback(backends, &text);

        if let Ok(mut guard) = shared.voice.lock() {
            // Re-check under the lock: speak_now may have run during synthesis.
            let current = shared.generation.load(Ordering::SeqCst);
            match audio {
                Some(_) if generation < current => {
                    debug!(%text, "discarding speech superseded during synthesis");
                }
                Some((backend, bytes)) => {
                    if voice_generation != Some(generation) || guard.is_none() {
                        match open_voice() {
                            Ok(voice) => {
                                *guard = Some(voice);
                                voice_generation = Some(generation);
                            }
                            Err(e) => {
                                warn!(error = %e, "Failed to open playback queue");
                                *guard = None;
                                voice_generation = None;
                            }
                        }
                    }
                    if let Some(voice) = guard.as_ref() {
                        match voice.append(bytes) {
                            Ok(()) => debug!(backend, "queued synthesized audio"),
                            Err(e) => warn!(error = %e, "Failed to decode synthesized audio"),
                        }
                    }
                }
                None => warn!(%text, "no TTS backend could synthesize text"),
            }
        }
        shared.pending.fetch_sub(1, Ordering::SeqCst);
    }

    if let Ok(guard) = shared.voice.lock() {
        if let Some(voice) = guard.as_ref() {
            voice.stop();
        }
    }
}

/// Picks the concrete output for these settings. Never fails: anything that
/// cannot speak degrades to [`SilentOutput`].
pub fn build_output(settings: &Settings) -> Arc<dyn SpeechOutput> {
    if !settings.enable_tts {
        info!("TTS disabled by configuration");
        return Arc::new(SilentOutput);
    }

    let backends = backends::select_backends(settings);
    if backends.is_empty() {
        warn!("no TTS backend available, running silent");
        return Arc::new(SilentOutput);
    }

    match AudioEngine::start(backends, settings.playback_volume) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            warn!(error = %e, "audio output unavailable, running silent");
            Arc::new(SilentOutput)
        }
    }
}
