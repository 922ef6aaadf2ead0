//! Microphone capture: turns spoken phrases into [`Utterance`]s.
//!
//! Runs on its own thread because cpal streams are not `Send`. The cpal
//! callback only pushes samples into a ring buffer; segmentation and
//! recognition happen on the capture thread.

use crate::config_loader::Settings;
use crate::error::{FaceError, FaceResult};
use crate::stt::{self, Recognizer, STT_SAMPLE_RATE};
use crate::utterance::{Utterance, UtteranceSender};
use crate::vad::{EnergyGate, PhraseSegmenter, PhraseTimings, Segment};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Seconds of audio the ring buffer can hold before the callback starts
/// dropping. Recognition runs on the capture thread and can take longer.
const RING_SECONDS: usize = 4;

/// Picks the input device the way a user with a headset would expect: first
/// name containing any hint, otherwise the last device when there are several,
/// otherwise `None` for the system default.
pub fn choose_device(names: &[String], hints: &[String]) -> Option<usize> {
    let hinted = names.iter().position(|name| {
        let low = name.to_lowercase();
        hints.iter().any(|h| low.contains(&h.to_lowercase()))
    });
    match hinted {
        Some(i) => Some(i),
        None if names.len() > 1 => Some(names.len() - 1),
        None => None,
    }
}

struct Capture {
    // Dropping the stream stops the callback.
    _stream: Stream,
    samples: HeapCons<f32>,
    sample_rate: u32,
    channels: usize,
}

impl Capture {
    fn open(hints: &[String]) -> FaceResult<Self> {
        let host = cpal::default_host();
        let device = select_input(&host, hints)?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = device.default_input_config()?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: StreamConfig = supported.config();
        info!(device = %name, sample_rate, channels, "Ear: input device ready");

        let ring = HeapRb::<f32>::new(sample_rate as usize * channels * RING_SECONDS);
        let (producer, samples) = ring.split();

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, producer)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, producer)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, producer)?,
            other => {
                return Err(FaceError::AudioDevice(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        };
        stream.play()?;

        Ok(Self {
            _stream: stream,
            samples,
            sample_rate,
            channels,
        })
    }

    /// Everything captured since the last call, downmixed to mono.
    fn drain(&mut self) -> Vec<f32> {
        let mut raw = vec![0.0f32; self.samples.occupied_len()];
        let n = self.samples.pop_slice(&mut raw);
        raw.truncate(n);
        stt::downmix(&raw, self.channels)
    }
}

fn select_input(host: &cpal::Host, hints: &[String]) -> FaceResult<Device> {
    let devices: Vec<Device> = host.input_devices()?.collect();
    let names: Vec<String> = devices
        .iter()
        .map(|d| d.name().unwrap_or_default())
        .collect();
    debug!(?names, "Ear: input devices");

    if let Some(index) = choose_device(&names, hints) {
        if let Some(device) = devices.into_iter().nth(index) {
            return Ok(device);
        }
    }
    host.default_input_device()
        .ok_or_else(|| FaceError::AudioDevice("no input device found".to_string()))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut producer: ringbuf::HeapProd<f32>,
) -> FaceResult<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut scratch: Vec<f32> = Vec::new();
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            scratch.clear();
            scratch.extend(data.iter().map(|s| s.to_sample::<f32>()));
            // Overflow drops the newest samples. That only happens while a slow
            // recognition holds the capture thread past RING_SECONDS.
            producer.push_slice(&scratch);
        },
        |err| error!("Ear: input stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

pub struct Ear;

impl Ear {
    /// Starts the capture thread. Recognized text goes to `tx` until `cancel`
    /// fires. A missing or failing microphone is logged and ends the thread;
    /// the rest of the daemon keeps running without speech input.
    pub fn spawn(
        settings: Arc<Settings>,
        recognizer: Box<dyn Recognizer>,
        tx: UtteranceSender,
        cancel: CancellationToken,
    ) -> FaceResult<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("face-ear".to_string())
            .spawn(move || {
                if let Err(e) = capture_loop(&settings, recognizer, &tx, &cancel) {
                    error!(error = %e, "Ear: microphone unavailable, speech input disabled");
                }
            })?;
        Ok(handle)
    }
}

fn capture_loop(
    settings: &Settings,
    mut recognizer: Box<dyn Recognizer>,
    tx: &UtteranceSender,
    cancel: &CancellationToken,
) -> FaceResult<()> {
    let mut capture = Capture::open(&settings.mic_hints)?;

    let mut gate = EnergyGate::new(settings.asr_energy_threshold);
    let ambient_len =
        (Duration::from_millis(settings.asr_ambient_ms).as_secs_f64() * f64::from(capture.sample_rate)) as usize;
    let mut ambient = Vec::with_capacity(ambient_len);
    while ambient.len() < ambient_len {
        if cancel.is_cancelled() {
            return Ok(());
        }
        thread::sleep(POLL_INTERVAL);
        ambient.extend(capture.drain());
    }
    gate.calibrate(&ambient);
    info!(threshold = gate.threshold(), recognizer = recognizer.id(), "Ear: calibrated, listening");

    let timings = PhraseTimings {
        listen_timeout: Duration::from_millis(settings.asr_timeout_ms),
        pause: Duration::from_millis(settings.asr_pause_ms),
        phrase_limit: Duration::from_millis(settings.asr_phrase_limit_ms),
    };
    let mut segmenter = PhraseSegmenter::new(gate, timings, capture.sample_rate);
    let frame_len = (capture.sample_rate as usize / 50).max(1);
    let mut pending: Vec<f32> = Vec::new();
    let dump_path = (!settings.debug_wav_path.is_empty()).then(|| PathBuf::from(&settings.debug_wav_path));

    while !cancel.is_cancelled() {
        thread::sleep(POLL_INTERVAL);
        pending.extend(capture.drain());

        let whole = pending.len() - pending.len() % frame_len;
        let frames: Vec<f32> = pending.drain(..whole).collect();
        for frame in frames.chunks(frame_len) {
            match segmenter.push(frame) {
                Segment::Complete(phrase) => {
                    let audio = stt::resample(&phrase, capture.sample_rate, STT_SAMPLE_RATE);
                    if let Some(path) = &dump_path {
                        if let Err(e) = write_wav(path, &audio) {
                            warn!(error = %e, "Ear: failed to write debug WAV");
                        }
                    }
                    match recognizer.recognize(&audio) {
                        Ok(Some(text)) => {
                            info!(%text, "Ear: heard");
                            if tx.send(Utterance::new(text)).is_err() {
                                debug!("Ear: controller gone, stopping capture");
                                return Ok(());
                            }
                        }
                        Ok(None) => debug!("Ear: nothing intelligible"),
                        Err(e) => warn!(error = %e, "Ear: recognition failed"),
                    }
                }
                Segment::TimedOut => debug!("Ear: no speech within listen timeout"),
                Segment::Waiting | Segment::Recording => {}
            }
        }
    }
    info!("Ear: capture stopped");
    Ok(())
}

/// Writes 16 kHz mono float samples for offline inspection.
pub fn write_wav(path: &std::path::Path, samples: &[f32]) -> FaceResult<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: STT_SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| FaceError::Capture(e.to_string()))?;
    for &s in samples {
        writer
            .write_sample(s)
            .map_err(|e| FaceError::Capture(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| FaceError::Capture(e.to_string()))?;
    Ok(())
}
