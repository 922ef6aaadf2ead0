//! Energy-based phrase segmentation for the capture loop.
//!
//! Mirrors the classic "listen" behaviour: wait for speech up to a timeout,
//! record until a pause or a phrase-length limit, keep a short pre-roll so the
//! first syllable is not clipped.

use std::collections::VecDeque;
use std::time::Duration;

/// Ambient noise is multiplied by this before it can raise the threshold.
const AMBIENT_MARGIN: f32 = 1.5;
const PREROLL: Duration = Duration::from_millis(300);

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

#[derive(Debug, Clone, Copy)]
pub struct EnergyGate {
    min_threshold: f32,
    threshold: f32,
}

impl EnergyGate {
    pub fn new(min_threshold: f32) -> Self {
        Self {
            min_threshold,
            threshold: min_threshold,
        }
    }

    /// Raises the threshold above the measured room noise. Never lowers it
    /// below the configured minimum.
    pub fn calibrate(&mut self, ambient: &[f32]) {
        self.threshold = (rms(ambient) * AMBIENT_MARGIN).max(self.min_threshold);
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_speech(&self, frame: &[f32]) -> bool {
        rms(frame) > self.threshold
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PhraseTimings {
    pub listen_timeout: Duration,
    pub pause: Duration,
    pub phrase_limit: Duration,
}

#[derive(Debug, PartialEq)]
pub enum Segment {
    Waiting,
    Recording,
    /// No speech started within the listen timeout.
    TimedOut,
    Complete(Vec<f32>),
}

#[derive(Debug)]
enum Phase {
    Waiting { waited: usize },
    Recording { silence: usize },
}

pub struct PhraseSegmenter {
    gate: EnergyGate,
    timeout: usize,
    pause: usize,
    limit: usize,
    preroll_len: usize,
    preroll: VecDeque<f32>,
    recorded: Vec<f32>,
    phase: Phase,
}

fn samples_for(d: Duration, sample_rate: u32) -> usize {
    (d.as_secs_f64() * f64::from(sample_rate)) as usize
}

impl PhraseSegmenter {
    pub fn new(gate: EnergyGate, timings: PhraseTimings, sample_rate: u32) -> Self {
        let preroll_len = samples_for(PREROLL, sample_rate);
        Self {
            gate,
            timeout: samples_for(timings.listen_timeout, sample_rate),
            pause: samples_for(timings.pause, sample_rate),
            limit: samples_for(timings.phrase_limit, sample_rate),
            preroll_len,
            preroll: VecDeque::with_capacity(preroll_len),
            recorded: Vec::new(),
            phase: Phase::Waiting { waited: 0 },
        }
    }

    pub fn reset(&mut self) {
        self.preroll.clear();
        self.recorded.clear();
        self.phase = Phase::Waiting { waited: 0 };
    }

    /// Feeds one frame of mono samples.
    pub fn push(&mut self, frame: &[f32]) -> Segment {
        let speech = self.gate.is_speech(frame);

        match &mut self.phase {
            Phase::Waiting { waited } => {
                if speech {
                    self.recorded.clear();
                    self.recorded.extend(self.preroll.drain(..));
                    self.recorded.extend_from_slice(frame);
                    self.phase = Phase::Recording { silence: 0 };
                    return self.check_limit();
                }

                *waited += frame.len();
                if *waited >= self.timeout {
                    self.reset();
                    return Segment::TimedOut;
                }

                for &s in frame {
                    if self.preroll.len() == self.preroll_len {
                        self.preroll.pop_front();
                    }
                    if self.preroll_len > 0 {
                        self.preroll.push_back(s);
                    }
                }
                Segment::Waiting
            }
            Phase::Recording { silence } => {
                self.recorded.extend_from_slice(frame);
                if speech {
                    *silence = 0;
                } else {
                    *silence += frame.len();
                    if *silence >= self.pause {
                        return self.finish();
                    }
                }
                self.check_limit()
            }
        }
    }

    fn check_limit(&mut self) -> Segment {
        if self.recorded.len() >= self.limit {
            self.finish()
        } else {
            Segment::Recording
        }
    }

    fn finish(&mut self) -> Segment {
        let phrase = std::mem::take(&mut self.recorded);
        self.reset();
        Segment::Complete(phrase)
    }
}
