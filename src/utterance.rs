use std::time::Instant;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// A recognized phrase, handed from capture to the control cycle exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub arrival: Instant,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self::at(text, Instant::now())
    }

    pub fn at(text: impl Into<String>, arrival: Instant) -> Self {
        Self {
            text: text.into(),
            arrival,
        }
    }
}

pub type UtteranceSender = UnboundedSender<Utterance>;
pub type UtteranceReceiver = UnboundedReceiver<Utterance>;

/// The unbounded FIFO between capture (any thread) and the control cycle.
pub fn utterance_queue() -> (UtteranceSender, UtteranceReceiver) {
    unbounded_channel()
}

/// Discards everything queued right now and returns how many were dropped.
pub fn flush(rx: &mut UtteranceReceiver) -> usize {
    let mut dropped = 0;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}
