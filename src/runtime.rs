//! The fixed-rate control cycle: the only place controller state is touched.

use crate::controller::{InteractionController, Snapshot};
use crate::render::Renderer;
use crate::utterance::UtteranceReceiver;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Inputs that are not speech: touch and the "next face" key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Pain,
    NextExpression,
}

pub type EventSender = UnboundedSender<InputEvent>;
pub type EventReceiver = UnboundedReceiver<InputEvent>;

pub fn event_queue() -> (EventSender, EventReceiver) {
    unbounded_channel()
}

pub struct ControlLoop {
    controller: InteractionController,
    utterances: UtteranceReceiver,
    events: EventReceiver,
    status: watch::Sender<Snapshot>,
    renderer: Box<dyn Renderer>,
    period: Duration,
}

impl ControlLoop {
    pub fn new(
        controller: InteractionController,
        utterances: UtteranceReceiver,
        events: EventReceiver,
        renderer: Box<dyn Renderer>,
        period: Duration,
    ) -> Self {
        let (status, _) = watch::channel(controller.snapshot(Instant::now()));
        Self {
            controller,
            utterances,
            events,
            status,
            renderer,
            period,
        }
    }

    /// Receives every snapshot that differs from the previous one.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.status.subscribe()
    }

    /// One iteration: input events, at most one utterance, time-driven
    /// transitions, publish, render.
    pub fn cycle(&mut self, now: Instant) -> Snapshot {
        while let Ok(event) = self.events.try_recv() {
            debug!(?event, "input event");
            match event {
                InputEvent::Pain => self.controller.trigger_pain(now),
                InputEvent::NextExpression => self.controller.cycle_expression(now),
            }
        }

        let snapshot = self.controller.step(&mut self.utterances, now);
        self.status.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
        self.renderer.render(&snapshot);
        snapshot
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period = ?self.period, "control loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.cycle(Instant::now());
                }
            }
        }
        info!("control loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_loader::Settings;
    use crate::controller::testing::{Call, RecordingOutput};
    use crate::controller::InteractionState;
    use crate::expression::Expression;
    use crate::render::LogRenderer;
    use crate::utterance::{utterance_queue, Utterance, UtteranceSender};
    use std::sync::Arc;

    fn control_loop() -> (ControlLoop, UtteranceSender, EventSender, Arc<RecordingOutput>) {
        let settings = Arc::new(Settings {
            intro_phrase: String::new(),
            ..Settings::default()
        });
        let output = Arc::new(RecordingOutput::default());
        let controller = InteractionController::new(settings.clone(), output.clone(), Instant::now());
        let (utter_tx, utter_rx) = utterance_queue();
        let (event_tx, event_rx) = event_queue();
        let lp = ControlLoop::new(
            controller,
            utter_rx,
            event_rx,
            Box::new(LogRenderer::new()),
            settings.frame_period(),
        );
        (lp, utter_tx, event_tx, output)
    }

    #[test]
    fn test_pain_event_shows_angry_without_changing_state() {
        let (mut lp, _utter, events, output) = control_loop();
        events.send(InputEvent::Pain).unwrap();

        let snap = lp.cycle(Instant::now());
        assert_eq!(snap.expression, Expression::Angry);
        assert_eq!(snap.state, InteractionState::Idle);
        assert_eq!(output.calls(), vec![Call::SpeakNow("Ai! Isso dói!".into())]);
    }

    #[test]
    fn test_cycle_publishes_changes() {
        let (mut lp, utter, _events, _output) = control_loop();
        let mut status = lp.subscribe();

        utter.send(Utterance::new("unip")).unwrap();
        lp.cycle(Instant::now());
        assert!(status.has_changed().unwrap());
        let snap = *status.borrow_and_update();
        assert_eq!(snap.state, InteractionState::Awake);
        assert!(snap.talking);
    }

    #[tokio::test]
    async fn test_run_processes_queue_until_cancelled() {
        let (lp, utter, _events, output) = control_loop();
        let mut status = lp.subscribe();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(lp.run(cancel.clone()));

        utter.send(Utterance::new("unip pare")).unwrap();
        let snap = tokio::time::timeout(
            Duration::from_secs(2),
            status.wait_for(|s| s.state == InteractionState::Executing),
        )
        .await
        .expect("controller never executed")
        .map(|s| *s)
        .unwrap();
        assert_eq!(snap.expression, Expression::Talking);

        output.finish();
        tokio::time::timeout(
            Duration::from_secs(2),
            status.wait_for(|s| s.state == InteractionState::Idle),
        )
        .await
        .unwrap()
        .unwrap();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
