//! The interaction state machine.
//!
//! Owned by the control cycle and mutated only there. Collaborators are reached
//! through [`SpeechOutput`] (fire-and-forget commands plus a polled
//! `is_speaking`) and the utterance queue; none of them can fail into here.

use crate::catalog::{self, Reply};
use crate::config_loader::Settings;
use crate::engine::SpeechOutput;
use crate::expression::{self, Expression, OverlayKind, Overlays};
use crate::utterance::{self, UtteranceReceiver};
use crate::wake::WakeWords;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionState {
    Idle,
    /// Bare wake word heard; waiting for a command until the deadline.
    Awake,
    /// A reply is being spoken.
    Executing,
}

impl fmt::Display for InteractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InteractionState::Idle => "idle",
            InteractionState::Awake => "awake",
            InteractionState::Executing => "executing",
        };
        f.write_str(name)
    }
}

/// What one utterance did to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No wake word while idle or executing.
    Ignored,
    /// Bare wake word; a command window is open.
    Listening,
    /// A reply was queued and the controller is executing.
    Replied(Reply),
    /// Unresolved command inside a window; fallback spoken.
    Fallback,
    /// Unresolved again in the same window; nothing spoken.
    FallbackSuppressed,
}

/// What the renderer and the control surface see each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub state: InteractionState,
    pub expression: Expression,
    pub talking: bool,
}

pub struct InteractionController {
    settings: Arc<Settings>,
    output: Arc<dyn SpeechOutput>,
    wake: WakeWords,
    state: InteractionState,
    awake_deadline: Option<Instant>,
    fallback_said: bool,
    overlays: Overlays,
    baseline: Expression,
    baseline_since: Instant,
    intro_at: Option<Instant>,
    last_ouch: Option<Instant>,
    rng: StdRng,
}

impl InteractionController {
    pub fn new(settings: Arc<Settings>, output: Arc<dyn SpeechOutput>, started: Instant) -> Self {
        Self::with_rng(settings, output, started, StdRng::from_entropy())
    }

    pub fn with_rng(
        settings: Arc<Settings>,
        output: Arc<dyn SpeechOutput>,
        started: Instant,
        rng: StdRng,
    ) -> Self {
        let wake = WakeWords::new(&settings.wake_words);
        let intro_at =
            (!settings.intro_phrase.trim().is_empty()).then(|| started + settings.intro_delay());
        Self {
            settings,
            output,
            wake,
            state: InteractionState::Idle,
            awake_deadline: None,
            fallback_said: false,
            overlays: Overlays::new(),
            baseline: Expression::HappyOpen,
            baseline_since: started,
            intro_at,
            last_ouch: None,
            rng,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn awake_deadline(&self) -> Option<Instant> {
        self.awake_deadline
    }

    pub fn fallback_said(&self) -> bool {
        self.fallback_said
    }

    pub fn baseline(&self) -> Expression {
        self.baseline
    }

    pub fn overlays(&self) -> &Overlays {
        &self.overlays
    }

    /// One control cycle: intro, at most one utterance, time-driven transitions.
    pub fn step(&mut self, queue: &mut UtteranceReceiver, now: Instant) -> Snapshot {
        self.maybe_intro(now);
        if let Ok(heard) = queue.try_recv() {
            self.handle_utterance(&heard.text, queue, now);
        }
        self.tick(now)
    }

    /// Applies one utterance. `backlog` is flushed when the wake word is heard.
    pub fn handle_utterance(
        &mut self,
        text: &str,
        backlog: &mut UtteranceReceiver,
        now: Instant,
    ) -> Outcome {
        if self.wake.contains(text) {
            // Interrupt first, whatever the state.
            self.output.speak_now(&self.settings.listening_prompt);
            let dropped = utterance::flush(backlog);
            if dropped > 0 {
                debug!(dropped, "dropped stale utterances after wake word");
            }

            let remainder = self.wake.strip(text);
            if remainder.is_empty() {
                self.enter_awake(now);
                return Outcome::Listening;
            }

            let reply = match catalog::resolve(&remainder) {
                Some(reply) => reply,
                None => {
                    info!(%remainder, "command not understood");
                    self.overlays
                        .arm(OverlayKind::Sad, now, self.settings.sad_duration());
                    Reply {
                        text: self.settings.fallback_phrase.clone(),
                        expression: Expression::Sad,
                    }
                }
            };
            self.execute(reply.clone(), now);
            return Outcome::Replied(reply);
        }

        match self.state {
            InteractionState::Idle => {
                debug!(%text, "ignored without wake word");
                Outcome::Ignored
            }
            InteractionState::Executing => {
                debug!(%text, "ignored while executing");
                Outcome::Ignored
            }
            InteractionState::Awake => match catalog::resolve(text) {
                Some(reply) => {
                    self.execute(reply.clone(), now);
                    Outcome::Replied(reply)
                }
                None if self.fallback_said => {
                    debug!(%text, "not understood, fallback already said in this window");
                    Outcome::FallbackSuppressed
                }
                None => {
                    info!(%text, "command not understood");
                    self.output.speak(&self.settings.fallback_phrase);
                    self.fallback_said = true;
                    self.overlays
                        .arm(OverlayKind::Sad, now, self.settings.sad_duration());
                    Outcome::Fallback
                }
            },
        }
    }

    /// Time-driven transitions and the idle animation. Never speaks.
    pub fn tick(&mut self, now: Instant) -> Snapshot {
        match self.state {
            InteractionState::Awake => {
                if self.awake_deadline.map_or(true, |deadline| now >= deadline) {
                    info!("command window expired");
                    self.set_state(InteractionState::Idle);
                }
            }
            InteractionState::Executing => {
                if !self.output.is_speaking() {
                    self.set_state(InteractionState::Idle);
                }
            }
            InteractionState::Idle => {}
        }

        self.overlays.prune(now);
        let talking = self.output.is_speaking();
        let covered = talking
            || self.overlays.is_active(OverlayKind::Pain, now)
            || self.overlays.is_active(OverlayKind::Sad, now);

        if !covered
            && self.state == InteractionState::Idle
            && now.duration_since(self.baseline_since) >= self.settings.idle_cycle()
        {
            self.pick_idle_expression(now);
        }

        Snapshot {
            state: self.state,
            expression: expression::resolve(&self.overlays, now, talking, self.baseline),
            talking,
        }
    }

    /// Touch on the face: angry overlay, plus "ouch" unless said very recently.
    pub fn trigger_pain(&mut self, now: Instant) {
        self.overlays
            .arm(OverlayKind::Pain, now, self.settings.pain_duration());
        let cooled = self
            .last_ouch
            .map_or(true, |at| now.duration_since(at) >= self.settings.pain_cooldown());
        if cooled {
            self.output.speak_now(&self.settings.ouch_phrase);
            self.last_ouch = Some(now);
        }
    }

    /// Manual "next face": a random idle expression, idle timer restarted.
    pub fn cycle_expression(&mut self, now: Instant) {
        self.pick_idle_expression(now);
    }

    /// Expression to draw at `now`.
    pub fn expression(&self, now: Instant) -> Expression {
        expression::resolve(&self.overlays, now, self.output.is_speaking(), self.baseline)
    }

    /// Read-only view for `now`, without advancing any timer.
    pub fn snapshot(&self, now: Instant) -> Snapshot {
        let talking = self.output.is_speaking();
        Snapshot {
            state: self.state,
            expression: expression::resolve(&self.overlays, now, talking, self.baseline),
            talking,
        }
    }

    fn maybe_intro(&mut self, now: Instant) {
        if let Some(at) = self.intro_at {
            if now >= at {
                self.intro_at = None;
                self.output.speak(&self.settings.intro_phrase);
            }
        }
    }

    fn enter_awake(&mut self, now: Instant) {
        self.set_state(InteractionState::Awake);
        self.awake_deadline = Some(now + self.settings.command_window());
        self.fallback_said = false;
    }

    fn execute(&mut self, reply: Reply, now: Instant) {
        info!(reply = %reply.text, expression = %reply.expression, "replying");
        self.output.speak(&reply.text);
        self.baseline = reply.expression;
        self.baseline_since = now;
        self.set_state(InteractionState::Executing);
    }

    fn set_state(&mut self, next: InteractionState) {
        if next != InteractionState::Awake {
            self.awake_deadline = None;
        }
        if next != self.state {
            debug!(from = %self.state, to = %next, "state transition");
            self.state = next;
        }
    }

    fn pick_idle_expression(&mut self, now: Instant) {
        if let Some(next) = self.settings.idle_expressions.choose(&mut self.rng) {
            self.baseline = *next;
        }
        self.baseline_since = now;
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Call, RecordingOutput};
    use super::*;
    use crate::utterance::{utterance_queue, Utterance};
    use std::time::Duration;

    const ACK: &str = "Estou ouvindo.";
    const FALLBACK: &str = "Desculpe, não entendi. Pode repetir?";

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn settings() -> Settings {
        Settings {
            intro_phrase: String::new(),
            ..Settings::default()
        }
    }

    fn controller(settings: Settings) -> (InteractionController, Arc<RecordingOutput>, Instant) {
        let output = Arc::new(RecordingOutput::default());
        let start = Instant::now();
        let ctl = InteractionController::with_rng(
            Arc::new(settings),
            output.clone(),
            start,
            StdRng::seed_from_u64(7),
        );
        (ctl, output, start)
    }

    #[test]
    fn test_bare_wake_word_opens_window() {
        let (mut ctl, out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();

        assert_eq!(ctl.handle_utterance("unip", &mut rx, t0), Outcome::Listening);
        assert_eq!(ctl.state(), InteractionState::Awake);
        assert_eq!(ctl.awake_deadline(), Some(t0 + ms(7000)));
        assert!(!ctl.fallback_said());
        assert_eq!(out.calls(), vec![Call::SpeakNow(ACK.into())]);
    }

    #[test]
    fn test_navigate_after_wake_word() {
        let (mut ctl, out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();

        ctl.handle_utterance("unip", &mut rx, t0);
        out.finish();
        let outcome = ctl.handle_utterance("vá para a cozinha", &mut rx, t0 + ms(1500));

        let reply = Reply {
            text: "Indo para a cozinha.".into(),
            expression: Expression::Wink,
        };
        assert_eq!(outcome, Outcome::Replied(reply));
        assert_eq!(ctl.state(), InteractionState::Executing);
        assert_eq!(ctl.baseline(), Expression::Wink);
        assert_eq!(ctl.awake_deadline(), None);
        assert_eq!(
            out.calls(),
            vec![Call::SpeakNow(ACK.into()), Call::Speak("Indo para a cozinha.".into())]
        );
    }

    #[test]
    fn test_wake_word_with_command_skips_awake() {
        let (mut ctl, out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();

        ctl.handle_utterance("unip pare", &mut rx, t0);
        assert_eq!(ctl.state(), InteractionState::Executing);
        assert_eq!(ctl.baseline(), Expression::HappyOpen);
        assert_eq!(ctl.awake_deadline(), None);
        assert_eq!(
            out.calls(),
            vec![Call::SpeakNow(ACK.into()), Call::Speak("Ok, parando por agora.".into())]
        );
    }

    #[test]
    fn test_wake_word_with_punctuation_only_is_bare() {
        let (mut ctl, _out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();
        assert_eq!(ctl.handle_utterance("Unip!", &mut rx, t0), Outcome::Listening);
    }

    #[test]
    fn test_wake_word_with_unknown_command_falls_back_sad() {
        let (mut ctl, out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();

        ctl.handle_utterance("unip blablabla", &mut rx, t0);
        assert_eq!(ctl.state(), InteractionState::Executing);
        assert_eq!(ctl.baseline(), Expression::Sad);
        assert!(ctl.overlays().is_active(OverlayKind::Sad, t0 + ms(2999)));
        assert_eq!(
            out.calls(),
            vec![Call::SpeakNow(ACK.into()), Call::Speak(FALLBACK.into())]
        );
    }

    #[test]
    fn test_idle_ignores_input_without_wake_word() {
        let (mut ctl, out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();

        assert_eq!(ctl.handle_utterance("vá para a cozinha", &mut rx, t0), Outcome::Ignored);
        assert_eq!(ctl.state(), InteractionState::Idle);
        assert!(out.calls().is_empty());
    }

    #[test]
    fn test_fallback_spoken_once_per_window() {
        let (mut ctl, out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();

        ctl.handle_utterance("unip", &mut rx, t0);
        out.clear();

        assert_eq!(ctl.handle_utterance("blablabla", &mut rx, t0 + ms(100)), Outcome::Fallback);
        assert_eq!(ctl.state(), InteractionState::Awake);
        assert!(ctl.fallback_said());
        assert!(ctl.overlays().is_active(OverlayKind::Sad, t0 + ms(200)));

        assert_eq!(
            ctl.handle_utterance("xyz", &mut rx, t0 + ms(200)),
            Outcome::FallbackSuppressed
        );
        assert_eq!(out.calls(), vec![Call::Speak(FALLBACK.into())]);
        assert_eq!(ctl.state(), InteractionState::Awake);
    }

    #[test]
    fn test_new_window_resets_fallback_flag() {
        let (mut ctl, out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();

        ctl.handle_utterance("unip", &mut rx, t0);
        ctl.handle_utterance("blablabla", &mut rx, t0 + ms(10));
        ctl.handle_utterance("unip", &mut rx, t0 + ms(20));
        assert!(!ctl.fallback_said());
        out.clear();

        assert_eq!(ctl.handle_utterance("blablabla", &mut rx, t0 + ms(30)), Outcome::Fallback);
        assert_eq!(out.calls(), vec![Call::Speak(FALLBACK.into())]);
    }

    #[test]
    fn test_window_expiry_returns_to_idle_silently() {
        let (mut ctl, out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();

        ctl.handle_utterance("unip", &mut rx, t0);
        out.finish();
        out.clear();

        assert_eq!(ctl.tick(t0 + ms(6999)).state, InteractionState::Awake);
        assert_eq!(ctl.tick(t0 + ms(7000)).state, InteractionState::Idle);
        assert_eq!(ctl.awake_deadline(), None);
        assert_eq!(ctl.tick(t0 + ms(7100)).state, InteractionState::Idle);
        assert!(out.calls().is_empty());

        // The window is closed: commands are ignored again.
        assert_eq!(ctl.handle_utterance("pare", &mut rx, t0 + ms(7200)), Outcome::Ignored);
    }

    #[test]
    fn test_executing_waits_for_speech_to_finish() {
        let (mut ctl, out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();

        ctl.handle_utterance("unip conte uma piada", &mut rx, t0);
        assert_eq!(ctl.tick(t0 + ms(500)).state, InteractionState::Executing);

        out.clear();
        assert_eq!(ctl.handle_utterance("pare", &mut rx, t0 + ms(600)), Outcome::Ignored);
        assert!(out.calls().is_empty());
        assert_eq!(ctl.tick(t0 + ms(700)).state, InteractionState::Executing);

        out.finish();
        assert_eq!(ctl.tick(t0 + ms(800)).state, InteractionState::Idle);
    }

    #[test]
    fn test_wake_word_preempts_executing() {
        let (mut ctl, out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();

        ctl.handle_utterance("unip me conte uma piada", &mut rx, t0);
        out.clear();

        assert_eq!(ctl.handle_utterance("unip", &mut rx, t0 + ms(300)), Outcome::Listening);
        assert_eq!(out.calls(), vec![Call::SpeakNow(ACK.into())]);
        assert_eq!(ctl.state(), InteractionState::Awake);
    }

    #[test]
    fn test_wake_word_flushes_backlog() {
        let (mut ctl, out, t0) = controller(settings());
        let (tx, mut rx) = utterance_queue();

        tx.send(Utterance::at("unip", t0)).unwrap();
        tx.send(Utterance::at("estou triste", t0)).unwrap();
        tx.send(Utterance::at("vá para a sala", t0)).unwrap();

        let snap = ctl.step(&mut rx, t0);
        assert_eq!(snap.state, InteractionState::Awake);
        assert!(rx.try_recv().is_err());
        assert_eq!(out.calls(), vec![Call::SpeakNow(ACK.into())]);
    }

    #[test]
    fn test_step_drains_one_utterance_per_cycle() {
        let (mut ctl, _out, t0) = controller(settings());
        let (tx, mut rx) = utterance_queue();

        tx.send(Utterance::at("bom dia", t0)).unwrap();
        tx.send(Utterance::at("boa noite", t0)).unwrap();
        ctl.step(&mut rx, t0);
        assert_eq!(rx.try_recv().unwrap().text, "boa noite");
    }

    #[test]
    fn test_talking_shows_while_speaking_then_baseline() {
        let (mut ctl, out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();

        ctl.handle_utterance("unip vá para a sala", &mut rx, t0);
        let snap = ctl.tick(t0 + ms(10));
        assert!(snap.talking);
        assert_eq!(snap.expression, Expression::Talking);

        out.finish();
        let snap = ctl.tick(t0 + ms(20));
        assert_eq!(snap.expression, Expression::Wink);
    }

    #[test]
    fn test_pain_overrides_and_respects_cooldown() {
        let (mut ctl, out, t0) = controller(settings());

        ctl.trigger_pain(t0);
        assert_eq!(ctl.expression(t0 + ms(100)), Expression::Angry);
        ctl.trigger_pain(t0 + ms(500));
        ctl.trigger_pain(t0 + ms(1300));
        assert_eq!(
            out.calls(),
            vec![
                Call::SpeakNow("Ai! Isso dói!".into()),
                Call::SpeakNow("Ai! Isso dói!".into())
            ]
        );
        // Re-armed at 1300 ms, so still angry past the first expiry.
        assert_eq!(ctl.expression(t0 + ms(2000)), Expression::Angry);

        out.finish();
        assert_eq!(ctl.expression(t0 + ms(2800)), ctl.baseline());
    }

    #[test]
    fn test_pain_is_not_a_state_transition() {
        let (mut ctl, _out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();

        ctl.handle_utterance("unip", &mut rx, t0);
        ctl.trigger_pain(t0 + ms(10));
        assert_eq!(ctl.state(), InteractionState::Awake);
        assert_eq!(ctl.awake_deadline(), Some(t0 + ms(7000)));
    }

    #[test]
    fn test_idle_cycle_changes_baseline_only_when_idle() {
        let mut s = settings();
        s.idle_expressions = vec![Expression::SmileEyes];
        let (mut ctl, out, t0) = controller(s);
        let (_tx, mut rx) = utterance_queue();

        assert_eq!(ctl.tick(t0 + ms(1199)).expression, Expression::HappyOpen);
        assert_eq!(ctl.tick(t0 + ms(1200)).expression, Expression::SmileEyes);

        ctl.handle_utterance("unip", &mut rx, t0 + ms(1300));
        out.finish();
        let baseline = ctl.baseline();
        ctl.tick(t0 + ms(5000));
        assert_eq!(ctl.state(), InteractionState::Awake);
        assert_eq!(ctl.baseline(), baseline);
    }

    #[test]
    fn test_idle_cycle_waits_for_sad_overlay() {
        let mut s = settings();
        s.idle_expressions = vec![Expression::Wink];
        let (mut ctl, out, t0) = controller(s);
        let (_tx, mut rx) = utterance_queue();

        ctl.handle_utterance("unip blablabla", &mut rx, t0);
        out.finish();
        let snap = ctl.tick(t0 + ms(1500));
        assert_eq!(snap.state, InteractionState::Idle);
        assert_eq!(snap.expression, Expression::Sad);
        assert_eq!(ctl.baseline(), Expression::Sad);

        assert_eq!(ctl.tick(t0 + ms(3000)).expression, Expression::Wink);
    }

    #[test]
    fn test_manual_cycle_restarts_idle_timer() {
        let mut s = settings();
        s.idle_expressions = vec![Expression::Wink];
        let (mut ctl, _out, t0) = controller(s);

        ctl.cycle_expression(t0 + ms(1000));
        assert_eq!(ctl.baseline(), Expression::Wink);
        assert_eq!(ctl.tick(t0 + ms(2100)).expression, Expression::Wink);
    }

    #[test]
    fn test_intro_spoken_once_after_delay() {
        let s = Settings::default();
        let intro = s.intro_phrase.clone();
        let (mut ctl, out, t0) = controller(s);
        let (_tx, mut rx) = utterance_queue();

        ctl.step(&mut rx, t0 + ms(1999));
        assert!(out.calls().is_empty());
        ctl.step(&mut rx, t0 + ms(2000));
        ctl.step(&mut rx, t0 + ms(2100));
        assert_eq!(out.calls(), vec![Call::Speak(intro)]);
    }

    #[test]
    fn test_empty_intro_is_disabled() {
        let (mut ctl, out, t0) = controller(settings());
        let (_tx, mut rx) = utterance_queue();
        ctl.step(&mut rx, t0 + ms(5000));
        assert!(out.calls().is_empty());
    }
}
