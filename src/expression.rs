//! Facial expressions and the timed overlays that pre-empt them.
//!
//! Overlays are kept as independent `(kind, expiry)` entries and only collapsed
//! into a single [`Expression`] at sampling time by [`resolve`]. A pain flash in
//! the middle of a reply therefore falls back to `Talking` (or `Sad`) as soon as
//! it expires.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// The fixed set of faces the renderer knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    HappyOpen,
    SmileEyes,
    Wink,
    Sad,
    Angry,
    Talking,
}

impl Expression {
    pub const ALL: [Expression; 6] = [
        Expression::HappyOpen,
        Expression::SmileEyes,
        Expression::Wink,
        Expression::Sad,
        Expression::Angry,
        Expression::Talking,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Expression::HappyOpen => "happy_open",
            Expression::SmileEyes => "smile_eyes",
            Expression::Wink => "wink",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Talking => "talking",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.tag() == tag)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Timed overlay kinds. Talking is not here: it is derived from the speech
/// output every cycle rather than armed with a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    Pain,
    Sad,
}

#[derive(Debug, Default, Clone)]
pub struct Overlays {
    entries: Vec<(OverlayKind, Instant)>,
}

impl Overlays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `kind` until `now + duration`. Re-arming replaces the old expiry.
    pub fn arm(&mut self, kind: OverlayKind, now: Instant, duration: Duration) {
        let until = now + duration;
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = until,
            None => self.entries.push((kind, until)),
        }
    }

    pub fn is_active(&self, kind: OverlayKind, now: Instant) -> bool {
        self.entries
            .iter()
            .any(|(k, until)| *k == kind && now < *until)
    }

    /// Drops entries that expired before `now`.
    pub fn prune(&mut self, now: Instant) {
        self.entries.retain(|(_, until)| now < *until);
    }

    pub fn expiry(&self, kind: OverlayKind) -> Option<Instant> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, until)| *until)
    }
}

/// Picks the expression to draw: Pain > Talking > Sad > baseline.
pub fn resolve(overlays: &Overlays, now: Instant, talking: bool, baseline: Expression) -> Expression {
    if overlays.is_active(OverlayKind::Pain, now) {
        Expression::Angry
    } else if talking {
        Expression::Talking
    } else if overlays.is_active(OverlayKind::Sad, now) {
        Expression::Sad
    } else {
        baseline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    #[test]
    fn test_baseline_when_nothing_active() {
        let now = Instant::now();
        let overlays = Overlays::new();
        assert_eq!(resolve(&overlays, now, false, Expression::Wink), Expression::Wink);
    }

    #[test]
    fn test_pain_beats_talking_and_sad() {
        let now = Instant::now();
        let mut overlays = Overlays::new();
        overlays.arm(OverlayKind::Sad, now, 3 * SEC);
        overlays.arm(OverlayKind::Pain, now, SEC);
        assert_eq!(resolve(&overlays, now, true, Expression::HappyOpen), Expression::Angry);
    }

    #[test]
    fn test_talking_resumes_after_pain_expires() {
        let now = Instant::now();
        let mut overlays = Overlays::new();
        overlays.arm(OverlayKind::Sad, now, 3 * SEC);
        overlays.arm(OverlayKind::Pain, now, SEC);

        let later = now + 2 * SEC;
        assert_eq!(resolve(&overlays, later, true, Expression::HappyOpen), Expression::Talking);
        assert_eq!(resolve(&overlays, later, false, Expression::HappyOpen), Expression::Sad);

        let much_later = now + 4 * SEC;
        assert_eq!(
            resolve(&overlays, much_later, false, Expression::HappyOpen),
            Expression::HappyOpen
        );
    }

    #[test]
    fn test_rearm_extends_expiry() {
        let now = Instant::now();
        let mut overlays = Overlays::new();
        overlays.arm(OverlayKind::Sad, now, SEC);
        overlays.arm(OverlayKind::Sad, now + SEC / 2, SEC);
        assert_eq!(overlays.expiry(OverlayKind::Sad), Some(now + SEC + SEC / 2));
        assert!(overlays.is_active(OverlayKind::Sad, now + SEC + SEC / 4));
    }

    #[test]
    fn test_prune_removes_expired() {
        let now = Instant::now();
        let mut overlays = Overlays::new();
        overlays.arm(OverlayKind::Pain, now, SEC);
        overlays.prune(now + 2 * SEC);
        assert_eq!(overlays.expiry(OverlayKind::Pain), None);
    }

    #[test]
    fn test_tags_round_trip() {
        for e in Expression::ALL {
            assert_eq!(Expression::from_tag(e.tag()), Some(e));
        }
        assert_eq!(Expression::from_tag("confused"), None);
    }
}
