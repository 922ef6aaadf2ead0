use crate::controller::Snapshot;
use tracing::info;

/// Paints one snapshot per control cycle. Read-only: it never sees the controller.
pub trait Renderer: Send {
    fn render(&mut self, snapshot: &Snapshot);
}

/// Headless renderer: logs the face whenever it changes.
#[derive(Debug, Default)]
pub struct LogRenderer {
    last: Option<Snapshot>,
    changes: u64,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct frames logged so far.
    pub fn changes(&self) -> u64 {
        self.changes
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, snapshot: &Snapshot) {
        if self.last.as_ref() == Some(snapshot) {
            return;
        }
        info!(
            state = %snapshot.state,
            expression = %snapshot.expression,
            talking = snapshot.talking,
            "face"
        );
        self.last = Some(*snapshot);
        self.changes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::InteractionState;
    use crate::expression::Expression;

    #[test]
    fn test_only_changes_are_logged() {
        let mut renderer = LogRenderer::new();
        let idle = Snapshot {
            state: InteractionState::Idle,
            expression: Expression::HappyOpen,
            talking: false,
        };
        renderer.render(&idle);
        renderer.render(&idle);
        renderer.render(&Snapshot {
            expression: Expression::Wink,
            ..idle
        });
        assert_eq!(renderer.changes(), 2);
    }
}
