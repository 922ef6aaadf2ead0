//! D-Bus control surface. Only forwards events into the control cycle and reads
//! its published snapshots; it never touches controller state directly.

use crate::controller::Snapshot;
use crate::error::FaceResult;
use crate::runtime::{EventSender, InputEvent};
use crate::utterance::{Utterance, UtteranceSender};
use tokio::sync::watch;
use tracing::info;
use zbus::{connection, interface, Connection};

pub const SERVICE_NAME: &str = "org.face.Service";
pub const OBJECT_PATH: &str = "/org/face/Service";

pub struct FaceService {
    status: watch::Receiver<Snapshot>,
    events: EventSender,
    utterances: UtteranceSender,
}

impl FaceService {
    pub fn new(
        status: watch::Receiver<Snapshot>,
        events: EventSender,
        utterances: UtteranceSender,
    ) -> Self {
        Self {
            status,
            events,
            utterances,
        }
    }

    fn send(&self, event: InputEvent) -> zbus::fdo::Result<()> {
        self.events
            .send(event)
            .map_err(|_| zbus::fdo::Error::Failed("control loop stopped".into()))
    }
}

#[interface(name = "org.face.Service")]
impl FaceService {
    #[zbus(name = "Ping")]
    async fn ping(&self) -> String {
        "pong".to_string()
    }

    #[zbus(name = "GetVersion")]
    async fn get_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// (state, expression, talking) as of the last control cycle.
    #[zbus(name = "GetStatus")]
    async fn get_status(&self) -> (String, String, bool) {
        let snap = *self.status.borrow();
        (
            snap.state.to_string(),
            snap.expression.tag().to_string(),
            snap.talking,
        )
    }

    /// Same as touching the face.
    #[zbus(name = "Poke")]
    async fn poke(&self) -> zbus::fdo::Result<()> {
        self.send(InputEvent::Pain)
    }

    #[zbus(name = "NextExpression")]
    async fn next_expression(&self) -> zbus::fdo::Result<()> {
        self.send(InputEvent::NextExpression)
    }

    /// Injects text as if the microphone had recognized it.
    #[zbus(name = "Hear")]
    async fn hear(&self, text: String) -> zbus::fdo::Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(zbus::fdo::Error::InvalidArgs("empty text".into()));
        }
        info!(%text, "injected utterance");
        self.utterances
            .send(Utterance::new(text))
            .map_err(|_| zbus::fdo::Error::Failed("control loop stopped".into()))
    }
}

/// Claims the well-known name on the session bus and serves `service`.
pub async fn serve(service: FaceService) -> FaceResult<Connection> {
    let conn = connection::Builder::session()?
        .name(SERVICE_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await?;
    info!("Face service running at {}", SERVICE_NAME);
    Ok(conn)
}
