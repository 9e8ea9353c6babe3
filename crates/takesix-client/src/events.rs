use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::mpsc;

use takesix_shared::types::{GameId, GameStatus};

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// A server call behind a user action failed (transport or server error).
    ActionFailed { message: String },
    /// The followed game entered a new phase.
    PhaseChanged { game_id: GameId, status: GameStatus },
    /// A refresh merged new data into the model.
    ModelUpdated { game_id: GameId },
    /// Final heaps of an ended game are in.
    GameFinished {
        game_id: GameId,
        results: BTreeMap<String, u32>,
    },
    /// No game is followed any more.
    GameCleared,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::ActionFailed { .. } => "action-failed",
            ClientEvent::PhaseChanged { .. } => "phase-changed",
            ClientEvent::ModelUpdated { .. } => "model-updated",
            ClientEvent::GameFinished { .. } => "game-finished",
            ClientEvent::GameCleared => "game-cleared",
        }
    }
}

impl std::fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientEvent::ActionFailed { message } => write!(f, "action failed: {message}"),
            ClientEvent::PhaseChanged { game_id, status } => {
                write!(f, "game {game_id} is now {status}")
            }
            ClientEvent::ModelUpdated { game_id } => write!(f, "game {game_id} updated"),
            ClientEvent::GameFinished { game_id, .. } => write!(f, "game {game_id} finished"),
            ClientEvent::GameCleared => f.write_str("no game selected"),
        }
    }
}

/// Sending half of the event stream. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<ClientEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ClientEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.send(event) {
            tracing::error!(event = e.0.name(), "Failed to emit event, receiver dropped");
        }
    }
}
