//! Delivery sinks for post-transition state broadcasts.
//!
//! After every applied transition the session actor pushes a redacted
//! hydrate to each registered sink. A [`RealConnection`] forwards messages
//! to a transport task over a channel; an [`AgentConnection`] is a marker
//! for seats driven by the agent pool, which observes canonical state
//! through the actor's watch channel instead.

use conclave_types::{Seat, ServerMessage};
use tokio::sync::mpsc;
use tracing::debug;

/// A recipient of redacted state broadcasts.
pub trait ActionSink: Send {
    /// The seat this sink sees the game as, or `None` for a spectator.
    fn viewer(&self) -> Option<Seat>;

    /// Deliver one message. Must not block; a closed or slow recipient is
    /// the sink's problem, never the actor's.
    fn deliver(&self, message: ServerMessage);
}

/// A live transport connection (websocket writer task, test harness).
pub struct RealConnection {
    viewer: Option<Seat>,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl RealConnection {
    /// Wrap a channel to a transport task.
    pub const fn new(viewer: Option<Seat>, tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { viewer, tx }
    }
}

impl ActionSink for RealConnection {
    fn viewer(&self) -> Option<Seat> {
        self.viewer
    }

    fn deliver(&self, message: ServerMessage) {
        if self.tx.send(message).is_err() {
            debug!(viewer = ?self.viewer, "dropped message to closed connection");
        }
    }
}

/// Marker sink for an agent-driven seat.
///
/// The agent pool reads canonical state from the actor's watch channel and
/// redacts per engine, so nothing is delivered here. Registering the marker
/// keeps the seat's connection slot occupied and its viewer attributable.
pub struct AgentConnection {
    viewer: Seat,
}

impl AgentConnection {
    /// Mark a seat as agent-driven.
    pub const fn new(viewer: Seat) -> Self {
        Self { viewer }
    }
}

impl ActionSink for AgentConnection {
    fn viewer(&self) -> Option<Seat> {
        Some(self.viewer)
    }

    fn deliver(&self, _message: ServerMessage) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use conclave_types::{GameEvent, GamePhase};

    #[test]
    fn real_connection_forwards_messages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = RealConnection::new(Some(Seat(2)), tx);
        assert_eq!(sink.viewer(), Some(Seat(2)));

        sink.deliver(ServerMessage::Event(GameEvent::PhaseChanged {
            from: GamePhase::RoleReveal,
            to: GamePhase::TeamBuilding,
        }));
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::Event(GameEvent::PhaseChanged { .. }))
        ));
    }

    #[test]
    fn closed_connection_is_silently_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sink = RealConnection::new(None, tx);
        sink.deliver(ServerMessage::Event(GameEvent::PhaseChanged {
            from: GamePhase::RoleReveal,
            to: GamePhase::TeamBuilding,
        }));
    }

    #[test]
    fn agent_marker_swallows_messages() {
        let sink = AgentConnection::new(Seat(0));
        assert_eq!(sink.viewer(), Some(Seat(0)));
        sink.deliver(ServerMessage::Event(GameEvent::PhaseChanged {
            from: GamePhase::RoleReveal,
            to: GamePhase::TeamBuilding,
        }));
    }
}
