//! Session host for Conclave tables.
//!
//! One logical actor owns the canonical game state. Every input -- a human
//! action off a transport, an agent decision, a timer tick -- enters the
//! same mailbox and applies strictly in arrival order. After each applied
//! transition the actor broadcasts per-viewer redacted state to registered
//! sinks and publishes the canonical state on a watch channel that feeds
//! the agent pool task.
//!
//! The `conclave-session` binary wires this together into a complete
//! self-play session; see [`actor::SessionActor`] for the run loop.

pub mod actor;
pub mod config;
pub mod error;
pub mod setup;
pub mod sink;

pub use actor::{spawn_agent_task, SessionActor, SessionHandle};
pub use config::SessionConfig;
pub use error::SessionError;
pub use setup::{dealt_session, pool_for};
pub use sink::{ActionSink, AgentConnection, RealConnection};
