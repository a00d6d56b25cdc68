//! Session host error types.

use conclave_agents::AgentError;
use conclave_engine::EngineError;

/// Errors that can occur while setting up or running a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The game engine rejected the session setup.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// The agent layer failed to initialize.
    #[error("agent error: {0}")]
    Agents(#[from] AgentError),

    /// A configuration value is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),
}
