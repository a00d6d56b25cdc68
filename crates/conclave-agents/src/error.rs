//! Error types for the agent stack.

/// Errors raised by configuration, prompting, inference, and parsing.
///
/// A failed decision never propagates out of the pool: the decision engine
/// absorbs the error, counts it, and falls back to a heuristic. These types
/// exist so the failure reason reaches the logs intact.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Prompt template loading or rendering failed.
    #[error("template error: {0}")]
    Template(String),

    /// The provider refused the request in a way a retry cannot fix
    /// (bad credentials, unknown deployment, malformed request).
    #[error("inference rejected permanently: {0}")]
    Unrecoverable(String),

    /// The request failed after exhausting the retry budget.
    #[error("inference failed: {0}")]
    Inference(String),

    /// The local rate limiter refused to submit within the wait budget.
    #[error("rate limit saturated: {0}")]
    RateLimited(String),

    /// The model's response could not be parsed into a decision.
    #[error("response parse failed: {0}")]
    Parse(String),
}
