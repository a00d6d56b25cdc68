//! LLM-driven seat agents.
//!
//! This crate turns table seats into autonomous players. A [`DecisionEngine`]
//! watches one seat's redacted view of the game, detects when that seat owes
//! the table an action, asks a language model for the decision, and falls
//! back to seeded heuristics when the model is unavailable or unusable. The
//! [`AgentPool`] coordinates the engines of every agent-driven seat at a
//! table and shares rate-limited [`InferenceClient`]s between them.
//!
//! Nothing in this crate mutates game state. Engines emit
//! [`conclave_types::GameAction`] values; the session layer feeds them back
//! through the engine like any other player input.

pub mod client;
pub mod config;
pub mod decision;
pub mod error;
pub mod heuristics;
pub mod limiter;
pub mod parse;
pub mod pool;
pub mod prompt;
pub mod usage;

pub use client::{CallContext, Completion, InferenceClient};
pub use config::{AgentsConfig, BackendType, ModelConfig, ModelDistribution};
pub use decision::DecisionEngine;
pub use error::AgentError;
pub use heuristics::Heuristics;
pub use limiter::{RateLimiter, RateLimits};
pub use parse::{parse_reply, ParsedReply};
pub use pool::AgentPool;
pub use prompt::{PromptEngine, RenderedPrompt};
pub use usage::{cost_of, UsageLog, UsageTotals};
