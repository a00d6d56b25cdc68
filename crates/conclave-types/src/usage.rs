//! Usage accounting records for inference calls.
//!
//! One [`UsageRecord`] is appended per completed inference call. The log
//! itself (a bounded ring with aggregation) lives in `conclave-agents`; the
//! record shape is shared here so the statistics surface can consume it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ActionCategory, Role};
use crate::ids::Seat;

/// One completed inference call, append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UsageRecord {
    /// When the call completed.
    pub timestamp: DateTime<Utc>,
    /// The seat the decision was made for.
    pub seat: Seat,
    /// The acting seat's role.
    pub role: Role,
    /// The kind of decision requested.
    pub category: ActionCategory,
    /// The deployment/model identifier that answered.
    pub model: String,
    /// Prompt tokens reported by the API.
    pub prompt_tokens: u32,
    /// Completion tokens reported by the API.
    pub completion_tokens: u32,
    /// Estimated cost in dollars, from the static per-model price table.
    /// Serialized as a string on the wire, like every `Decimal`.
    #[ts(type = "string")]
    pub cost: Decimal,
    /// Wall-clock latency of the call in milliseconds.
    pub latency_ms: u64,
}

impl UsageRecord {
    /// Total tokens (prompt + completion), saturating.
    pub const fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}
