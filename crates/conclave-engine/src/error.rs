//! Error types for session construction.
//!
//! Running sessions never error: protocol violations are silent rejections
//! carried in the step report, and stalled input is resolved by forced
//! defaults. Only building a session from a roster can fail.

use conclave_types::Role;

/// Errors raised while constructing a session.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The roster size is outside the supported 5-10 range.
    #[error("unsupported player count: {count} (supported: 5-10)")]
    UnsupportedPlayerCount {
        /// The offending roster size.
        count: usize,
    },

    /// The dealt roles do not match the canonical roster for this table size.
    #[error("dealt roles do not match the roster for {player_count} players")]
    RosterMismatch {
        /// The table size.
        player_count: u8,
        /// The roles that were supplied.
        dealt: Vec<Role>,
    },
}
