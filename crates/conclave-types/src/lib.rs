//! Shared type definitions for the Conclave game session.
//!
//! This crate is the single source of truth for all types used across the
//! Conclave workspace. Types defined here flow downstream to `TypeScript`
//! via `ts-rs` for the table client.
//!
//! # Modules
//!
//! - [`ids`] -- The session UUID newtype and the stable [`Seat`] index
//! - [`enums`] -- Roles, alignment, phases, votes, presence, rejection reasons
//! - [`structs`] -- The canonical game state and the entities it owns
//! - [`actions`] -- The typed action vocabulary, events, and step reports
//! - [`usage`] -- Inference usage records

pub mod actions;
pub mod enums;
pub mod ids;
pub mod structs;
pub mod usage;

// Re-export all public types at crate root for convenience.
pub use actions::{
    Disposition, ForcedDefault, GameAction, GameEvent, GameInput, ServerMessage, StepReport,
};
pub use enums::{
    ActionCategory, Alignment, DisclosedLabel, GamePhase, MissionAction, MissionOutcome,
    ProposalResolution, RejectReason, Role, SeatPresence, VisibilityReason, Vote,
};
pub use ids::{Seat, SessionId};
pub use structs::{
    AssassinationRecord, ChatMessage, GameState, Mission, Player, SessionOutcome, SpeakingTurn,
    TeamProposal, VisibleSeat,
};
pub use usage::UsageRecord;
