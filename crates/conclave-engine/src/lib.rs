//! Pure game logic for hidden-role sessions.
//!
//! No I/O, no clocks, no randomness: the session host owns the canonical
//! [`conclave_types::GameState`] and feeds inputs through [`transition::apply`]
//! one at a time. Everything in here is deterministic, which is what makes
//! the self-play tests possible.

pub mod error;
pub mod rules;
pub mod speaking;
pub mod state;
pub mod transition;
pub mod visibility;

pub use error::EngineError;
pub use speaking::AdvanceOutcome;
pub use state::{new_session, redacted_for, SeatSetup};
pub use transition::{apply, transition};
pub use visibility::visible_seats_for;
