//! Type-safe identifier wrappers.
//!
//! Sessions are identified by a UUID v7 (time-ordered) newtype; seats are a
//! dense per-session index that survives disconnects. Strong typing prevents
//! accidental mixing of identifiers at compile time.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a game session (one table, one game).
    SessionId
}

/// A stable per-session player slot.
///
/// Seats are assigned at session start from the roster order and never change
/// for the lifetime of the session, even when the underlying connection drops.
/// All game data refers to players by seat, never by connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct Seat(pub u8);

impl Seat {
    /// Return the seat as a `Vec` index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// The seat that follows this one at a table of `seat_count` seats,
    /// wrapping around to seat 0.
    ///
    /// Returns seat 0 for an empty table rather than dividing by zero.
    pub const fn next(self, seat_count: u8) -> Self {
        if seat_count == 0 {
            return Self(0);
        }
        match self.0.checked_add(1) {
            Some(n) => Self(n % seat_count),
            None => Self(0),
        }
    }
}

impl core::fmt::Display for Seat {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "seat {}", self.0)
    }
}

impl From<u8> for Seat {
    fn from(index: u8) -> Self {
        Self(index)
    }
}
