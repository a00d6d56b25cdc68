//! The speaking-turn rotation used by discussion phases.
//!
//! Exactly one seat may chat at any moment. The rotation walks the available
//! seats in seat order starting from the leader; review phases end the
//! discussion once everyone has spoken, while team-building wraps around
//! until the phase itself ends.

use conclave_types::{Seat, SpeakingTurn};

use crate::rules;

/// What advancing the rotation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The turn passed to this seat with a fresh tick budget.
    Next(Seat),
    /// The rotation is exhausted; the discussion is over.
    Ended,
}

/// Start a rotation over `available` seats, beginning at the leader.
///
/// Seats are rotated so the leader (or, if absent, the first available seat
/// after it in seat order) speaks first. Returns `None` when no seat is
/// available to speak.
pub fn begin(available: &[Seat], leader: Seat, wraps: bool) -> Option<SpeakingTurn> {
    if available.is_empty() {
        return None;
    }
    // Index of the leader, or of the first available seat ranked after it.
    let start = available
        .iter()
        .position(|seat| *seat >= leader)
        .unwrap_or(0);
    let mut order = Vec::with_capacity(available.len());
    order.extend_from_slice(available.get(start..).unwrap_or_default());
    order.extend_from_slice(available.get(..start).unwrap_or_default());

    Some(SpeakingTurn {
        order,
        position: 0,
        remaining_ticks: rules::SPEAKING_TURN_TICKS,
        draft: None,
        wraps,
    })
}

/// Pass the turn to the next seat in the rotation.
///
/// Resets the tick budget and clears the draft. Wrapping rotations never end;
/// linear rotations end once the last seat yields.
pub fn advance(turn: &mut SpeakingTurn) -> AdvanceOutcome {
    turn.draft = None;
    turn.position = turn.position.saturating_add(1);

    if turn.position >= turn.order.len() {
        if !turn.wraps {
            return AdvanceOutcome::Ended;
        }
        turn.position = 0;
    }

    turn.remaining_ticks = rules::SPEAKING_TURN_TICKS;
    turn.current_speaker()
        .map_or(AdvanceOutcome::Ended, AdvanceOutcome::Next)
}
