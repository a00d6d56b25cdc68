//! The role visibility model.
//!
//! A pure mapping from a seat's role to the set of other seats it may observe
//! at session start, with the disclosed label and the reason. Called once per
//! session per seat at role-assignment time; safe to call repeatedly.
//!
//! The asymmetric cases:
//!
//! - Merlin sees every evil seat except Mordred (the hidden evil).
//! - Percival sees Merlin's seat and Morgana's seat, both tagged with the
//!   same ambiguous label so callers cannot leak which is which.
//! - Evil seats see each other, except Oberon: he sees no teammate and no
//!   teammate sees him. Merlin still sees Oberon.
//! - Plain roles (Loyal Servant) observe nothing.

use conclave_types::{Alignment, DisclosedLabel, Role, Seat, VisibilityReason, VisibleSeat};

/// Compute the seats `observer` may know about, given the dealt roles in
/// seat order.
///
/// Pure and idempotent: no side effects, and the same inputs always yield
/// the same output (sorted by seat). Returns the empty set when the observer
/// seat is out of bounds or its role grants no sight.
pub fn visible_seats_for(observer: Seat, roles: &[Role]) -> Vec<VisibleSeat> {
    let Some(&observer_role) = roles.get(observer.index()) else {
        return Vec::new();
    };

    let others = roles
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != observer.index());

    match observer_role {
        Role::Merlin => others
            .filter(|(_, role)| role.alignment() == Alignment::Evil && **role != Role::Mordred)
            .map(|(index, _)| disclosed(index, DisclosedLabel::Evil, VisibilityReason::SeerSight))
            .collect(),

        Role::Percival => others
            .filter(|(_, role)| matches!(role, Role::Merlin | Role::Morgana))
            .map(|(index, _)| {
                disclosed(
                    index,
                    DisclosedLabel::MerlinOrMorgana,
                    VisibilityReason::AmbiguousSeer,
                )
            })
            .collect(),

        Role::Morgana | Role::Assassin | Role::Mordred | Role::Minion => others
            .filter(|(_, role)| role.alignment() == Alignment::Evil && **role != Role::Oberon)
            .map(|(index, _)| {
                disclosed(
                    index,
                    DisclosedLabel::FellowEvil,
                    VisibilityReason::EvilReveal,
                )
            })
            .collect(),

        // Oberon is isolated; servants have no sight.
        Role::Oberon | Role::LoyalServant => Vec::new(),
    }
}

/// Build one visibility entry for a seat index.
fn disclosed(index: usize, label: DisclosedLabel, reason: VisibilityReason) -> VisibleSeat {
    VisibleSeat {
        seat: Seat(u8::try_from(index).unwrap_or(u8::MAX)),
        label,
        reason,
    }
}
