//! Core entity structs for a game session.
//!
//! The canonical [`GameState`] plus the pieces it owns: players, team
//! proposals, missions, the speaking turn, chat, and the final outcome.
//! All of these are plain data; the transition logic lives in
//! `conclave-engine`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    Alignment, DisclosedLabel, GamePhase, MissionAction, MissionOutcome, ProposalResolution, Role,
    SeatPresence, VisibilityReason, Vote,
};
use crate::ids::{Seat, SessionId};

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// One seat at the table.
///
/// Created at session start from the roster. The role is dealt once and never
/// changes; the presence mutates on disconnect/reconnect; the seat itself is
/// never destroyed mid-session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Player {
    /// The stable seat index.
    pub seat: Seat,
    /// Display name shown at the table.
    pub name: String,
    /// The dealt role. `None` only in redacted copies of the state sent to
    /// seats that may not observe this role.
    pub role: Option<Role>,
    /// Who currently drives the seat.
    pub presence: SeatPresence,
}

/// One entry of a role's visibility set: a seat the observer may know about,
/// with the label and reason it is entitled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VisibleSeat {
    /// The observed seat.
    pub seat: Seat,
    /// The disclosed role label (deliberately coarse).
    pub label: DisclosedLabel,
    /// Why the seat is disclosed.
    pub reason: VisibilityReason,
}

// ---------------------------------------------------------------------------
// Proposals and missions
// ---------------------------------------------------------------------------

/// A leader's nomination of seats for the current mission, subject to a vote.
///
/// Superseded by a fresh proposal after a rejection; archived into history
/// once the vote resolves. Archived proposals are immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TeamProposal {
    /// The mission this proposal is for (1-based).
    pub mission_number: u8,
    /// The seat that proposed the team.
    pub leader: Seat,
    /// Nominated member seats, in nomination order.
    pub members: Vec<Seat>,
    /// Votes cast so far; absent seats have not voted.
    pub votes: BTreeMap<Seat, Vote>,
    /// Set exactly once, when the vote resolves.
    pub resolution: Option<ProposalResolution>,
}

impl TeamProposal {
    /// Start an empty proposal for a mission.
    pub const fn new(mission_number: u8, leader: Seat) -> Self {
        Self {
            mission_number,
            leader,
            members: Vec::new(),
            votes: BTreeMap::new(),
            resolution: None,
        }
    }

    /// Number of approve votes cast so far.
    pub fn approvals(&self) -> usize {
        self.votes.values().filter(|v| **v == Vote::Approve).count()
    }
}

/// One round of the core gameplay loop, created from an accepted proposal.
///
/// Resolved when every member has submitted; archived into history and
/// immutable afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Mission {
    /// The mission number (1-based).
    pub mission_number: u8,
    /// Member seats, copied from the accepted team in nomination order.
    pub members: Vec<Seat>,
    /// Actions submitted so far; absent members are still pending.
    ///
    /// Redacted copies of the state clear this map: only the revealed fail
    /// count is public, never who played what.
    pub actions: BTreeMap<Seat, MissionAction>,
    /// Set exactly once, when all members have submitted.
    pub outcome: Option<MissionOutcome>,
    /// The publicly revealed number of fails, set at resolution.
    pub revealed_fails: Option<u8>,
}

impl Mission {
    /// Create a mission from an accepted team.
    pub const fn new(mission_number: u8, members: Vec<Seat>) -> Self {
        Self {
            mission_number,
            members,
            actions: BTreeMap::new(),
            outcome: None,
            revealed_fails: None,
        }
    }

    /// Member seats that have not yet submitted, in nomination order.
    ///
    /// The first entry is the oldest pending member, which is the one a tick
    /// expiry defaults first.
    pub fn pending_members(&self) -> Vec<Seat> {
        self.members
            .iter()
            .copied()
            .filter(|seat| !self.actions.contains_key(seat))
            .collect()
    }

    /// Number of fail actions submitted so far.
    pub fn fails(&self) -> usize {
        self.actions
            .values()
            .filter(|a| **a == MissionAction::Fail)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Speaking turn
// ---------------------------------------------------------------------------

/// The mutually-exclusive chat window granted to one seat at a time.
///
/// Created when a discussion phase is entered; destroyed when it ends.
/// `position` walks `order`; in review phases, walking past the end ends the
/// discussion early, while in team-building the order wraps around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SpeakingTurn {
    /// Deterministic turn order: seat index order starting from the leader,
    /// available seats only.
    pub order: Vec<Seat>,
    /// Current position in `order`.
    pub position: usize,
    /// Ticks left in the current turn. Strictly decreases; never negative.
    pub remaining_ticks: u32,
    /// Unsent text staged by the current speaker, force-submitted on expiry.
    pub draft: Option<String>,
    /// Whether the order wraps around instead of ending the discussion.
    pub wraps: bool,
}

impl SpeakingTurn {
    /// The seat currently allowed to chat, if the rotation has not ended.
    pub fn current_speaker(&self) -> Option<Seat> {
        self.order.get(self.position).copied()
    }
}

/// A chat message attributed to exactly one seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChatMessage {
    /// The speaking seat.
    pub seat: Seat,
    /// Message text.
    pub text: String,
    /// The session tick at which the message was posted.
    pub tick: u64,
    /// Whether the message was force-submitted by a turn expiry.
    pub forced: bool,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// The assassination attempt, when one happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AssassinationRecord {
    /// The assassin's seat.
    pub assassin: Seat,
    /// The chosen target seat.
    pub target: Seat,
    /// Whether the target was the seer (which flips the win to evil).
    pub hit: bool,
}

/// The final result of a session. Set exactly once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionOutcome {
    /// The winning faction.
    pub winner: Alignment,
    /// The assassination attempt, if the game reached that phase.
    pub assassination: Option<AssassinationRecord>,
}

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

/// The canonical session state owned by the session actor.
///
/// Invariants maintained by the transition function:
///
/// - exactly one of `proposal` / `mission` is active at any time, never both;
/// - archived history entries are immutable;
/// - `outcome` is set exactly once, after which `phase` is
///   [`GamePhase::Finished`] and no transition applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GameState {
    /// The session this state belongs to.
    pub session_id: SessionId,
    /// Monotonic tick counter, advanced by clock inputs only.
    pub tick: u64,
    /// All seats, indexed by seat number.
    pub players: Vec<Player>,
    /// The current phase.
    pub phase: GamePhase,
    /// The current mission number (1-based, 1..=5).
    pub mission_number: u8,
    /// The seat currently holding proposal leadership.
    pub leader: Seat,
    /// Consecutive rejections for the current mission.
    pub rejection_count: u8,
    /// The active team proposal, if team-building or voting is underway.
    pub proposal: Option<TeamProposal>,
    /// The active mission, if one is underway.
    pub mission: Option<Mission>,
    /// Resolved proposals, oldest first. Immutable once archived.
    pub proposal_history: Vec<TeamProposal>,
    /// Resolved missions, oldest first. Immutable once archived.
    pub mission_history: Vec<Mission>,
    /// The speaking-turn sub-machine, present only in discussion phases.
    pub speaking: Option<SpeakingTurn>,
    /// Ticks left before the current phase forces a default resolution.
    pub phase_ticks_remaining: u32,
    /// Chat log, oldest first.
    pub chat: Vec<ChatMessage>,
    /// The final outcome, set exactly once at the terminal phase.
    pub outcome: Option<SessionOutcome>,
}

impl GameState {
    /// Look up a player by seat.
    pub fn player(&self, seat: Seat) -> Option<&Player> {
        self.players.get(seat.index())
    }

    /// Look up a player mutably by seat.
    pub fn player_mut(&mut self, seat: Seat) -> Option<&mut Player> {
        self.players.get_mut(seat.index())
    }

    /// The dealt role of a seat, if present in this (possibly redacted) copy.
    pub fn role_of(&self, seat: Seat) -> Option<Role> {
        self.player(seat).and_then(|p| p.role)
    }

    /// Number of seats at the table.
    pub fn seat_count(&self) -> u8 {
        u8::try_from(self.players.len()).unwrap_or(u8::MAX)
    }

    /// Seats that count toward quorum: connected humans and agents, in seat
    /// order.
    pub fn available_seats(&self) -> Vec<Seat> {
        self.players
            .iter()
            .filter(|p| p.presence.is_available())
            .map(|p| p.seat)
            .collect()
    }

    /// Number of missions in history that succeeded.
    pub fn successes(&self) -> usize {
        self.mission_history
            .iter()
            .filter(|m| m.outcome == Some(MissionOutcome::Succeeded))
            .count()
    }

    /// Number of missions in history that failed.
    pub fn failures(&self) -> usize {
        self.mission_history
            .iter()
            .filter(|m| m.outcome == Some(MissionOutcome::Failed))
            .count()
    }

    /// The next available seat after `from`, wrapping around the table.
    ///
    /// Returns `from` itself when no other seat is available.
    pub fn next_available_seat(&self, from: Seat) -> Seat {
        let count = self.seat_count();
        let mut candidate = from.next(count);
        // At most one full lap.
        for _ in 0..count {
            if self
                .player(candidate)
                .is_some_and(|p| p.presence.is_available())
            {
                return candidate;
            }
            candidate = candidate.next(count);
        }
        from
    }

    /// Whether an assassin-capable role is seated (decides whether three good
    /// missions route through the assassination phase).
    pub fn has_assassin(&self) -> bool {
        self.players
            .iter()
            .any(|p| p.role.is_some_and(Role::is_assassin_capable))
    }

    /// The seat holding the assassin-capable role, if any.
    pub fn assassin_seat(&self) -> Option<Seat> {
        self.players
            .iter()
            .find(|p| p.role.is_some_and(Role::is_assassin_capable))
            .map(|p| p.seat)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn player(seat: u8, role: Role, presence: SeatPresence) -> Player {
        Player {
            seat: Seat(seat),
            name: format!("P{seat}"),
            role: Some(role),
            presence,
        }
    }

    fn five_seat_state() -> GameState {
        GameState {
            session_id: SessionId::new(),
            tick: 0,
            players: vec![
                player(0, Role::Merlin, SeatPresence::Human { connected: true }),
                player(1, Role::Percival, SeatPresence::Agent),
                player(2, Role::LoyalServant, SeatPresence::Human { connected: false }),
                player(3, Role::Morgana, SeatPresence::Agent),
                player(4, Role::Assassin, SeatPresence::Agent),
            ],
            phase: GamePhase::TeamBuilding,
            mission_number: 1,
            leader: Seat(0),
            rejection_count: 0,
            proposal: None,
            mission: None,
            proposal_history: Vec::new(),
            mission_history: Vec::new(),
            speaking: None,
            phase_ticks_remaining: 10,
            chat: Vec::new(),
            outcome: None,
        }
    }

    #[test]
    fn available_seats_skip_disconnected_humans() {
        let state = five_seat_state();
        assert_eq!(
            state.available_seats(),
            vec![Seat(0), Seat(1), Seat(3), Seat(4)]
        );
    }

    #[test]
    fn next_available_seat_wraps_and_skips() {
        let state = five_seat_state();
        // Seat 2 is disconnected, so leadership passes from 1 to 3.
        assert_eq!(state.next_available_seat(Seat(1)), Seat(3));
        assert_eq!(state.next_available_seat(Seat(4)), Seat(0));
    }

    #[test]
    fn mission_pending_members_in_nomination_order() {
        let mut mission = Mission::new(1, vec![Seat(2), Seat(0), Seat(4)]);
        mission.actions.insert(Seat(0), MissionAction::Success);
        assert_eq!(mission.pending_members(), vec![Seat(2), Seat(4)]);
    }

    #[test]
    fn mission_counts_fails() {
        let mut mission = Mission::new(1, vec![Seat(0), Seat(1)]);
        mission.actions.insert(Seat(0), MissionAction::Fail);
        mission.actions.insert(Seat(1), MissionAction::Success);
        assert_eq!(mission.fails(), 1);
    }

    #[test]
    fn assassin_detection() {
        let state = five_seat_state();
        assert!(state.has_assassin());
        assert_eq!(state.assassin_seat(), Some(Seat(4)));
    }

    #[test]
    fn proposal_counts_approvals() {
        let mut proposal = TeamProposal::new(1, Seat(0));
        proposal.votes.insert(Seat(0), Vote::Approve);
        proposal.votes.insert(Seat(1), Vote::Reject);
        proposal.votes.insert(Seat(3), Vote::Approve);
        assert_eq!(proposal.approvals(), 2);
    }
}
