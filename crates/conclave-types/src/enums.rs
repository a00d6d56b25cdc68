//! Enumeration types for the Conclave game session.
//!
//! Covers the closed role set and its alignment split, the game phase wheel,
//! vote and mission tokens, seat presence, visibility disclosure tags, and
//! the silent rejection reasons used for protocol violations.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Roles and alignment
// ---------------------------------------------------------------------------

/// The two-faction grouping every role belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Alignment {
    /// The loyal faction; wins by succeeding three missions.
    Good,
    /// The conspirator faction; wins by failing three missions, stalling
    /// team-building, or assassinating the seer.
    Evil,
}

impl core::fmt::Display for Alignment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Good => write!(f, "good"),
            Self::Evil => write!(f, "evil"),
        }
    }
}

/// A hidden role dealt to one seat at session start.
///
/// Role assignment is immutable for the session. Each role carries a static
/// visibility rule evaluated once at role-assignment time (see
/// `conclave-engine`'s visibility module):
///
/// - [`Role::Merlin`] sees every evil seat except [`Role::Mordred`].
/// - [`Role::Percival`] sees Merlin and [`Role::Morgana`] but cannot tell
///   which is which.
/// - Evil seats see each other, except [`Role::Oberon`] who sees no one and
///   is seen by no teammate.
/// - [`Role::LoyalServant`] and the generic [`Role::Minion`] observe nothing
///   beyond the evil mutual reveal (servants observe nothing at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Role {
    /// Good seer: knows the evil seats (except Mordred).
    Merlin,
    /// Good secondary seer: sees Merlin and Morgana, ambiguously.
    Percival,
    /// Plain good seat with no special knowledge.
    LoyalServant,
    /// Evil decoy: appears as a possible Merlin to Percival.
    Morgana,
    /// Evil finisher: may assassinate Merlin after three good missions.
    Assassin,
    /// Evil seat hidden from Merlin.
    Mordred,
    /// Isolated evil seat: unknown to teammates and knowing none of them.
    Oberon,
    /// Plain evil seat with no extra ability.
    Minion,
}

impl Role {
    /// The faction this role belongs to. Fixed for the session.
    pub const fn alignment(self) -> Alignment {
        match self {
            Self::Merlin | Self::Percival | Self::LoyalServant => Alignment::Good,
            Self::Morgana | Self::Assassin | Self::Mordred | Self::Oberon | Self::Minion => {
                Alignment::Evil
            }
        }
    }

    /// Whether this role may choose the assassination target.
    pub const fn is_assassin_capable(self) -> bool {
        matches!(self, Self::Assassin)
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// The outer state machine's phase wheel.
///
/// `RoleReveal -> TeamBuilding -> TeamBuildingReview -> Voting ->
/// VotingReview -> Mission -> MissionReview -> (loop | Assassination) ->
/// Finished`. A rejected proposal returns from `VotingReview` to
/// `TeamBuilding` with leadership rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum GamePhase {
    /// Players privately learn their role and visible seats.
    RoleReveal,
    /// The leader nominates a team for the current mission.
    TeamBuilding,
    /// Open discussion of the locked proposal before the vote.
    TeamBuildingReview,
    /// Every available seat votes to approve or reject the proposal.
    Voting,
    /// Votes are revealed and discussed.
    VotingReview,
    /// The accepted team secretly submits mission actions.
    Mission,
    /// The mission outcome is revealed and discussed.
    MissionReview,
    /// Good reached three successes; the assassin picks a target.
    Assassination,
    /// Terminal phase: the winner is set and no transition applies.
    Finished,
}

impl GamePhase {
    /// Whether this phase solicits open discussion (and therefore runs the
    /// speaking-turn sub-machine).
    pub const fn is_discussion(self) -> bool {
        matches!(
            self,
            Self::TeamBuilding | Self::TeamBuildingReview | Self::VotingReview | Self::MissionReview
        )
    }

    /// Whether the session has ended.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished)
    }
}

// ---------------------------------------------------------------------------
// Votes and mission tokens
// ---------------------------------------------------------------------------

/// A seat's vote on a team proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Vote {
    /// Accept the proposed team.
    Approve,
    /// Reject the proposed team.
    Reject,
}

/// A mission member's secret action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum MissionAction {
    /// Contribute to mission success. The only action good seats may play.
    Success,
    /// Sabotage the mission. Only evil seats may play this.
    Fail,
}

/// How a resolved team proposal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ProposalResolution {
    /// Strict majority of available seats approved.
    Approved,
    /// Majority rejected or the vote tied.
    Rejected,
}

/// How a resolved mission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum MissionOutcome {
    /// Fewer fails than the mission's fail threshold.
    Succeeded,
    /// Fails met or exceeded the threshold.
    Failed,
}

// ---------------------------------------------------------------------------
// Seat presence
// ---------------------------------------------------------------------------

/// Who (or what) currently drives a seat.
///
/// Seats are never destroyed mid-session; a disconnected human keeps the
/// seat and may reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum SeatPresence {
    /// A human client holds this seat.
    Human {
        /// Whether the client's connection is currently live.
        connected: bool,
    },
    /// An autonomous decision engine holds this seat.
    Agent,
}

impl SeatPresence {
    /// Whether the seat counts toward quorum: a connected human or an agent.
    pub const fn is_available(self) -> bool {
        match self {
            Self::Human { connected } => connected,
            Self::Agent => true,
        }
    }

    /// Whether the seat is driven by a decision engine.
    pub const fn is_agent(self) -> bool {
        matches!(self, Self::Agent)
    }
}

// ---------------------------------------------------------------------------
// Visibility disclosure
// ---------------------------------------------------------------------------

/// The role label disclosed to an observing seat.
///
/// Deliberately coarser than [`Role`]: callers receive only what the
/// observing role is entitled to know, so the ambiguous cases cannot leak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum DisclosedLabel {
    /// "This seat is evil" (Merlin's view).
    Evil,
    /// "This seat is Merlin or Morgana" (Percival's view; both targets carry
    /// the same label).
    MerlinOrMorgana,
    /// "This seat is a fellow conspirator" (the evil mutual reveal).
    FellowEvil,
}

/// Why a seat is disclosed to an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum VisibilityReason {
    /// The observer is a seer and the seat radiates evil.
    SeerSight,
    /// The observer is the secondary seer; the seat is one of the two
    /// mutually confusable targets.
    AmbiguousSeer,
    /// The observer is evil and the seat is a known teammate.
    EvilReveal,
}

// ---------------------------------------------------------------------------
// Usage accounting
// ---------------------------------------------------------------------------

/// The category of decision an inference call was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ActionCategory {
    /// A speaking-turn chat message.
    Chat,
    /// A team nomination.
    TeamProposal,
    /// A proposal approve/reject vote.
    TeamVote,
    /// A mission success/fail action.
    MissionPlay,
    /// An assassination target choice.
    Assassination,
}

// ---------------------------------------------------------------------------
// Protocol violations
// ---------------------------------------------------------------------------

/// Why an action was silently ignored by the state machine.
///
/// These are not errors: lagging or duplicate client messages routinely
/// arrive for the wrong phase and must be tolerated without surfacing
/// anything to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum RejectReason {
    /// The session is finished; no input applies.
    SessionFinished,
    /// The action does not belong to the current phase.
    WrongPhase,
    /// The acting seat does not exist in this session.
    UnknownSeat,
    /// Only the current leader may shape the proposal.
    NotLeader,
    /// Only the current speaker may chat or pass.
    NotCurrentSpeaker,
    /// Only members of the active mission may act on it.
    NotMissionMember,
    /// Only the assassin-capable seat may choose a target.
    NotAssassin,
    /// The seat is not eligible to vote (disconnected human).
    NotEligibleVoter,
    /// The seat already submitted for this phase instance.
    AlreadyActed,
    /// Proposed team size does not match the mission requirement.
    InvalidTeamSize,
    /// A referenced seat index is out of bounds or duplicated.
    InvalidSeatReference,
    /// A good-aligned mission member attempted to play a fail.
    GoodCannotFail,
    /// The connection-state change does not apply (e.g. reconnecting a
    /// connected seat, or touching an agent seat).
    PresenceUnchanged,
}
