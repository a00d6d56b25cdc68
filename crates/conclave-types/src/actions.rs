//! The typed action vocabulary dispatched over the per-session channel.
//!
//! Every client-visible input is a [`GameAction`] with a `type` discriminator
//! (serde's adjacently tagged representation) and a payload; the transition
//! function consumes a [`GameInput`], which is either a clock tick or one
//! action. Agent-produced actions re-enter the exact same path as
//! human-submitted ones.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    ActionCategory, Alignment, GamePhase, MissionAction, MissionOutcome, ProposalResolution,
    RejectReason, Vote,
};
use crate::ids::Seat;
use crate::structs::GameState;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// A typed, versioned action record submitted by a seat (human or agent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum GameAction {
    /// The leader nominates (or re-nominates) the team for this mission.
    ProposeTeam {
        /// The acting seat; must be the current leader.
        seat: Seat,
        /// Nominated member seats.
        members: Vec<Seat>,
    },
    /// The leader locks the proposal and opens the review discussion.
    FinishTeamBuilding {
        /// The acting seat; must be the current leader.
        seat: Seat,
    },
    /// An available seat votes on the locked proposal.
    CastProposalVote {
        /// The voting seat.
        seat: Seat,
        /// Approve or reject.
        vote: Vote,
    },
    /// A mission member secretly submits a success or fail.
    CastMissionAction {
        /// The acting seat; must be a pending mission member.
        seat: Seat,
        /// The submitted action.
        action: MissionAction,
    },
    /// The current speaker posts a chat message and yields the turn.
    SendChat {
        /// The speaking seat.
        seat: Seat,
        /// Message text.
        text: String,
    },
    /// The current speaker stages unsent text, force-submitted on expiry.
    UpdateChatDraft {
        /// The speaking seat.
        seat: Seat,
        /// Draft text (empty clears the draft).
        text: String,
    },
    /// The current speaker yields the turn without a message.
    PassSpeakingTurn {
        /// The speaking seat.
        seat: Seat,
    },
    /// The assassin-capable seat names its target.
    ChooseAssassinationTarget {
        /// The acting seat; must hold the assassin-capable role.
        seat: Seat,
        /// The targeted seat.
        target: Seat,
    },
    /// A human seat's connection dropped. The seat persists.
    PlayerDisconnect {
        /// The affected seat.
        seat: Seat,
    },
    /// A human seat reconnected, possibly under a new display name.
    PlayerReconnect {
        /// The affected seat.
        seat: Seat,
        /// The (possibly updated) display name.
        name: String,
    },
}

impl GameAction {
    /// The seat this action claims to act for.
    pub const fn acting_seat(&self) -> Seat {
        match self {
            Self::ProposeTeam { seat, .. }
            | Self::FinishTeamBuilding { seat }
            | Self::CastProposalVote { seat, .. }
            | Self::CastMissionAction { seat, .. }
            | Self::SendChat { seat, .. }
            | Self::UpdateChatDraft { seat, .. }
            | Self::PassSpeakingTurn { seat }
            | Self::ChooseAssassinationTarget { seat, .. }
            | Self::PlayerDisconnect { seat }
            | Self::PlayerReconnect { seat, .. } => *seat,
        }
    }

    /// The usage-accounting category of this action, where one applies.
    pub const fn category(&self) -> Option<ActionCategory> {
        match self {
            Self::ProposeTeam { .. } | Self::FinishTeamBuilding { .. } => {
                Some(ActionCategory::TeamProposal)
            }
            Self::CastProposalVote { .. } => Some(ActionCategory::TeamVote),
            Self::CastMissionAction { .. } => Some(ActionCategory::MissionPlay),
            Self::SendChat { .. } | Self::UpdateChatDraft { .. } | Self::PassSpeakingTurn { .. } => {
                Some(ActionCategory::Chat)
            }
            Self::ChooseAssassinationTarget { .. } => Some(ActionCategory::Assassination),
            Self::PlayerDisconnect { .. } | Self::PlayerReconnect { .. } => None,
        }
    }
}

/// One input to the transition function: a periodic clock tick or a typed
/// action. Inputs apply strictly in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum GameInput {
    /// One unit of game time.
    Tick,
    /// A seat-submitted action.
    Action(GameAction),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What a tick expiry forced on behalf of a stalled seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ForcedDefault {
    /// The stalled leader's proposal was auto-completed.
    Proposal,
    /// A missing vote was defaulted to approve.
    Vote,
    /// A pending mission action was defaulted to success.
    MissionPlay,
    /// The speaking turn was passed (or a draft force-submitted).
    SpeakingTurn,
    /// The assassination target was defaulted.
    AssassinationTarget,
}

/// Something observable that happened during one transition.
///
/// Events are broadcast alongside the hydrated state so clients and the
/// agent pool can react without diffing snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum GameEvent {
    /// The outer machine moved to a new phase.
    PhaseChanged {
        /// Phase before the transition.
        from: GamePhase,
        /// Phase after the transition.
        to: GamePhase,
    },
    /// A chat message was posted.
    ChatPosted {
        /// The speaking seat.
        seat: Seat,
        /// Whether a turn expiry force-submitted it.
        forced: bool,
    },
    /// The speaking turn advanced.
    SpeakerAdvanced {
        /// The new speaker, or `None` when the rotation ended.
        speaker: Option<Seat>,
    },
    /// The proposal vote resolved.
    ProposalResolved {
        /// Approved or rejected.
        resolution: ProposalResolution,
        /// Approve votes counted.
        approvals: u8,
        /// Seats eligible to vote.
        eligible: u8,
    },
    /// Leadership rotated after a rejection or a finished mission.
    LeaderRotated {
        /// The new leader.
        leader: Seat,
    },
    /// A mission resolved.
    MissionResolved {
        /// The mission number.
        mission_number: u8,
        /// Succeeded or failed.
        outcome: MissionOutcome,
        /// Fail actions counted.
        fails: u8,
    },
    /// A tick expiry forced a default resolution for a stalled seat.
    DefaultForced {
        /// The seat acted for.
        seat: Seat,
        /// What was forced.
        what: ForcedDefault,
    },
    /// A seat's connection state changed.
    PresenceChanged {
        /// The affected seat.
        seat: Seat,
        /// Whether the seat is now connected.
        connected: bool,
    },
    /// The session ended.
    GameEnded {
        /// The winning faction.
        winner: Alignment,
    },
}

// ---------------------------------------------------------------------------
// Transition report
// ---------------------------------------------------------------------------

/// Whether an input changed the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Disposition {
    /// The input was valid for the current phase and was applied.
    Applied,
    /// The input was a protocol violation and left the state untouched.
    Ignored(RejectReason),
}

/// The result of applying one input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StepReport {
    /// Applied or silently ignored.
    pub disposition: Disposition,
    /// Observable consequences, in occurrence order.
    pub events: Vec<GameEvent>,
}

impl StepReport {
    /// A report for a silently rejected input.
    pub const fn ignored(reason: RejectReason) -> Self {
        Self {
            disposition: Disposition::Ignored(reason),
            events: Vec::new(),
        }
    }

    /// A report for an applied input with its events.
    pub const fn applied(events: Vec<GameEvent>) -> Self {
        Self {
            disposition: Disposition::Applied,
            events,
        }
    }

    /// Whether the input was applied.
    pub const fn is_applied(&self) -> bool {
        matches!(self.disposition, Disposition::Applied)
    }
}

// ---------------------------------------------------------------------------
// Server messages
// ---------------------------------------------------------------------------

/// A message pushed to a connected client over its action sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum ServerMessage {
    /// Full state replacement (sent after every applied transition and on
    /// reconnect). Redacted per recipient seat.
    Hydrate(Box<GameState>),
    /// One observable event from the last transition.
    Event(GameEvent),
}
