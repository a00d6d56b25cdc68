//! Session construction and per-seat redaction.
//!
//! A session is built once from a roster (names, presences) and a dealt role
//! vector; everything afterward flows through the transition function.
//! Redaction produces the copy of the state a given seat is entitled to see:
//! own role only, no foreign mission actions, no foreign drafts, and votes
//! only once the proposal has resolved.

use conclave_types::{
    GamePhase, GameState, Player, Role, Seat, SeatPresence, SessionId,
};
use tracing::info;

use crate::error::EngineError;
use crate::rules;

/// One roster entry handed to [`new_session`].
#[derive(Debug, Clone)]
pub struct SeatSetup {
    /// Display name.
    pub name: String,
    /// Who drives the seat at session start.
    pub presence: SeatPresence,
}

/// Build the initial state for a session.
///
/// `roles` must be a permutation of the canonical roster for the table size
/// (the caller shuffles; the engine stays deterministic). The session starts
/// in [`GamePhase::RoleReveal`] with seat 0 as the first leader.
///
/// # Errors
///
/// Returns [`EngineError`] when the roster size is unsupported or the dealt
/// roles are not a permutation of the canonical roster.
pub fn new_session(
    session_id: SessionId,
    seats: &[SeatSetup],
    roles: &[Role],
) -> Result<GameState, EngineError> {
    let count = seats.len();
    if count < rules::MIN_PLAYERS as usize || count > rules::MAX_PLAYERS as usize {
        return Err(EngineError::UnsupportedPlayerCount { count });
    }
    let player_count = u8::try_from(count).unwrap_or(u8::MAX);

    if !is_roster_permutation(player_count, roles) {
        return Err(EngineError::RosterMismatch {
            player_count,
            dealt: roles.to_vec(),
        });
    }

    let players = seats
        .iter()
        .zip(roles.iter())
        .enumerate()
        .map(|(index, (setup, role))| Player {
            seat: Seat(u8::try_from(index).unwrap_or(u8::MAX)),
            name: setup.name.clone(),
            role: Some(*role),
            presence: setup.presence,
        })
        .collect();

    info!(
        session_id = %session_id,
        player_count,
        "session created, entering role reveal"
    );

    Ok(GameState {
        session_id,
        tick: 0,
        players,
        phase: GamePhase::RoleReveal,
        mission_number: 1,
        leader: Seat(0),
        rejection_count: 0,
        proposal: None,
        mission: None,
        proposal_history: Vec::new(),
        mission_history: Vec::new(),
        speaking: None,
        phase_ticks_remaining: rules::phase_countdown(GamePhase::RoleReveal),
        chat: Vec::new(),
        outcome: None,
    })
}

/// Whether `dealt` is a permutation of the canonical roster for this size.
fn is_roster_permutation(player_count: u8, dealt: &[Role]) -> bool {
    let Some(canonical) = rules::roster(player_count) else {
        return false;
    };
    if canonical.len() != dealt.len() {
        return false;
    }
    let mut expected: Vec<Role> = canonical.to_vec();
    let mut got: Vec<Role> = dealt.to_vec();
    expected.sort_unstable();
    got.sort_unstable();
    expected == got
}

/// Produce the copy of the state `viewer` is entitled to see.
///
/// `None` redacts for a spectator: no roles at all. Hidden information:
///
/// - foreign roles (each seat sees only its own dealt role);
/// - who played what on a mission (active and archived) -- only the revealed
///   fail count is public;
/// - foreign votes on the active proposal until it resolves;
/// - the speaking draft of anyone but the viewer.
///
/// Archived proposals have resolved, so their votes stay public.
pub fn redacted_for(state: &GameState, viewer: Option<Seat>) -> GameState {
    let mut copy = state.clone();

    for player in &mut copy.players {
        if Some(player.seat) != viewer {
            player.role = None;
        }
    }

    if let Some(mission) = &mut copy.mission {
        mission
            .actions
            .retain(|seat, _| Some(*seat) == viewer);
    }
    for mission in &mut copy.mission_history {
        mission.actions.retain(|seat, _| Some(*seat) == viewer);
    }

    if let Some(proposal) = &mut copy.proposal
        && proposal.resolution.is_none()
    {
        proposal.votes.retain(|seat, _| Some(*seat) == viewer);
    }

    if let Some(speaking) = &mut copy.speaking
        && speaking.current_speaker() != viewer
    {
        speaking.draft = None;
    }

    copy
}
