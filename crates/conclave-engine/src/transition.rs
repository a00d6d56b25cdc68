//! The pure transition function for one session.
//!
//! Exactly one input applies at a time, in arrival order. Protocol
//! violations never error and never mutate: they come back as a silent
//! rejection in the step report. Stalled seats never block the game; every
//! phase carries a tick countdown that forces a default resolution, and the
//! speaking turn carries its own budget. Disconnects only flip presence; the
//! countdowns absorb whatever the absent seat was supposed to do.

use conclave_types::{
    Alignment, AssassinationRecord, ChatMessage, ForcedDefault, GameAction, GameEvent, GameInput,
    GamePhase, GameState, Mission, MissionAction, MissionOutcome, ProposalResolution,
    RejectReason, Role, Seat, SeatPresence, SessionOutcome, StepReport, TeamProposal, Vote,
};
use tracing::{debug, info};

use crate::rules;
use crate::speaking::{self, AdvanceOutcome};
use crate::visibility;

/// Apply one input to the state in place.
pub fn apply(state: &mut GameState, input: &GameInput) -> StepReport {
    match input {
        GameInput::Tick => handle_tick(state),
        GameInput::Action(action) => handle_action(state, action),
    }
}

/// Apply one input to a copy of the state, leaving the original untouched.
pub fn transition(state: &GameState, input: &GameInput) -> (GameState, StepReport) {
    let mut next = state.clone();
    let report = apply(&mut next, input);
    (next, report)
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

fn handle_action(state: &mut GameState, action: &GameAction) -> StepReport {
    if state.phase.is_terminal() {
        return StepReport::ignored(RejectReason::SessionFinished);
    }
    if state.player(action.acting_seat()).is_none() {
        return StepReport::ignored(RejectReason::UnknownSeat);
    }

    match action {
        GameAction::ProposeTeam { seat, members } => propose_team(state, *seat, members),
        GameAction::FinishTeamBuilding { seat } => finish_team_building(state, *seat),
        GameAction::CastProposalVote { seat, vote } => cast_proposal_vote(state, *seat, *vote),
        GameAction::CastMissionAction { seat, action } => {
            cast_mission_action(state, *seat, *action)
        }
        GameAction::SendChat { seat, text } => send_chat(state, *seat, text),
        GameAction::UpdateChatDraft { seat, text } => update_chat_draft(state, *seat, text),
        GameAction::PassSpeakingTurn { seat } => pass_speaking_turn(state, *seat),
        GameAction::ChooseAssassinationTarget { seat, target } => {
            choose_assassination_target(state, *seat, *target)
        }
        GameAction::PlayerDisconnect { seat } => player_disconnect(state, *seat),
        GameAction::PlayerReconnect { seat, name } => player_reconnect(state, *seat, name),
    }
}

fn propose_team(state: &mut GameState, seat: Seat, members: &[Seat]) -> StepReport {
    if state.phase != GamePhase::TeamBuilding {
        return StepReport::ignored(RejectReason::WrongPhase);
    }
    if seat != state.leader {
        return StepReport::ignored(RejectReason::NotLeader);
    }
    let Some(size) = rules::team_size(state.seat_count(), state.mission_number) else {
        return StepReport::ignored(RejectReason::InvalidTeamSize);
    };
    if members.len() != usize::from(size) {
        return StepReport::ignored(RejectReason::InvalidTeamSize);
    }
    let mut unique: Vec<Seat> = members.to_vec();
    unique.sort_unstable();
    unique.dedup();
    if unique.len() != members.len() || members.iter().any(|m| state.player(*m).is_none()) {
        return StepReport::ignored(RejectReason::InvalidSeatReference);
    }

    let mut proposal = TeamProposal::new(state.mission_number, seat);
    proposal.members = members.to_vec();
    state.proposal = Some(proposal);
    debug!(leader = %seat, ?members, "team proposed");
    StepReport::applied(Vec::new())
}

fn finish_team_building(state: &mut GameState, seat: Seat) -> StepReport {
    if state.phase != GamePhase::TeamBuilding {
        return StepReport::ignored(RejectReason::WrongPhase);
    }
    if seat != state.leader {
        return StepReport::ignored(RejectReason::NotLeader);
    }
    if state.proposal.is_none() {
        return StepReport::ignored(RejectReason::InvalidTeamSize);
    }
    let mut events = Vec::new();
    enter_phase(state, GamePhase::TeamBuildingReview, &mut events);
    StepReport::applied(events)
}

fn cast_proposal_vote(state: &mut GameState, seat: Seat, vote: Vote) -> StepReport {
    if state.phase != GamePhase::Voting {
        return StepReport::ignored(RejectReason::WrongPhase);
    }
    let eligible = state.available_seats();
    if !eligible.contains(&seat) {
        return StepReport::ignored(RejectReason::NotEligibleVoter);
    }
    let Some(proposal) = state.proposal.as_mut() else {
        return StepReport::ignored(RejectReason::WrongPhase);
    };
    if proposal.votes.contains_key(&seat) {
        return StepReport::ignored(RejectReason::AlreadyActed);
    }
    proposal.votes.insert(seat, vote);
    let all_voted = eligible.iter().all(|s| proposal.votes.contains_key(s));

    let mut events = Vec::new();
    if all_voted {
        resolve_vote(state, &mut events);
    }
    StepReport::applied(events)
}

fn cast_mission_action(state: &mut GameState, seat: Seat, action: MissionAction) -> StepReport {
    if state.phase != GamePhase::Mission {
        return StepReport::ignored(RejectReason::WrongPhase);
    }
    let Some(mission) = state.mission.as_ref() else {
        return StepReport::ignored(RejectReason::WrongPhase);
    };
    if !mission.members.contains(&seat) {
        return StepReport::ignored(RejectReason::NotMissionMember);
    }
    if mission.actions.contains_key(&seat) {
        return StepReport::ignored(RejectReason::AlreadyActed);
    }
    // Good seats may only play success; the submission is silently dropped
    // so the table never learns the seat tried.
    if action == MissionAction::Fail
        && state
            .role_of(seat)
            .is_some_and(|role| role.alignment() == Alignment::Good)
    {
        return StepReport::ignored(RejectReason::GoodCannotFail);
    }

    let Some(mission) = state.mission.as_mut() else {
        return StepReport::ignored(RejectReason::WrongPhase);
    };
    mission.actions.insert(seat, action);
    let complete = mission.pending_members().is_empty();

    let mut events = Vec::new();
    if complete {
        resolve_mission(state, &mut events);
    }
    StepReport::applied(events)
}

fn send_chat(state: &mut GameState, seat: Seat, text: &str) -> StepReport {
    if let Some(report) = check_speaker(state, seat) {
        return report;
    }
    let tick = state.tick;
    state.chat.push(ChatMessage {
        seat,
        text: text.to_owned(),
        tick,
        forced: false,
    });
    let mut events = vec![GameEvent::ChatPosted { seat, forced: false }];
    advance_speaker(state, &mut events);
    StepReport::applied(events)
}

fn update_chat_draft(state: &mut GameState, seat: Seat, text: &str) -> StepReport {
    if let Some(report) = check_speaker(state, seat) {
        return report;
    }
    if let Some(turn) = state.speaking.as_mut() {
        turn.draft = if text.is_empty() {
            None
        } else {
            Some(text.to_owned())
        };
    }
    StepReport::applied(Vec::new())
}

fn pass_speaking_turn(state: &mut GameState, seat: Seat) -> StepReport {
    if let Some(report) = check_speaker(state, seat) {
        return report;
    }
    let mut events = Vec::new();
    advance_speaker(state, &mut events);
    StepReport::applied(events)
}

/// Shared guard for the three chat actions: discussion phase, and the acting
/// seat must hold the speaking turn.
fn check_speaker(state: &GameState, seat: Seat) -> Option<StepReport> {
    if !state.phase.is_discussion() {
        return Some(StepReport::ignored(RejectReason::WrongPhase));
    }
    let speaker = state
        .speaking
        .as_ref()
        .and_then(conclave_types::SpeakingTurn::current_speaker);
    if speaker != Some(seat) {
        return Some(StepReport::ignored(RejectReason::NotCurrentSpeaker));
    }
    None
}

fn choose_assassination_target(state: &mut GameState, seat: Seat, target: Seat) -> StepReport {
    if state.phase != GamePhase::Assassination {
        return StepReport::ignored(RejectReason::WrongPhase);
    }
    if state.assassin_seat() != Some(seat) {
        return StepReport::ignored(RejectReason::NotAssassin);
    }
    if target == seat || state.player(target).is_none() {
        return StepReport::ignored(RejectReason::InvalidSeatReference);
    }
    let mut events = Vec::new();
    perform_assassination(state, seat, target, &mut events);
    StepReport::applied(events)
}

fn player_disconnect(state: &mut GameState, seat: Seat) -> StepReport {
    let Some(player) = state.player_mut(seat) else {
        return StepReport::ignored(RejectReason::UnknownSeat);
    };
    if player.presence != (SeatPresence::Human { connected: true }) {
        return StepReport::ignored(RejectReason::PresenceUnchanged);
    }
    player.presence = SeatPresence::Human { connected: false };
    info!(seat = %seat, "player disconnected");
    StepReport::applied(vec![GameEvent::PresenceChanged {
        seat,
        connected: false,
    }])
}

fn player_reconnect(state: &mut GameState, seat: Seat, name: &str) -> StepReport {
    let Some(player) = state.player_mut(seat) else {
        return StepReport::ignored(RejectReason::UnknownSeat);
    };
    if player.presence != (SeatPresence::Human { connected: false }) {
        return StepReport::ignored(RejectReason::PresenceUnchanged);
    }
    player.presence = SeatPresence::Human { connected: true };
    player.name = name.to_owned();
    info!(seat = %seat, "player reconnected");
    StepReport::applied(vec![GameEvent::PresenceChanged {
        seat,
        connected: true,
    }])
}

// ---------------------------------------------------------------------------
// Ticks
// ---------------------------------------------------------------------------

fn handle_tick(state: &mut GameState) -> StepReport {
    if state.phase.is_terminal() {
        return StepReport::applied(Vec::new());
    }
    state.tick = state.tick.saturating_add(1);
    let mut events = Vec::new();

    tick_speaking(state, &mut events);

    // The speaking expiry may have ended the discussion and entered a fresh
    // phase; its countdown simply loses one tick like any other.
    if !state.phase.is_terminal() {
        state.phase_ticks_remaining = state.phase_ticks_remaining.saturating_sub(1);
        if state.phase_ticks_remaining == 0 {
            expire_phase(state, &mut events);
        }
    }
    StepReport::applied(events)
}

fn tick_speaking(state: &mut GameState, events: &mut Vec<GameEvent>) {
    if !state.phase.is_discussion() {
        return;
    }
    let Some(turn) = state.speaking.as_mut() else {
        return;
    };
    turn.remaining_ticks = turn.remaining_ticks.saturating_sub(1);
    if turn.remaining_ticks > 0 {
        return;
    }
    let Some(speaker) = turn.current_speaker() else {
        return;
    };
    let draft = turn.draft.take().filter(|text| !text.trim().is_empty());

    if let Some(text) = draft {
        let tick = state.tick;
        state.chat.push(ChatMessage {
            seat: speaker,
            text,
            tick,
            forced: true,
        });
        events.push(GameEvent::ChatPosted {
            seat: speaker,
            forced: true,
        });
    }
    events.push(GameEvent::DefaultForced {
        seat: speaker,
        what: ForcedDefault::SpeakingTurn,
    });
    advance_speaker(state, events);
}

fn expire_phase(state: &mut GameState, events: &mut Vec<GameEvent>) {
    match state.phase {
        GamePhase::RoleReveal => enter_phase(state, GamePhase::TeamBuilding, events),

        GamePhase::TeamBuilding => {
            if state.proposal.is_none() {
                let members = default_team(state);
                let leader = state.leader;
                let mut proposal = TeamProposal::new(state.mission_number, leader);
                proposal.members = members;
                state.proposal = Some(proposal);
                events.push(GameEvent::DefaultForced {
                    seat: leader,
                    what: ForcedDefault::Proposal,
                });
            }
            enter_phase(state, GamePhase::TeamBuildingReview, events);
        }

        GamePhase::TeamBuildingReview => enter_phase(state, GamePhase::Voting, events),

        GamePhase::Voting => {
            let eligible = state.available_seats();
            if let Some(proposal) = state.proposal.as_mut() {
                for seat in eligible {
                    if !proposal.votes.contains_key(&seat) {
                        proposal.votes.insert(seat, Vote::Approve);
                        events.push(GameEvent::DefaultForced {
                            seat,
                            what: ForcedDefault::Vote,
                        });
                    }
                }
            }
            resolve_vote(state, events);
        }

        GamePhase::VotingReview => proceed_after_vote(state, events),

        GamePhase::Mission => {
            if let Some(mission) = state.mission.as_mut() {
                for seat in mission.pending_members() {
                    mission.actions.insert(seat, MissionAction::Success);
                    events.push(GameEvent::DefaultForced {
                        seat,
                        what: ForcedDefault::MissionPlay,
                    });
                }
            }
            resolve_mission(state, events);
        }

        GamePhase::MissionReview => proceed_after_mission(state, events),

        GamePhase::Assassination => {
            if let Some(assassin) = state.assassin_seat() {
                let target = default_assassination_target(state, assassin);
                events.push(GameEvent::DefaultForced {
                    seat: assassin,
                    what: ForcedDefault::AssassinationTarget,
                });
                perform_assassination(state, assassin, target, events);
            } else {
                finish_game(state, Alignment::Good, None, events);
            }
        }

        GamePhase::Finished => {}
    }
}

/// The first-fit team a stalled leader is assumed to have picked: available
/// seats in rotation order starting from the leader.
fn default_team(state: &GameState) -> Vec<Seat> {
    let Some(size) = rules::team_size(state.seat_count(), state.mission_number) else {
        return Vec::new();
    };
    let available = state.available_seats();
    let start = available
        .iter()
        .position(|seat| *seat >= state.leader)
        .unwrap_or(0);
    available
        .iter()
        .cycle()
        .skip(start)
        .take(usize::from(size).min(available.len()))
        .copied()
        .collect()
}

/// A stalled assassin targets the lowest seat it has no evil sight of,
/// excluding itself.
fn default_assassination_target(state: &GameState, assassin: Seat) -> Seat {
    let roles: Vec<Role> = state.players.iter().filter_map(|p| p.role).collect();
    let known: Vec<Seat> = if roles.len() == state.players.len() {
        visibility::visible_seats_for(assassin, &roles)
            .iter()
            .map(|v| v.seat)
            .collect()
    } else {
        Vec::new()
    };
    state
        .players
        .iter()
        .map(|p| p.seat)
        .find(|seat| *seat != assassin && !known.contains(seat))
        .unwrap_or(assassin)
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

fn advance_speaker(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let Some(turn) = state.speaking.as_mut() else {
        return;
    };
    match speaking::advance(turn) {
        AdvanceOutcome::Next(seat) => events.push(GameEvent::SpeakerAdvanced {
            speaker: Some(seat),
        }),
        AdvanceOutcome::Ended => {
            events.push(GameEvent::SpeakerAdvanced { speaker: None });
            state.speaking = None;
            end_discussion(state, events);
        }
    }
}

/// A linear speaking rotation ran out of seats: the discussion ends early
/// and the phase resolves as if its countdown had expired.
fn end_discussion(state: &mut GameState, events: &mut Vec<GameEvent>) {
    match state.phase {
        GamePhase::TeamBuildingReview => enter_phase(state, GamePhase::Voting, events),
        GamePhase::VotingReview => proceed_after_vote(state, events),
        GamePhase::MissionReview => proceed_after_mission(state, events),
        // Team-building wraps, everything else has no rotation.
        _ => {}
    }
}

fn resolve_vote(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let eligible = state.available_seats();
    let Some(proposal) = state.proposal.as_mut() else {
        return;
    };
    let approvals = proposal.approvals();
    // Strict majority of the eligible seats; a tie rejects.
    let resolution = if approvals.saturating_mul(2) > eligible.len() {
        ProposalResolution::Approved
    } else {
        ProposalResolution::Rejected
    };
    proposal.resolution = Some(resolution);
    let archived = proposal.clone();
    state.proposal_history.push(archived);

    events.push(GameEvent::ProposalResolved {
        resolution,
        approvals: u8::try_from(approvals).unwrap_or(u8::MAX),
        eligible: u8::try_from(eligible.len()).unwrap_or(u8::MAX),
    });
    info!(
        ?resolution,
        approvals,
        eligible = eligible.len(),
        "proposal vote resolved"
    );
    // The proposal stays in place through the review so every seat can see
    // the vote breakdown; it is consumed when the review ends.
    enter_phase(state, GamePhase::VotingReview, events);
}

fn proceed_after_vote(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let Some(proposal) = state.proposal.take() else {
        return;
    };
    if proposal.resolution == Some(ProposalResolution::Approved) {
        state.rejection_count = 0;
        state.mission = Some(Mission::new(proposal.mission_number, proposal.members));
        enter_phase(state, GamePhase::Mission, events);
        return;
    }

    state.rejection_count = state.rejection_count.saturating_add(1);
    if state.rejection_count >= rules::MAX_CONSECUTIVE_REJECTIONS {
        info!(
            rejections = state.rejection_count,
            "rejection cap reached, evil wins"
        );
        finish_game(state, Alignment::Evil, None, events);
        return;
    }
    state.leader = state.next_available_seat(state.leader);
    events.push(GameEvent::LeaderRotated {
        leader: state.leader,
    });
    enter_phase(state, GamePhase::TeamBuilding, events);
}

fn resolve_mission(state: &mut GameState, events: &mut Vec<GameEvent>) {
    let Some(mut mission) = state.mission.take() else {
        return;
    };
    let fails = u8::try_from(mission.fails()).unwrap_or(u8::MAX);
    // Session construction guarantees a supported table size here.
    let threshold =
        rules::fail_threshold(state.seat_count(), mission.mission_number).unwrap_or(1);
    let outcome = if fails >= threshold {
        MissionOutcome::Failed
    } else {
        MissionOutcome::Succeeded
    };
    mission.outcome = Some(outcome);
    mission.revealed_fails = Some(fails);

    events.push(GameEvent::MissionResolved {
        mission_number: mission.mission_number,
        outcome,
        fails,
    });
    info!(
        mission = mission.mission_number,
        ?outcome,
        fails,
        "mission resolved"
    );
    state.mission_history.push(mission);
    enter_phase(state, GamePhase::MissionReview, events);
}

fn proceed_after_mission(state: &mut GameState, events: &mut Vec<GameEvent>) {
    if state.successes() >= rules::MISSIONS_TO_WIN {
        if state.has_assassin() {
            enter_phase(state, GamePhase::Assassination, events);
        } else {
            finish_game(state, Alignment::Good, None, events);
        }
        return;
    }
    if state.failures() >= rules::MISSIONS_TO_WIN {
        finish_game(state, Alignment::Evil, None, events);
        return;
    }

    state.mission_number = state.mission_number.saturating_add(1);
    state.rejection_count = 0;
    state.leader = state.next_available_seat(state.leader);
    events.push(GameEvent::LeaderRotated {
        leader: state.leader,
    });
    enter_phase(state, GamePhase::TeamBuilding, events);
}

fn perform_assassination(
    state: &mut GameState,
    assassin: Seat,
    target: Seat,
    events: &mut Vec<GameEvent>,
) {
    let hit = state.role_of(target) == Some(Role::Merlin);
    let winner = if hit { Alignment::Evil } else { Alignment::Good };
    info!(assassin = %assassin, target = %target, hit, "assassination resolved");
    finish_game(
        state,
        winner,
        Some(AssassinationRecord {
            assassin,
            target,
            hit,
        }),
        events,
    );
}

fn finish_game(
    state: &mut GameState,
    winner: Alignment,
    assassination: Option<AssassinationRecord>,
    events: &mut Vec<GameEvent>,
) {
    state.outcome = Some(SessionOutcome {
        winner,
        assassination,
    });
    enter_phase(state, GamePhase::Finished, events);
    events.push(GameEvent::GameEnded { winner });
    info!(session_id = %state.session_id, %winner, "session finished");
}

fn enter_phase(state: &mut GameState, to: GamePhase, events: &mut Vec<GameEvent>) {
    let from = state.phase;
    state.phase = to;
    state.phase_ticks_remaining = rules::phase_countdown(to);
    state.speaking = if to.is_discussion() {
        speaking::begin(
            &state.available_seats(),
            state.leader,
            to == GamePhase::TeamBuilding,
        )
    } else {
        None
    };
    debug!(?from, ?to, "phase changed");
    events.push(GameEvent::PhaseChanged { from, to });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::state::{new_session, SeatSetup};
    use conclave_types::{Disposition, SessionId, SpeakingTurn};

    fn session(count: u8) -> GameState {
        let setups: Vec<SeatSetup> = (0..count)
            .map(|index| SeatSetup {
                name: format!("P{index}"),
                presence: SeatPresence::Agent,
            })
            .collect();
        let roles = rules::roster(count).unwrap().to_vec();
        new_session(SessionId::new(), &setups, &roles).unwrap()
    }

    fn tick(state: &mut GameState) -> StepReport {
        apply(state, &GameInput::Tick)
    }

    fn act(state: &mut GameState, action: GameAction) -> StepReport {
        apply(state, &GameInput::Action(action))
    }

    fn tick_until(state: &mut GameState, phase: GamePhase) {
        for _ in 0..10_000 {
            if state.phase == phase {
                return;
            }
            tick(state);
        }
        assert_eq!(state.phase, phase, "phase never reached");
    }

    /// Every seat in the rotation passes until the discussion phase ends.
    fn pass_discussion(state: &mut GameState) {
        let phase = state.phase;
        for _ in 0..32 {
            if state.phase != phase {
                return;
            }
            let Some(speaker) = state
                .speaking
                .as_ref()
                .and_then(SpeakingTurn::current_speaker)
            else {
                return;
            };
            act(state, GameAction::PassSpeakingTurn { seat: speaker });
        }
    }

    fn vote_all(state: &mut GameState, vote: Vote) {
        for seat in state.available_seats() {
            act(state, GameAction::CastProposalVote { seat, vote });
        }
    }

    // Full happy path for the first mission of a 5-player table.
    #[test]
    fn approved_team_runs_a_mission_and_rotates_leadership() {
        let mut state = session(5);
        tick_until(&mut state, GamePhase::TeamBuilding);

        let report = act(
            &mut state,
            GameAction::ProposeTeam {
                seat: Seat(0),
                members: vec![Seat(0), Seat(1)],
            },
        );
        assert!(report.is_applied());

        let report = act(&mut state, GameAction::FinishTeamBuilding { seat: Seat(0) });
        assert!(report.is_applied());
        assert_eq!(state.phase, GamePhase::TeamBuildingReview);
        assert_eq!(
            state
                .speaking
                .as_ref()
                .and_then(SpeakingTurn::current_speaker),
            Some(Seat(0))
        );

        pass_discussion(&mut state);
        assert_eq!(state.phase, GamePhase::Voting);

        vote_all(&mut state, Vote::Approve);
        assert_eq!(state.phase, GamePhase::VotingReview);
        assert_eq!(state.proposal_history.len(), 1);
        assert_eq!(
            state.proposal.as_ref().unwrap().resolution,
            Some(ProposalResolution::Approved)
        );

        pass_discussion(&mut state);
        assert_eq!(state.phase, GamePhase::Mission);
        assert!(state.proposal.is_none());
        assert_eq!(state.rejection_count, 0);
        let members = state.mission.as_ref().unwrap().members.clone();
        assert_eq!(members, vec![Seat(0), Seat(1)]);

        for seat in members {
            act(
                &mut state,
                GameAction::CastMissionAction {
                    seat,
                    action: MissionAction::Success,
                },
            );
        }
        assert_eq!(state.phase, GamePhase::MissionReview);
        assert!(state.mission.is_none());
        let archived = state.mission_history.first().unwrap();
        assert_eq!(archived.outcome, Some(MissionOutcome::Succeeded));
        assert_eq!(archived.revealed_fails, Some(0));

        pass_discussion(&mut state);
        assert_eq!(state.phase, GamePhase::TeamBuilding);
        assert_eq!(state.mission_number, 2);
        assert_eq!(state.leader, Seat(1));
    }

    #[test]
    fn five_straight_rejections_end_the_game_for_evil() {
        let mut state = session(5);
        tick_until(&mut state, GamePhase::TeamBuilding);

        for round in 0..5 {
            let leader = state.leader;
            act(
                &mut state,
                GameAction::ProposeTeam {
                    seat: leader,
                    members: vec![Seat(0), Seat(1)],
                },
            );
            act(&mut state, GameAction::FinishTeamBuilding { seat: leader });
            pass_discussion(&mut state);
            assert_eq!(state.phase, GamePhase::Voting, "round {round}");
            vote_all(&mut state, Vote::Reject);
            pass_discussion(&mut state);
        }

        assert_eq!(state.phase, GamePhase::Finished);
        assert_eq!(state.rejection_count, 5);
        assert_eq!(state.outcome.unwrap().winner, Alignment::Evil);
        assert_eq!(state.proposal_history.len(), 5);
    }

    #[test]
    fn tie_vote_rejects_and_rotates_leadership() {
        let mut state = session(6);
        tick_until(&mut state, GamePhase::TeamBuilding);
        act(
            &mut state,
            GameAction::ProposeTeam {
                seat: Seat(0),
                members: vec![Seat(0), Seat(1)],
            },
        );
        act(&mut state, GameAction::FinishTeamBuilding { seat: Seat(0) });
        pass_discussion(&mut state);

        // 3 approve / 3 reject out of 6: not a strict majority.
        for seat in [0_u8, 1, 2] {
            act(
                &mut state,
                GameAction::CastProposalVote {
                    seat: Seat(seat),
                    vote: Vote::Approve,
                },
            );
        }
        for seat in [3_u8, 4, 5] {
            act(
                &mut state,
                GameAction::CastProposalVote {
                    seat: Seat(seat),
                    vote: Vote::Reject,
                },
            );
        }
        assert_eq!(
            state.proposal.as_ref().unwrap().resolution,
            Some(ProposalResolution::Rejected)
        );
        pass_discussion(&mut state);
        assert_eq!(state.phase, GamePhase::TeamBuilding);
        assert_eq!(state.rejection_count, 1);
        assert_eq!(state.leader, Seat(1));
    }

    #[test]
    fn authority_violations_are_silently_rejected() {
        let mut state = session(5);
        tick_until(&mut state, GamePhase::TeamBuilding);

        // Not the leader.
        let report = act(
            &mut state,
            GameAction::ProposeTeam {
                seat: Seat(2),
                members: vec![Seat(0), Seat(1)],
            },
        );
        assert_eq!(
            report.disposition,
            Disposition::Ignored(RejectReason::NotLeader)
        );

        // Wrong team size.
        let report = act(
            &mut state,
            GameAction::ProposeTeam {
                seat: Seat(0),
                members: vec![Seat(0), Seat(1), Seat(2)],
            },
        );
        assert_eq!(
            report.disposition,
            Disposition::Ignored(RejectReason::InvalidTeamSize)
        );

        // Duplicate members.
        let report = act(
            &mut state,
            GameAction::ProposeTeam {
                seat: Seat(0),
                members: vec![Seat(1), Seat(1)],
            },
        );
        assert_eq!(
            report.disposition,
            Disposition::Ignored(RejectReason::InvalidSeatReference)
        );

        // Unknown seat.
        let report = act(&mut state, GameAction::FinishTeamBuilding { seat: Seat(9) });
        assert_eq!(
            report.disposition,
            Disposition::Ignored(RejectReason::UnknownSeat)
        );

        // Vote outside the voting phase.
        let report = act(
            &mut state,
            GameAction::CastProposalVote {
                seat: Seat(0),
                vote: Vote::Approve,
            },
        );
        assert_eq!(
            report.disposition,
            Disposition::Ignored(RejectReason::WrongPhase)
        );
    }

    #[test]
    fn double_votes_are_ignored() {
        let mut state = session(5);
        tick_until(&mut state, GamePhase::TeamBuilding);
        act(
            &mut state,
            GameAction::ProposeTeam {
                seat: Seat(0),
                members: vec![Seat(0), Seat(1)],
            },
        );
        act(&mut state, GameAction::FinishTeamBuilding { seat: Seat(0) });
        pass_discussion(&mut state);

        act(
            &mut state,
            GameAction::CastProposalVote {
                seat: Seat(0),
                vote: Vote::Approve,
            },
        );
        let report = act(
            &mut state,
            GameAction::CastProposalVote {
                seat: Seat(0),
                vote: Vote::Reject,
            },
        );
        assert_eq!(
            report.disposition,
            Disposition::Ignored(RejectReason::AlreadyActed)
        );
        assert_eq!(
            state.proposal.as_ref().unwrap().votes.get(&Seat(0)),
            Some(&Vote::Approve)
        );
    }

    #[test]
    fn good_seats_cannot_play_fail() {
        let mut state = session(5);
        tick_until(&mut state, GamePhase::TeamBuilding);
        // Seat 0 is Merlin (good), seat 3 is Morgana (evil).
        act(
            &mut state,
            GameAction::ProposeTeam {
                seat: Seat(0),
                members: vec![Seat(0), Seat(3)],
            },
        );
        act(&mut state, GameAction::FinishTeamBuilding { seat: Seat(0) });
        pass_discussion(&mut state);
        vote_all(&mut state, Vote::Approve);
        pass_discussion(&mut state);
        assert_eq!(state.phase, GamePhase::Mission);

        let report = act(
            &mut state,
            GameAction::CastMissionAction {
                seat: Seat(0),
                action: MissionAction::Fail,
            },
        );
        assert_eq!(
            report.disposition,
            Disposition::Ignored(RejectReason::GoodCannotFail)
        );
        assert!(state.mission.as_ref().unwrap().actions.is_empty());

        // Evil can fail; good succeeds; one fail sinks mission 1.
        act(
            &mut state,
            GameAction::CastMissionAction {
                seat: Seat(0),
                action: MissionAction::Success,
            },
        );
        act(
            &mut state,
            GameAction::CastMissionAction {
                seat: Seat(3),
                action: MissionAction::Fail,
            },
        );
        assert_eq!(state.phase, GamePhase::MissionReview);
        let archived = state.mission_history.first().unwrap();
        assert_eq!(archived.outcome, Some(MissionOutcome::Failed));
        assert_eq!(archived.revealed_fails, Some(1));
    }

    #[test]
    fn voting_expiry_defaults_missing_votes_to_approve() {
        let mut state = session(5);
        tick_until(&mut state, GamePhase::TeamBuilding);
        act(
            &mut state,
            GameAction::ProposeTeam {
                seat: Seat(0),
                members: vec![Seat(0), Seat(1)],
            },
        );
        act(&mut state, GameAction::FinishTeamBuilding { seat: Seat(0) });
        tick_until(&mut state, GamePhase::Voting);

        // Nobody votes; the countdown approves for everyone.
        tick_until(&mut state, GamePhase::VotingReview);
        let proposal = state.proposal.as_ref().unwrap();
        assert_eq!(proposal.resolution, Some(ProposalResolution::Approved));
        assert_eq!(proposal.approvals(), 5);
    }

    #[test]
    fn speaking_expiry_force_submits_the_draft() {
        let mut state = session(5);
        tick_until(&mut state, GamePhase::TeamBuilding);
        act(
            &mut state,
            GameAction::ProposeTeam {
                seat: Seat(0),
                members: vec![Seat(0), Seat(1)],
            },
        );
        act(&mut state, GameAction::FinishTeamBuilding { seat: Seat(0) });
        assert_eq!(state.phase, GamePhase::TeamBuildingReview);

        act(
            &mut state,
            GameAction::UpdateChatDraft {
                seat: Seat(0),
                text: "half-typed thought".to_owned(),
            },
        );
        for _ in 0..rules::SPEAKING_TURN_TICKS {
            tick(&mut state);
        }
        let message = state.chat.first().unwrap();
        assert_eq!(message.seat, Seat(0));
        assert!(message.forced);
        assert_eq!(message.text, "half-typed thought");
        assert_eq!(
            state
                .speaking
                .as_ref()
                .and_then(SpeakingTurn::current_speaker),
            Some(Seat(1))
        );
    }

    #[test]
    fn only_the_current_speaker_may_chat() {
        let mut state = session(5);
        tick_until(&mut state, GamePhase::TeamBuilding);
        assert_eq!(
            state
                .speaking
                .as_ref()
                .and_then(SpeakingTurn::current_speaker),
            Some(Seat(0))
        );
        let report = act(
            &mut state,
            GameAction::SendChat {
                seat: Seat(2),
                text: "out of turn".to_owned(),
            },
        );
        assert_eq!(
            report.disposition,
            Disposition::Ignored(RejectReason::NotCurrentSpeaker)
        );
        assert!(state.chat.is_empty());

        let report = act(
            &mut state,
            GameAction::SendChat {
                seat: Seat(0),
                text: "my turn".to_owned(),
            },
        );
        assert!(report.is_applied());
        assert_eq!(state.chat.len(), 1);
        // Team-building wraps, so the rotation keeps going.
        assert_eq!(
            state
                .speaking
                .as_ref()
                .and_then(SpeakingTurn::current_speaker),
            Some(Seat(1))
        );
    }

    #[test]
    fn assassination_hit_flips_the_win_to_evil() {
        let mut state = session(5);
        force_assassination_phase(&mut state);

        let report = act(
            &mut state,
            GameAction::ChooseAssassinationTarget {
                seat: Seat(4),
                target: Seat(0),
            },
        );
        assert!(report.is_applied());
        assert_eq!(state.phase, GamePhase::Finished);
        let outcome = state.outcome.unwrap();
        assert_eq!(outcome.winner, Alignment::Evil);
        assert!(outcome.assassination.unwrap().hit);
    }

    #[test]
    fn assassination_miss_confirms_the_good_win() {
        let mut state = session(5);
        force_assassination_phase(&mut state);

        act(
            &mut state,
            GameAction::ChooseAssassinationTarget {
                seat: Seat(4),
                target: Seat(2),
            },
        );
        let outcome = state.outcome.unwrap();
        assert_eq!(outcome.winner, Alignment::Good);
        assert!(!outcome.assassination.unwrap().hit);
    }

    #[test]
    fn only_the_assassin_may_target() {
        let mut state = session(5);
        force_assassination_phase(&mut state);

        let report = act(
            &mut state,
            GameAction::ChooseAssassinationTarget {
                seat: Seat(3),
                target: Seat(0),
            },
        );
        assert_eq!(
            report.disposition,
            Disposition::Ignored(RejectReason::NotAssassin)
        );

        let report = act(
            &mut state,
            GameAction::ChooseAssassinationTarget {
                seat: Seat(4),
                target: Seat(4),
            },
        );
        assert_eq!(
            report.disposition,
            Disposition::Ignored(RejectReason::InvalidSeatReference)
        );
    }

    #[test]
    fn terminal_state_ignores_everything() {
        let mut state = session(5);
        force_assassination_phase(&mut state);
        act(
            &mut state,
            GameAction::ChooseAssassinationTarget {
                seat: Seat(4),
                target: Seat(0),
            },
        );
        assert_eq!(state.phase, GamePhase::Finished);

        let report = act(&mut state, GameAction::FinishTeamBuilding { seat: Seat(0) });
        assert_eq!(
            report.disposition,
            Disposition::Ignored(RejectReason::SessionFinished)
        );

        let before = state.tick;
        tick(&mut state);
        assert_eq!(state.tick, before);
    }

    #[test]
    fn an_all_defaults_session_reaches_a_terminal_state() {
        // With no actions at all, every countdown forces a resolution:
        // default teams, default approvals, default successes, and finally
        // a default assassination target.
        let mut state = session(5);
        tick_until(&mut state, GamePhase::Finished);
        let outcome = state.outcome.unwrap();
        assert_eq!(state.successes(), 3);
        // The stalled assassin targets seat 0, which happens to be the seer.
        assert_eq!(outcome.winner, Alignment::Evil);
        assert!(outcome.assassination.is_some());
    }

    #[test]
    fn disconnects_flip_presence_once() {
        let mut setups: Vec<SeatSetup> = (0..5)
            .map(|index| SeatSetup {
                name: format!("P{index}"),
                presence: SeatPresence::Agent,
            })
            .collect();
        if let Some(first) = setups.get_mut(0) {
            first.presence = SeatPresence::Human { connected: true };
        }
        let roles = rules::roster(5).unwrap().to_vec();
        let mut state = new_session(SessionId::new(), &setups, &roles).unwrap();

        let report = act(&mut state, GameAction::PlayerDisconnect { seat: Seat(0) });
        assert!(report.is_applied());
        assert!(!state.available_seats().contains(&Seat(0)));

        let report = act(&mut state, GameAction::PlayerDisconnect { seat: Seat(0) });
        assert_eq!(
            report.disposition,
            Disposition::Ignored(RejectReason::PresenceUnchanged)
        );

        // Agents cannot disconnect.
        let report = act(&mut state, GameAction::PlayerDisconnect { seat: Seat(1) });
        assert_eq!(
            report.disposition,
            Disposition::Ignored(RejectReason::PresenceUnchanged)
        );

        let report = act(
            &mut state,
            GameAction::PlayerReconnect {
                seat: Seat(0),
                name: "Returning".to_owned(),
            },
        );
        assert!(report.is_applied());
        assert_eq!(state.player(Seat(0)).unwrap().name, "Returning");
    }

    #[test]
    fn transition_leaves_the_original_untouched() {
        let state = {
            let mut s = session(5);
            tick_until(&mut s, GamePhase::TeamBuilding);
            s
        };
        let (next, report) = transition(
            &state,
            &GameInput::Action(GameAction::ProposeTeam {
                seat: Seat(0),
                members: vec![Seat(0), Seat(1)],
            }),
        );
        assert!(report.is_applied());
        assert!(state.proposal.is_none());
        assert!(next.proposal.is_some());
    }

    /// Stage a state one tick away from routing into the assassination
    /// phase: three archived successes with a review about to expire.
    fn force_assassination_phase(state: &mut GameState) {
        tick_until(state, GamePhase::TeamBuilding);
        for number in 1..=3 {
            let mut mission = Mission::new(number, vec![Seat(0), Seat(1)]);
            mission.outcome = Some(MissionOutcome::Succeeded);
            mission.revealed_fails = Some(0);
            state.mission_history.push(mission);
        }
        state.phase = GamePhase::MissionReview;
        state.speaking = None;
        state.phase_ticks_remaining = 1;
        tick(state);
        assert_eq!(state.phase, GamePhase::Assassination);
    }
}
