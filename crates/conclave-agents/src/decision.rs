//! The per-seat decision engine.
//!
//! Each agent-driven seat owns one engine. On every state update the engine
//! works out whether its seat has a pending duty (propose, vote, speak,
//! play, assassinate), asks the model for a decision, validates the reply,
//! and emits a [`GameAction`]. Every failure on that path degrades to a
//! heuristic instead of stalling the table: a failed decision bumps an error
//! counter, and hitting the threshold switches the seat to heuristics for
//! the rest of the session.

use std::sync::Arc;
use std::time::Duration;

use conclave_types::{
    ActionCategory, Alignment, GameAction, GamePhase, GameState, MissionAction, Role, Seat,
    SpeakingTurn, Vote, VisibleSeat,
};
use tracing::{debug, warn};

use crate::client::{CallContext, InferenceClient};
use crate::error::AgentError;
use crate::heuristics::Heuristics;
use crate::parse::{parse_reply, ParsedReply};
use crate::prompt::PromptEngine;

/// How many recent chat messages make it into the prompt.
const CHAT_WINDOW: usize = 12;

/// Identifies one decision instance so the engine never acts twice on it.
///
/// Two views with the same key describe the same pending decision; a view
/// that changes any component is a fresh instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DecisionKey {
    phase: GamePhase,
    mission_number: u8,
    rejection_count: u8,
    speaker_position: Option<usize>,
    proposal_pending: bool,
    // The speaking rotation wraps in team-building, so a position alone can
    // repeat across laps; the chat length tells the laps apart.
    chat_len: usize,
}

/// What the seat is currently expected to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Duty {
    /// Nominate a team of this size.
    Propose {
        /// Required team size.
        size: u8,
    },
    /// Lock the nominated team and open the review.
    Lock,
    /// Hold the speaking turn: say something or pass.
    Speak,
    /// Vote on the locked proposal.
    Vote,
    /// Play a mission card.
    Play,
    /// Name the assassination target.
    Assassinate,
}

/// Where decisions come from.
enum DecisionSource {
    /// A shared rate-limited model client.
    Llm(Arc<InferenceClient>),
    /// Heuristics only; no model configured for this seat.
    Fallback,
    /// Queued canned response texts for tests.
    #[cfg(test)]
    Scripted(std::sync::Mutex<std::collections::VecDeque<String>>),
}

impl DecisionSource {
    async fn complete(
        &self,
        prompts: &PromptEngine,
        context: &serde_json::Value,
        call: CallContext,
    ) -> Result<String, AgentError> {
        match self {
            Self::Llm(client) => {
                let rendered = prompts.render(context)?;
                client.complete(&rendered, call).await
            }
            Self::Fallback => Err(AgentError::Inference("no model configured".to_owned())),
            #[cfg(test)]
            Self::Scripted(queue) => {
                // Render anyway so template regressions surface in tests.
                prompts.render(context)?;
                queue
                    .lock()
                    .ok()
                    .and_then(|mut q| q.pop_front())
                    .ok_or_else(|| AgentError::Inference("script exhausted".to_owned()))
            }
        }
    }
}

/// Decision engine for one agent-driven seat.
pub struct DecisionEngine {
    seat: Seat,
    role: Role,
    name: String,
    /// Visibility set computed once at role assignment.
    visible: Vec<VisibleSeat>,
    source: DecisionSource,
    prompts: Arc<PromptEngine>,
    heuristics: Heuristics,
    consecutive_errors: u32,
    max_errors: u32,
    fallback_only: bool,
    last_key: Option<DecisionKey>,
    chat_probability: f64,
    /// Pause before an action is released, pacing agents like human players.
    response_delay: Duration,
}

impl DecisionEngine {
    /// Build an engine for a seat.
    ///
    /// Passing `None` for the client yields a heuristics-only seat, used
    /// both for credential-less runs and for deterministic tests.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        seat: Seat,
        role: Role,
        name: String,
        visible: Vec<VisibleSeat>,
        client: Option<Arc<InferenceClient>>,
        prompts: Arc<PromptEngine>,
        seed: u64,
        max_errors: u32,
        chat_probability: f64,
        response_delay: Duration,
    ) -> Self {
        let (source, fallback_only) = client.map_or((DecisionSource::Fallback, true), |client| {
            (DecisionSource::Llm(client), false)
        });
        Self {
            seat,
            role,
            name,
            visible,
            source,
            prompts,
            heuristics: Heuristics::new(seed),
            consecutive_errors: 0,
            max_errors,
            fallback_only,
            last_key: None,
            chat_probability,
            response_delay,
        }
    }

    /// The seat this engine drives.
    pub const fn seat(&self) -> Seat {
        self.seat
    }

    /// Whether the seat has permanently degraded to heuristics.
    pub const fn is_fallback_only(&self) -> bool {
        self.fallback_only
    }

    /// Decide on the seat's pending duty in this view, if any.
    ///
    /// Returns `None` when the seat has nothing to do, or when it already
    /// acted on this exact decision instance (the action may still be in
    /// flight through the session mailbox). A non-zero response delay holds
    /// the chosen action back before it is released.
    pub async fn decide(&mut self, view: &GameState) -> Option<GameAction> {
        let duty = self.pending_duty(view)?;
        let key = Self::key_of(view);
        if self.last_key == Some(key) {
            return None;
        }

        let action = self.choose(view, duty).await;
        self.last_key = Some(key);
        if !self.response_delay.is_zero() {
            tokio::time::sleep(self.response_delay).await;
        }
        Some(action)
    }

    /// Whether `action` still answers this seat's pending duty in `view`.
    ///
    /// The pacing delay means a decision can outlive the snapshot it was
    /// made against; an action the table has moved past is dropped instead
    /// of being submitted as a protocol violation.
    pub fn answers_pending_duty(&self, view: &GameState, action: &GameAction) -> bool {
        self.pending_duty(view).is_some_and(|duty| {
            matches!(
                (duty, action),
                (Duty::Propose { .. }, GameAction::ProposeTeam { .. })
                    | (Duty::Lock, GameAction::FinishTeamBuilding { .. })
                    | (
                        Duty::Speak,
                        GameAction::SendChat { .. } | GameAction::PassSpeakingTurn { .. }
                    )
                    | (Duty::Vote, GameAction::CastProposalVote { .. })
                    | (Duty::Play, GameAction::CastMissionAction { .. })
                    | (Duty::Assassinate, GameAction::ChooseAssassinationTarget { .. })
            )
        })
    }

    /// Pick the action for a duty: a model decision where one is needed and
    /// available, a heuristic otherwise.
    async fn choose(&mut self, view: &GameState, duty: Duty) -> GameAction {
        // Locking needs no model: the team is already on the table.
        if duty == Duty::Lock {
            return GameAction::FinishTeamBuilding { seat: self.seat };
        }
        if duty == Duty::Speak && !self.heuristics.wants_to_chat(self.chat_probability) {
            return GameAction::PassSpeakingTurn { seat: self.seat };
        }
        if let Some(action) = self.model_decision(view, duty).await {
            return action;
        }
        self.fallback_action(view, duty)
    }

    /// Work out the seat's pending duty from its redacted view.
    fn pending_duty(&self, view: &GameState) -> Option<Duty> {
        if view.phase.is_terminal() {
            return None;
        }

        if view.phase == GamePhase::TeamBuilding && view.leader == self.seat {
            return match &view.proposal {
                None => {
                    let size =
                        conclave_engine::rules::team_size(view.seat_count(), view.mission_number)?;
                    Some(Duty::Propose { size })
                }
                Some(_) => Some(Duty::Lock),
            };
        }

        if view.phase.is_discussion()
            && view
                .speaking
                .as_ref()
                .and_then(SpeakingTurn::current_speaker)
                == Some(self.seat)
        {
            return Some(Duty::Speak);
        }

        if view.phase == GamePhase::Voting
            && view.available_seats().contains(&self.seat)
            && view
                .proposal
                .as_ref()
                .is_some_and(|p| !p.votes.contains_key(&self.seat))
        {
            return Some(Duty::Vote);
        }

        if view.phase == GamePhase::Mission
            && view.mission.as_ref().is_some_and(|m| {
                m.members.contains(&self.seat) && !m.actions.contains_key(&self.seat)
            })
        {
            return Some(Duty::Play);
        }

        if view.phase == GamePhase::Assassination && self.role.is_assassin_capable() {
            return Some(Duty::Assassinate);
        }

        None
    }

    /// The decision-instance key of a view.
    fn key_of(view: &GameState) -> DecisionKey {
        DecisionKey {
            phase: view.phase,
            mission_number: view.mission_number,
            rejection_count: view.rejection_count,
            speaker_position: view.speaking.as_ref().map(|t| t.position),
            proposal_pending: view.proposal.is_some(),
            chat_len: view.chat.len(),
        }
    }

    /// Ask the model and validate its reply against the duty.
    ///
    /// Any failure (rate limit, provider error, unparseable or mismatched
    /// reply) counts one error and yields `None` so the caller falls back.
    async fn model_decision(&mut self, view: &GameState, duty: Duty) -> Option<GameAction> {
        if self.fallback_only {
            return None;
        }
        if matches!(self.source, DecisionSource::Fallback) {
            return None;
        }

        let context = self.prompt_context(view, duty);
        let call = CallContext {
            seat: self.seat,
            role: self.role,
            category: category_of(duty),
        };

        let outcome = match self.source.complete(&self.prompts, &context, call).await {
            Ok(raw) => parse_reply(&raw).and_then(|reply| self.validate(view, duty, reply)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(action) => {
                self.consecutive_errors = 0;
                Some(action)
            }
            Err(e) => {
                self.consecutive_errors = self.consecutive_errors.saturating_add(1);
                warn!(
                    seat = %self.seat,
                    errors = self.consecutive_errors,
                    error = %e,
                    "decision failed, using heuristic"
                );
                if self.consecutive_errors >= self.max_errors && !self.fallback_only {
                    self.fallback_only = true;
                    warn!(
                        seat = %self.seat,
                        "error threshold reached, seat degraded to heuristics"
                    );
                }
                None
            }
        }
    }

    /// Check a parsed reply against the duty and convert it to an action.
    fn validate(
        &self,
        view: &GameState,
        duty: Duty,
        reply: ParsedReply,
    ) -> Result<GameAction, AgentError> {
        match (duty, reply) {
            (Duty::Propose { size }, ParsedReply::Team { members }) => {
                let mut seats: Vec<Seat> = members.iter().copied().map(Seat).collect();
                seats.sort_unstable();
                seats.dedup();
                let valid = seats.len() == usize::from(size)
                    && seats.iter().all(|s| view.player(*s).is_some());
                if valid {
                    Ok(GameAction::ProposeTeam {
                        seat: self.seat,
                        members: members.into_iter().map(Seat).collect(),
                    })
                } else {
                    Err(AgentError::Parse(format!(
                        "proposed team invalid for size {size}: {members:?}"
                    )))
                }
            }
            (Duty::Vote, ParsedReply::Vote { approve }) => Ok(GameAction::CastProposalVote {
                seat: self.seat,
                vote: if approve { Vote::Approve } else { Vote::Reject },
            }),
            (Duty::Play, ParsedReply::Mission { fail }) => {
                // A good seat asking to fail is coerced, not trusted.
                let action = if fail && self.role.alignment() == Alignment::Evil {
                    MissionAction::Fail
                } else {
                    MissionAction::Success
                };
                Ok(GameAction::CastMissionAction {
                    seat: self.seat,
                    action,
                })
            }
            (Duty::Speak, ParsedReply::Chat { text }) => Ok(GameAction::SendChat {
                seat: self.seat,
                text,
            }),
            (Duty::Speak, ParsedReply::Pass) => {
                Ok(GameAction::PassSpeakingTurn { seat: self.seat })
            }
            (Duty::Assassinate, ParsedReply::Assassinate { target }) => {
                let target = Seat(target);
                if target != self.seat && view.player(target).is_some() {
                    Ok(GameAction::ChooseAssassinationTarget {
                        seat: self.seat,
                        target,
                    })
                } else {
                    Err(AgentError::Parse(format!("invalid target: {target}")))
                }
            }
            (duty, reply) => Err(AgentError::Parse(format!(
                "reply {reply:?} does not answer {duty:?}"
            ))),
        }
    }

    /// The heuristic action for a duty.
    fn fallback_action(&mut self, view: &GameState, duty: Duty) -> GameAction {
        debug!(seat = %self.seat, ?duty, "heuristic decision");
        match duty {
            Duty::Propose { size } => GameAction::ProposeTeam {
                seat: self.seat,
                members: self.heuristics.propose_team(view, self.seat, size),
            },
            Duty::Lock => GameAction::FinishTeamBuilding { seat: self.seat },
            Duty::Speak => GameAction::SendChat {
                seat: self.seat,
                text: self.heuristics.chat_line(view.phase),
            },
            Duty::Vote => GameAction::CastProposalVote {
                seat: self.seat,
                vote: self
                    .heuristics
                    .vote(view, self.role.alignment(), &self.visible),
            },
            Duty::Play => GameAction::CastMissionAction {
                seat: self.seat,
                action: self.heuristics.mission_play(self.role.alignment()),
            },
            Duty::Assassinate => GameAction::ChooseAssassinationTarget {
                seat: self.seat,
                target: self
                    .heuristics
                    .assassination_target(view, self.seat, &self.visible),
            },
        }
    }

    /// Build the template context from the seat's view and duty.
    fn prompt_context(&self, view: &GameState, duty: Duty) -> serde_json::Value {
        let visible: Vec<serde_json::Value> = self
            .visible
            .iter()
            .map(|v| {
                serde_json::json!({
                    "seat": v.seat.0,
                    "label": format!("{:?}", v.label),
                })
            })
            .collect();

        let chat: Vec<serde_json::Value> = view
            .chat
            .iter()
            .rev()
            .take(CHAT_WINDOW)
            .rev()
            .map(|m| serde_json::json!({"seat": m.seat.0, "text": m.text}))
            .collect();

        let team = view.proposal.as_ref().map(|p| {
            p.members
                .iter()
                .map(|s| s.0.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        });

        let (task, schema) = task_of(duty);

        serde_json::json!({
            "seat_count": view.seat_count(),
            "name": self.name,
            "seat": self.seat.0,
            "role": format!("{:?}", self.role),
            "alignment": self.role.alignment().to_string(),
            "visible": visible,
            "phase": format!("{:?}", view.phase),
            "mission_number": view.mission_number,
            "successes": view.successes(),
            "failures": view.failures(),
            "rejection_count": view.rejection_count,
            "leader": view.leader.0,
            "team": team,
            "chat": chat,
            "task": task,
            "schema": schema,
        })
    }
}

/// Usage-accounting category for a duty.
const fn category_of(duty: Duty) -> ActionCategory {
    match duty {
        Duty::Propose { .. } | Duty::Lock => ActionCategory::TeamProposal,
        Duty::Speak => ActionCategory::Chat,
        Duty::Vote => ActionCategory::TeamVote,
        Duty::Play => ActionCategory::MissionPlay,
        Duty::Assassinate => ActionCategory::Assassination,
    }
}

/// Task line and response schema for a duty.
fn task_of(duty: Duty) -> (String, &'static str) {
    match duty {
        Duty::Propose { size } => (
            format!("Nominate a mission team of exactly {size} seats (you may include yourself)."),
            r#"{"action": "propose-team", "members": [<seat numbers>]}"#,
        ),
        Duty::Lock => (
            "Confirm the proposed team.".to_owned(),
            r#"{"action": "propose-team", "members": [<seat numbers>]}"#,
        ),
        Duty::Speak => (
            "It is your turn to speak. Say something useful to your side, or pass.".to_owned(),
            r#"{"action": "chat", "text": "<message>"} or {"action": "pass"}"#,
        ),
        Duty::Vote => (
            "Vote to approve or reject the proposed team.".to_owned(),
            r#"{"action": "vote", "vote": "approve" | "reject"}"#,
        ),
        Duty::Play => (
            "You are on the mission. Play success or fail.".to_owned(),
            r#"{"action": "mission", "play": "success" | "fail"}"#,
        ),
        Duty::Assassinate => (
            "Good has won three missions. Name the seat you believe is the seer.".to_owned(),
            r#"{"action": "assassinate", "target": <seat number>}"#,
        ),
    }
}
