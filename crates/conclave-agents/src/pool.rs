//! The agent pool: one decision engine per agent-driven seat.
//!
//! The pool owns the shared model clients and the prompt engine, assigns a
//! model to each adopted seat, and fans one state update out to every engine
//! concurrently. Each engine receives the same redacted view its seat would
//! get as a human client; the pool never sees another seat's secrets on an
//! engine's behalf.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use conclave_types::{GameAction, GameState, Role, Seat, VisibleSeat};
use rand::Rng;
use tracing::info;

use crate::client::InferenceClient;
use crate::config::{AgentsConfig, ModelDistribution};
use crate::decision::DecisionEngine;
use crate::error::AgentError;
use crate::prompt::PromptEngine;
use crate::usage::UsageTotals;

/// Coordinates the decision engines of all agent-driven seats at one table.
pub struct AgentPool {
    clients: Vec<Arc<InferenceClient>>,
    /// Relative draw weights, parallel to `clients`.
    weights: Vec<u32>,
    prompts: Arc<PromptEngine>,
    engines: BTreeMap<Seat, DecisionEngine>,
    distribution: ModelDistribution,
    next_model: usize,
    max_errors: u32,
    chat_probability: f64,
    response_delay: Duration,
}

impl AgentPool {
    /// Build a pool with one shared client per configured model.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Template`] if the embedded prompt templates
    /// fail to compile.
    pub fn new(config: &AgentsConfig) -> Result<Self, AgentError> {
        let clients = config
            .models
            .iter()
            .map(|model| {
                Arc::new(InferenceClient::new(
                    model,
                    config.max_retries,
                    config.retry_base,
                ))
            })
            .collect();
        let weights = config.models.iter().map(|model| model.weight).collect();
        Ok(Self {
            clients,
            weights,
            prompts: Arc::new(PromptEngine::new()?),
            engines: BTreeMap::new(),
            distribution: config.distribution,
            next_model: 0,
            max_errors: config.max_errors,
            chat_probability: config.chat_probability,
            response_delay: config.response_delay,
        })
    }

    /// Build a heuristics-only pool: no models, every seat plays its
    /// fallback strategy. Used when no credentials are configured and in
    /// deterministic self-play tests.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Template`] if the embedded prompt templates
    /// fail to compile.
    pub fn without_models(max_errors: u32, chat_probability: f64) -> Result<Self, AgentError> {
        Ok(Self {
            clients: Vec::new(),
            weights: Vec::new(),
            prompts: Arc::new(PromptEngine::new()?),
            engines: BTreeMap::new(),
            distribution: ModelDistribution::RoundRobin,
            next_model: 0,
            max_errors,
            chat_probability,
            response_delay: Duration::ZERO,
        })
    }

    /// Adopt a seat: create its engine with the role and visibility set it
    /// was dealt. Visibility is computed once, here, and never again.
    pub fn adopt_seat(
        &mut self,
        seat: Seat,
        role: Role,
        name: String,
        visible: Vec<VisibleSeat>,
        seed: u64,
    ) {
        let client = self.pick_client();
        let model = client.as_ref().map_or("heuristics", |c| c.model());
        info!(seat = %seat, model, "agent adopted seat");
        let engine = DecisionEngine::new(
            seat,
            role,
            name,
            visible,
            client,
            Arc::clone(&self.prompts),
            seed,
            self.max_errors,
            self.chat_probability,
            self.response_delay,
        );
        self.engines.insert(seat, engine);
    }

    /// Release a seat back to a human. The engine is dropped; everything it
    /// already spent stays in the usage log.
    pub fn release_seat(&mut self, seat: Seat) -> bool {
        let released = self.engines.remove(&seat).is_some();
        if released {
            info!(seat = %seat, "agent released seat");
        }
        released
    }

    /// Whether the pool currently drives this seat.
    pub fn drives(&self, seat: Seat) -> bool {
        self.engines.contains_key(&seat)
    }

    /// Seats currently driven by the pool, in seat order.
    pub fn seats(&self) -> Vec<Seat> {
        self.engines.keys().copied().collect()
    }

    /// Fan a state update out to every engine concurrently and collect the
    /// actions of the seats that had a pending duty.
    ///
    /// Each engine gets the redacted view of its own seat. Engines that
    /// already acted on this decision instance stay silent.
    pub async fn decide_all(&mut self, state: &GameState) -> Vec<GameAction> {
        let futures: Vec<_> = self
            .engines
            .values_mut()
            .map(|engine| {
                let view = conclave_engine::redacted_for(state, Some(engine.seat()));
                async move { engine.decide(&view).await }
            })
            .collect();
        futures::future::join_all(futures)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Drop actions whose seats no longer hold the duty they answered.
    ///
    /// The pacing delay means decisions can outlive the snapshot they were
    /// made against; each action is re-checked against its seat's current
    /// redacted view before it is submitted.
    pub fn revalidate(&self, state: &GameState, actions: Vec<GameAction>) -> Vec<GameAction> {
        actions
            .into_iter()
            .filter(|action| {
                self.engines.get(&action.acting_seat()).is_some_and(|engine| {
                    let view = conclave_engine::redacted_for(state, Some(engine.seat()));
                    engine.answers_pending_duty(&view, action)
                })
            })
            .collect()
    }

    /// Lifetime usage per model endpoint, in configuration order.
    pub fn usage_by_model(&self) -> Vec<(String, UsageTotals)> {
        self.clients
            .iter()
            .map(|client| (client.model().to_owned(), client.usage_totals()))
            .collect()
    }

    /// Lifetime usage totals across all model clients.
    pub fn usage_totals(&self) -> UsageTotals {
        let mut totals = UsageTotals::default();
        for client in &self.clients {
            let t = client.usage_totals();
            totals.calls = totals.calls.saturating_add(t.calls);
            totals.prompt_tokens = totals.prompt_tokens.saturating_add(t.prompt_tokens);
            totals.completion_tokens = totals
                .completion_tokens
                .saturating_add(t.completion_tokens);
            totals.cost = totals.cost.checked_add(t.cost).unwrap_or(totals.cost);
        }
        totals
    }

    /// Pick the model client for a newly adopted seat.
    fn pick_client(&mut self) -> Option<Arc<InferenceClient>> {
        if self.clients.is_empty() {
            return None;
        }
        let index = match self.distribution {
            ModelDistribution::RoundRobin => {
                let index = self.next_model.checked_rem(self.clients.len()).unwrap_or(0);
                self.next_model = self.next_model.wrapping_add(1);
                index
            }
            ModelDistribution::Random => rand::rng().random_range(0..self.clients.len()),
            ModelDistribution::Weighted => self.weighted_index(),
        };
        self.clients.get(index).map(Arc::clone)
    }

    /// Draw a model index in proportion to the configured weights.
    ///
    /// Zero-weight models are never drawn; an all-zero table falls back to
    /// the first model.
    fn weighted_index(&self) -> usize {
        let total: u64 = self.weights.iter().map(|w| u64::from(*w)).sum();
        if total == 0 {
            return 0;
        }
        let mut draw = rand::rng().random_range(0..total);
        for (index, weight) in self.weights.iter().enumerate() {
            let weight = u64::from(*weight);
            if draw < weight {
                return index;
            }
            draw = draw.saturating_sub(weight);
        }
        0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use conclave_engine::{apply, new_session, rules, visible_seats_for, SeatSetup};
    use conclave_types::{GameInput, GamePhase, SeatPresence, SessionId};

    fn table() -> GameState {
        let setups: Vec<SeatSetup> = (0..5)
            .map(|index| SeatSetup {
                name: format!("P{index}"),
                presence: SeatPresence::Agent,
            })
            .collect();
        let roles = rules::roster(5).unwrap().to_vec();
        let mut state = new_session(SessionId::new(), &setups, &roles).unwrap();
        while state.phase == GamePhase::RoleReveal {
            apply(&mut state, &GameInput::Tick);
        }
        state
    }

    fn full_pool(state: &GameState) -> AgentPool {
        let mut pool = AgentPool::without_models(3, 1.0).unwrap();
        let roles: Vec<Role> = state.players.iter().filter_map(|p| p.role).collect();
        for player in &state.players {
            let role = player.role.unwrap();
            pool.adopt_seat(
                player.seat,
                role,
                player.name.clone(),
                visible_seats_for(player.seat, &roles),
                u64::from(player.seat.0),
            );
        }
        pool
    }

    #[tokio::test]
    async fn only_duty_holders_act() {
        let state = table();
        let mut pool = full_pool(&state);

        // In team-building only the leader has a duty (seat 0 also holds the
        // speaking turn, but proposing takes priority).
        let actions = pool.decide_all(&state).await;
        assert_eq!(actions.len(), 1);
        assert!(matches!(
            actions.first(),
            Some(GameAction::ProposeTeam { seat, .. }) if *seat == Seat(0)
        ));
    }

    #[tokio::test]
    async fn unchanged_state_produces_no_repeat_actions() {
        let state = table();
        let mut pool = full_pool(&state);

        let first = pool.decide_all(&state).await;
        assert!(!first.is_empty());
        let second = pool.decide_all(&state).await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn released_seats_stop_acting() {
        let state = table();
        let mut pool = full_pool(&state);

        assert!(pool.drives(Seat(0)));
        assert!(pool.release_seat(Seat(0)));
        assert!(!pool.drives(Seat(0)));
        assert!(!pool.release_seat(Seat(0)));

        let actions = pool.decide_all(&state).await;
        assert!(actions.is_empty());
        assert_eq!(pool.seats(), vec![Seat(1), Seat(2), Seat(3), Seat(4)]);
    }

    #[tokio::test]
    async fn voting_fans_out_to_every_eligible_seat() {
        let mut state = table();
        let mut pool = full_pool(&state);

        // Drive the table into voting through the pool itself.
        for _ in 0..64 {
            if state.phase == GamePhase::Voting {
                break;
            }
            for action in pool.decide_all(&state).await {
                apply(&mut state, &GameInput::Action(action));
            }
            apply(&mut state, &GameInput::Tick);
        }
        assert_eq!(state.phase, GamePhase::Voting);

        let votes = pool.decide_all(&state).await;
        assert_eq!(votes.len(), 5);
        assert!(votes
            .iter()
            .all(|a| matches!(a, GameAction::CastProposalVote { .. })));
    }

    #[tokio::test]
    async fn heuristics_only_pool_reports_zero_usage() {
        let state = table();
        let mut pool = full_pool(&state);
        pool.decide_all(&state).await;
        assert_eq!(pool.usage_totals(), UsageTotals::default());
    }

    #[tokio::test]
    async fn stale_decisions_are_dropped_on_revalidation() {
        let state = table();
        let mut pool = full_pool(&state);

        // The leader's proposal, decided against this snapshot.
        let actions = pool.decide_all(&state).await;
        assert_eq!(actions.len(), 1);
        assert_eq!(pool.revalidate(&state, actions.clone()).len(), 1);

        // The table moved on while the decision was held back: the proposal
        // landed and was locked, so proposing no longer answers any duty.
        let mut moved = state.clone();
        let proposal = actions.first().unwrap().clone();
        assert!(apply(&mut moved, &GameInput::Action(proposal)).is_applied());
        assert!(apply(
            &mut moved,
            &GameInput::Action(GameAction::FinishTeamBuilding { seat: Seat(0) })
        )
        .is_applied());
        assert!(pool.revalidate(&moved, actions).is_empty());
    }

    #[tokio::test]
    async fn usage_is_reported_per_model() {
        use crate::client::{CallContext, Completion};
        use crate::limiter::RateLimits;
        use crate::prompt::RenderedPrompt;
        use conclave_types::ActionCategory;

        let limits = RateLimits {
            requests_per_minute: 100,
            tokens_per_minute: 1_000_000,
            requests_per_day: 10_000,
        };
        let alpha = Arc::new(InferenceClient::scripted(
            "alpha",
            vec![Ok(Completion {
                text: "{}".to_owned(),
                prompt_tokens: 100,
                completion_tokens: 20,
            })],
            1,
            limits,
        ));
        let beta = Arc::new(InferenceClient::scripted("beta", Vec::new(), 1, limits));

        // One completed call lands on alpha only.
        let rendered = RenderedPrompt {
            system: "system".to_owned(),
            user: "user".to_owned(),
        };
        let call = CallContext {
            seat: Seat(0),
            role: Role::Merlin,
            category: ActionCategory::Chat,
        };
        alpha.complete(&rendered, call).await.unwrap();

        let pool = AgentPool {
            clients: vec![alpha, beta],
            weights: vec![1, 1],
            prompts: Arc::new(PromptEngine::new().unwrap()),
            engines: BTreeMap::new(),
            distribution: ModelDistribution::RoundRobin,
            next_model: 0,
            max_errors: 3,
            chat_probability: 1.0,
            response_delay: Duration::ZERO,
        };

        let by_model = pool.usage_by_model();
        assert_eq!(by_model.len(), 2);
        assert!(by_model
            .iter()
            .any(|(model, totals)| model == "alpha" && totals.calls == 1));
        assert!(by_model
            .iter()
            .any(|(model, totals)| model == "beta" && totals.calls == 0));
        // The session-wide merge agrees with the breakdown.
        assert_eq!(pool.usage_totals().calls, 1);
        assert_eq!(pool.usage_totals().prompt_tokens, 100);
    }
}
