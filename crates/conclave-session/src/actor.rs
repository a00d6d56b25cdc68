//! The session actor: single owner of canonical game state.
//!
//! All inputs, human actions and timer ticks alike, enter one mailbox and
//! apply strictly in arrival order. The select loop is biased toward the
//! tick timer so a phase countdown expiry always lands before any action
//! that raced it. After every applied transition the actor broadcasts a
//! per-viewer redacted hydrate to each sink and publishes the canonical
//! state on a watch channel for the agent pool task.

use std::time::Duration;

use conclave_agents::AgentPool;
use conclave_engine::{apply, redacted_for};
use conclave_types::{Disposition, GameInput, GameState, ServerMessage};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::sink::ActionSink;

/// Handle for feeding inputs to and observing a running session.
#[derive(Clone)]
pub struct SessionHandle {
    inputs: mpsc::UnboundedSender<GameInput>,
    states: watch::Receiver<GameState>,
}

impl SessionHandle {
    /// Submit an input to the mailbox. Returns false once the actor has
    /// stopped.
    pub fn submit(&self, input: GameInput) -> bool {
        self.inputs.send(input).is_ok()
    }

    /// A fresh subscription to canonical state updates.
    pub fn states(&self) -> watch::Receiver<GameState> {
        self.states.clone()
    }
}

/// The session actor. Owns the state; everything else holds a
/// [`SessionHandle`].
pub struct SessionActor {
    state: GameState,
    mailbox: mpsc::UnboundedReceiver<GameInput>,
    states: watch::Sender<GameState>,
    sinks: Vec<Box<dyn ActionSink>>,
    tick_interval: Duration,
}

impl SessionActor {
    /// Create an actor around an initial state and hand back its handle.
    pub fn new(state: GameState, tick_interval: Duration) -> (Self, SessionHandle) {
        let (inputs, mailbox) = mpsc::unbounded_channel();
        let (states, states_rx) = watch::channel(state.clone());
        let handle = SessionHandle {
            inputs,
            states: states_rx,
        };
        let actor = Self {
            state,
            mailbox,
            states,
            sinks: Vec::new(),
            tick_interval,
        };
        (actor, handle)
    }

    /// Register a sink and hydrate it immediately.
    pub fn attach_sink(&mut self, sink: Box<dyn ActionSink>) {
        sink.deliver(ServerMessage::Hydrate(Box::new(redacted_for(
            &self.state,
            sink.viewer(),
        ))));
        self.sinks.push(sink);
    }

    /// Run the session to its terminal phase and return the final state.
    pub async fn run(mut self) -> GameState {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first interval tick fires immediately; swallow it so the
        // opening countdown gets its full duration.
        ticker.tick().await;

        info!(
            session_id = %self.state.session_id,
            players = self.state.players.len(),
            "session actor running"
        );

        loop {
            let input = tokio::select! {
                biased;
                _ = ticker.tick() => GameInput::Tick,
                received = self.mailbox.recv() => match received {
                    Some(input) => input,
                    None => break,
                },
            };

            let report = apply(&mut self.state, &input);
            match report.disposition {
                Disposition::Applied => {
                    for event in &report.events {
                        debug!(event = ?event, tick = self.state.tick, "game event");
                    }
                    self.broadcast();
                }
                Disposition::Ignored(reason) => {
                    warn!(reason = ?reason, input = ?input, "input ignored");
                }
            }

            if self.state.phase.is_terminal() {
                break;
            }
        }

        info!(
            session_id = %self.state.session_id,
            outcome = ?self.state.outcome,
            tick = self.state.tick,
            "session actor finished"
        );
        self.state
    }

    /// Push the post-transition state to every observer.
    fn broadcast(&self) {
        for sink in &self.sinks {
            sink.deliver(ServerMessage::Hydrate(Box::new(redacted_for(
                &self.state,
                sink.viewer(),
            ))));
        }
        // Watch send only fails with no receivers; the pool task may have
        // exited already, which is fine.
        let _ = self.states.send(self.state.clone());
    }
}

/// Run the agent pool in its own task, feeding decisions back into the
/// actor's mailbox.
///
/// Inference latency never blocks the actor: the pool works from watch
/// snapshots, and its actions queue behind whatever else arrived first. The
/// task returns the pool at session end so the host can report usage.
pub fn spawn_agent_task(mut pool: AgentPool, handle: &SessionHandle) -> JoinHandle<AgentPool> {
    let mut states = handle.states();
    let handle = handle.clone();
    tokio::spawn(async move {
        loop {
            let state = states.borrow_and_update().clone();
            if state.phase.is_terminal() {
                break;
            }
            let actions = pool.decide_all(&state).await;
            if !actions.is_empty() {
                // Paced decisions can outlive their snapshot; re-check each
                // against the freshest state before it enters the mailbox.
                let current = states.borrow().clone();
                for action in pool.revalidate(&current, actions) {
                    if !handle.submit(GameInput::Action(action)) {
                        return pool;
                    }
                }
            }
            if states.changed().await.is_err() {
                break;
            }
        }
        pool
    })
}
