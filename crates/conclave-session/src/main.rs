//! Session host binary for Conclave.
//!
//! Runs one complete table end to end: deals a session, adopts every seat
//! into the agent pool (model-backed when credentials are configured,
//! heuristics-only otherwise), and drives the actor until the game
//! finishes. Logs the outcome and the inference usage summary.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load session configuration from environment variables
//! 3. Deal a session with the standard roster
//! 4. Build the agent pool and adopt every seat
//! 5. Spawn the agent pool task and run the session actor
//! 6. Log the outcome and usage totals

use conclave_session::{dealt_session, pool_for, spawn_agent_task, SessionActor, SessionConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application entry point for the session host.
///
/// # Errors
///
/// Returns an error if configuration or session setup fails. Inference
/// failures never abort a running session; they degrade seats to
/// heuristics.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("conclave-session starting");

    // 2. Load configuration.
    let config = SessionConfig::from_env()?;
    info!(
        seat_count = config.seat_count,
        tick_interval_ms = config.tick_interval.as_millis(),
        seed = config.seed,
        "configuration loaded"
    );

    // 3. Deal the session.
    let state = dealt_session(&config)?;
    info!(
        session_id = %state.session_id,
        players = state.players.len(),
        "session dealt"
    );

    // 4. Build the agent pool.
    let pool = pool_for(&state, &config)?;

    // 5. Run.
    let (actor, handle) = SessionActor::new(state, config.tick_interval);
    let agents = spawn_agent_task(pool, &handle);
    let final_state = actor.run().await;

    // 6. Report.
    let Some(outcome) = final_state.outcome.as_ref() else {
        anyhow::bail!("session finished without an outcome");
    };
    info!(
        winner = ?outcome.winner,
        successes = final_state.successes(),
        failures = final_state.failures(),
        assassination = ?outcome.assassination,
        total_ticks = final_state.tick,
        "session complete"
    );

    match agents.await {
        Ok(pool) => {
            for (model, totals) in pool.usage_by_model() {
                info!(
                    model = %model,
                    calls = totals.calls,
                    prompt_tokens = totals.prompt_tokens,
                    completion_tokens = totals.completion_tokens,
                    cost = %totals.cost,
                    "model usage"
                );
            }
            let totals = pool.usage_totals();
            info!(
                calls = totals.calls,
                prompt_tokens = totals.prompt_tokens,
                completion_tokens = totals.completion_tokens,
                cost = %totals.cost,
                "inference usage"
            );
        }
        Err(error) => {
            tracing::warn!(error = %error, "agent task did not shut down cleanly");
        }
    }

    info!("conclave-session shutdown complete");
    Ok(())
}
