//! Session host configuration, loaded from environment variables.

use std::time::Duration;

use rand::Rng;

use crate::error::SessionError;

/// Complete session host configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of seats at the table (5 to 10).
    pub seat_count: u8,
    /// Wall-clock interval between game ticks.
    pub tick_interval: Duration,
    /// Seed for role dealing and per-seat agent heuristics. Random when
    /// unset so repeated demo runs play different games.
    pub seed: u64,
}

impl SessionConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional variables:
    /// - `SESSION_SEAT_COUNT` -- number of seats (default 5)
    /// - `SESSION_TICK_INTERVAL_MS` -- tick interval in ms (default 250)
    /// - `SESSION_SEED` -- deal/heuristics seed (default: random)
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] when a value fails to parse or the
    /// seat count is outside the supported range.
    pub fn from_env() -> Result<Self, SessionError> {
        let seat_count: u8 = parse_env("SESSION_SEAT_COUNT", "5")?;
        if !(conclave_engine::rules::MIN_PLAYERS..=conclave_engine::rules::MAX_PLAYERS)
            .contains(&seat_count)
        {
            return Err(SessionError::Config(format!(
                "SESSION_SEAT_COUNT out of range: {seat_count}"
            )));
        }

        let tick_interval_ms: u64 = parse_env("SESSION_TICK_INTERVAL_MS", "250")?;
        let seed = match std::env::var("SESSION_SEED") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| SessionError::Config(format!("invalid SESSION_SEED: {e}")))?,
            Err(_) => rand::rng().random(),
        };

        Ok(Self {
            seat_count,
            tick_interval: Duration::from_millis(tick_interval_ms),
            seed,
        })
    }
}

/// Parse an optional environment variable with a default.
fn parse_env<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, SessionError>
where
    T::Err: std::fmt::Display,
{
    std::env::var(name)
        .unwrap_or_else(|_| default.to_owned())
        .parse()
        .map_err(|e| SessionError::Config(format!("invalid {name}: {e}")))
}
