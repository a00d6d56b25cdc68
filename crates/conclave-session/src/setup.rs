//! Table setup: seat creation, role dealing, agent pool wiring.

use conclave_agents::{AgentPool, AgentsConfig};
use conclave_engine::{new_session, rules, visible_seats_for, SeatSetup};
use conclave_types::{GameState, Role, SeatPresence, SessionId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::config::SessionConfig;
use crate::error::SessionError;

/// Names assigned to demo seats, in seat order.
const SEAT_NAMES: &[&str] = &[
    "Aster", "Briar", "Corvin", "Dahlia", "Edmund", "Fenna", "Gareth", "Halia", "Ivo", "Juniper",
];

/// Create a fresh session with the standard roster for the configured seat
/// count, dealt with the configured seed.
pub fn dealt_session(config: &SessionConfig) -> Result<GameState, SessionError> {
    let setups: Vec<SeatSetup> = (0..config.seat_count)
        .map(|index| SeatSetup {
            name: SEAT_NAMES
                .get(usize::from(index))
                .map_or_else(|| format!("Seat {index}"), |&name| name.to_owned()),
            presence: SeatPresence::Agent,
        })
        .collect();

    let mut roles: Vec<Role> = rules::roster(config.seat_count)
        .ok_or_else(|| {
            SessionError::Config(format!(
                "no roster for {} players",
                config.seat_count
            ))
        })?
        .to_vec();
    let mut rng = StdRng::seed_from_u64(config.seed);
    roles.shuffle(&mut rng);

    Ok(new_session(SessionId::new(), &setups, &roles)?)
}

/// Build the agent pool and adopt every seat in the session.
///
/// Model endpoints come from the environment; when none are configured the
/// pool runs heuristics-only and the session still plays to completion.
pub fn pool_for(state: &GameState, config: &SessionConfig) -> Result<AgentPool, SessionError> {
    let mut pool = match AgentsConfig::from_env() {
        Ok(agents_config) => {
            info!(models = agents_config.models.len(), "model-backed agent pool");
            AgentPool::new(&agents_config)?
        }
        Err(error) => {
            info!(reason = %error, "no model credentials, falling back to heuristics-only agents");
            AgentPool::without_models(3, 0.6)?
        }
    };

    let roles: Vec<Role> = state.players.iter().filter_map(|p| p.role).collect();
    for player in &state.players {
        let Some(role) = player.role else {
            return Err(SessionError::Config(format!(
                "seat {} has no dealt role",
                player.seat
            )));
        };
        pool.adopt_seat(
            player.seat,
            role,
            player.name.clone(),
            visible_seats_for(player.seat, &roles),
            config.seed.wrapping_add(u64::from(player.seat.0)),
        );
    }
    Ok(pool)
}
