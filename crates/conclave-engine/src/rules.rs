//! Fixed rule tables for supported table sizes.
//!
//! Team sizes, fail thresholds, role rosters, and phase countdowns are all
//! table-driven and keyed by player count (5-10) and mission number (1-5).
//! Lookups return `Option` so a caller can never silently fall back to a
//! wrong default.

use conclave_types::{GamePhase, Role};

/// Smallest supported table.
pub const MIN_PLAYERS: u8 = 5;

/// Largest supported table.
pub const MAX_PLAYERS: u8 = 10;

/// Number of missions in a session.
pub const MISSION_COUNT: u8 = 5;

/// Missions one faction must resolve its way to win.
pub const MISSIONS_TO_WIN: usize = 3;

/// Consecutive proposal rejections for the same mission before evil wins
/// outright. Fixed house-rule cap; the standard published limit.
pub const MAX_CONSECUTIVE_REJECTIONS: u8 = 5;

/// Ticks granted to each speaking turn.
pub const SPEAKING_TURN_TICKS: u32 = 10;

/// Required team size per (player count, mission). Rows are player counts
/// 5 through 10; columns are missions 1 through 5.
const TEAM_SIZES: [[u8; 5]; 6] = [
    [2, 3, 2, 3, 3], // 5 players
    [2, 3, 4, 3, 4], // 6 players
    [2, 3, 3, 4, 4], // 7 players
    [3, 4, 4, 5, 5], // 8 players
    [3, 4, 4, 5, 5], // 9 players
    [3, 4, 4, 5, 5], // 10 players
];

/// Canonical role roster per player count.
///
/// Every roster seats exactly one assassin-capable role, the primary and
/// secondary seers, and the decoy. Larger tables add the hidden and isolated
/// evil roles.
const ROSTERS: [&[Role]; 6] = [
    // 5 players: 3 good / 2 evil
    &[
        Role::Merlin,
        Role::Percival,
        Role::LoyalServant,
        Role::Morgana,
        Role::Assassin,
    ],
    // 6 players: 4 good / 2 evil
    &[
        Role::Merlin,
        Role::Percival,
        Role::LoyalServant,
        Role::LoyalServant,
        Role::Morgana,
        Role::Assassin,
    ],
    // 7 players: 4 good / 3 evil
    &[
        Role::Merlin,
        Role::Percival,
        Role::LoyalServant,
        Role::LoyalServant,
        Role::Morgana,
        Role::Assassin,
        Role::Oberon,
    ],
    // 8 players: 5 good / 3 evil
    &[
        Role::Merlin,
        Role::Percival,
        Role::LoyalServant,
        Role::LoyalServant,
        Role::LoyalServant,
        Role::Morgana,
        Role::Assassin,
        Role::Minion,
    ],
    // 9 players: 6 good / 3 evil
    &[
        Role::Merlin,
        Role::Percival,
        Role::LoyalServant,
        Role::LoyalServant,
        Role::LoyalServant,
        Role::LoyalServant,
        Role::Morgana,
        Role::Assassin,
        Role::Mordred,
    ],
    // 10 players: 6 good / 4 evil
    &[
        Role::Merlin,
        Role::Percival,
        Role::LoyalServant,
        Role::LoyalServant,
        Role::LoyalServant,
        Role::LoyalServant,
        Role::Morgana,
        Role::Assassin,
        Role::Mordred,
        Role::Oberon,
    ],
];

/// Row index into the per-player-count tables.
const fn table_row(player_count: u8) -> Option<usize> {
    if player_count < MIN_PLAYERS || player_count > MAX_PLAYERS {
        return None;
    }
    Some((player_count as usize).saturating_sub(MIN_PLAYERS as usize))
}

/// Required team size for a mission, or `None` for unsupported inputs.
pub fn team_size(player_count: u8, mission_number: u8) -> Option<u8> {
    if mission_number < 1 || mission_number > MISSION_COUNT {
        return None;
    }
    let row = table_row(player_count)?;
    let col = (mission_number as usize).saturating_sub(1);
    TEAM_SIZES.get(row).and_then(|sizes| sizes.get(col)).copied()
}

/// Number of fail actions required to fail a mission.
///
/// One fail suffices everywhere except mission 4 at tables of 7 or more
/// players, which requires two.
pub fn fail_threshold(player_count: u8, mission_number: u8) -> Option<u8> {
    if mission_number < 1 || mission_number > MISSION_COUNT {
        return None;
    }
    table_row(player_count)?;
    if mission_number == 4 && player_count >= 7 {
        Some(2)
    } else {
        Some(1)
    }
}

/// The canonical role roster for a table size, or `None` when unsupported.
pub fn roster(player_count: u8) -> Option<&'static [Role]> {
    let row = table_row(player_count)?;
    ROSTERS.get(row).copied()
}

/// Ticks a phase runs before it forces a default resolution.
pub const fn phase_countdown(phase: GamePhase) -> u32 {
    match phase {
        GamePhase::RoleReveal => 10,
        GamePhase::TeamBuilding | GamePhase::Assassination => 60,
        GamePhase::TeamBuildingReview | GamePhase::Voting | GamePhase::Mission => 30,
        GamePhase::VotingReview | GamePhase::MissionReview => 15,
        GamePhase::Finished => 0,
    }
}
