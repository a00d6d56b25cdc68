//! Deterministic fallback decisions.
//!
//! When inference is unavailable, exhausted, or unparseable, a seat still
//! has to act. These heuristics are deliberately simple and legible: biased
//! coin flips keyed to alignment, first-fit teams, canned table talk. The
//! RNG is seeded per seat so a fallback-only game replays identically.

use conclave_types::{Alignment, GamePhase, GameState, MissionAction, Seat, Vote, VisibleSeat};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

/// Probability an evil seat plays fail on a mission.
const EVIL_FAIL_PROBABILITY: f64 = 0.8;

/// Probability a good seat approves a proposal with no red flags.
const GOOD_APPROVE_PROBABILITY: f64 = 0.8;

/// Canned lines a fallback seat can say, keyed loosely to phase.
const DISCUSSION_LINES: &[&str] = &[
    "I'm fine with this team.",
    "Something about the last vote bothers me.",
    "Let's think about who has been on every failed mission.",
    "I'll go along with the table on this one.",
    "No strong read yet, watching the votes.",
];

/// Seeded heuristic decision maker for one seat.
#[derive(Debug)]
pub struct Heuristics {
    rng: StdRng,
}

impl Heuristics {
    /// Create a heuristics source from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Pick a team of `size` seats: self first, then available seats in
    /// rotation order.
    pub fn propose_team(&mut self, view: &GameState, seat: Seat, size: u8) -> Vec<Seat> {
        let mut members = vec![seat];
        for candidate in view.available_seats() {
            if members.len() >= usize::from(size) {
                break;
            }
            if candidate != seat {
                members.push(candidate);
            }
        }
        members.truncate(usize::from(size));
        members
    }

    /// Vote on the locked proposal.
    ///
    /// Good approves unless the coin says otherwise; evil approves when a
    /// known teammate is on the team, otherwise flips an even coin.
    pub fn vote(
        &mut self,
        view: &GameState,
        alignment: Alignment,
        visible: &[VisibleSeat],
    ) -> Vote {
        let team: Vec<Seat> = view
            .proposal
            .as_ref()
            .map(|p| p.members.clone())
            .unwrap_or_default();

        let approve = match alignment {
            Alignment::Good => self.rng.random_bool(GOOD_APPROVE_PROBABILITY),
            Alignment::Evil => {
                let teammate_on_board = team
                    .iter()
                    .any(|member| visible.iter().any(|v| v.seat == *member));
                teammate_on_board || self.rng.random_bool(0.5)
            }
        };
        if approve { Vote::Approve } else { Vote::Reject }
    }

    /// Play a mission card. Good always succeeds; evil usually fails.
    pub fn mission_play(&mut self, alignment: Alignment) -> MissionAction {
        match alignment {
            Alignment::Good => MissionAction::Success,
            Alignment::Evil => {
                if self.rng.random_bool(EVIL_FAIL_PROBABILITY) {
                    MissionAction::Fail
                } else {
                    MissionAction::Success
                }
            }
        }
    }

    /// Flip the speak-or-pass coin for a speaking turn.
    pub fn wants_to_chat(&mut self, probability: f64) -> bool {
        self.rng.random_bool(probability.clamp(0.0, 1.0))
    }

    /// A canned line of table talk.
    pub fn chat_line(&mut self, _phase: GamePhase) -> String {
        DISCUSSION_LINES
            .choose(&mut self.rng)
            .copied()
            .unwrap_or("No comment.")
            .to_owned()
    }

    /// Pick an assassination target uniformly among seats that are not the
    /// assassin and not known teammates.
    pub fn assassination_target(
        &mut self,
        view: &GameState,
        assassin: Seat,
        visible: &[VisibleSeat],
    ) -> Seat {
        let candidates: Vec<Seat> = view
            .players
            .iter()
            .map(|p| p.seat)
            .filter(|s| *s != assassin && !visible.iter().any(|v| v.seat == *s))
            .collect();
        candidates
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(assassin)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use conclave_engine::{new_session, rules, SeatSetup};
    use conclave_types::{SeatPresence, SessionId};

    fn view() -> GameState {
        let setups: Vec<SeatSetup> = (0..5)
            .map(|index| SeatSetup {
                name: format!("P{index}"),
                presence: SeatPresence::Agent,
            })
            .collect();
        let roles = rules::roster(5).unwrap().to_vec();
        new_session(SessionId::new(), &setups, &roles).unwrap()
    }

    #[test]
    fn proposed_team_includes_self_and_has_the_right_size() {
        let mut heuristics = Heuristics::new(7);
        let team = heuristics.propose_team(&view(), Seat(2), 3);
        assert_eq!(team.len(), 3);
        assert_eq!(team.first(), Some(&Seat(2)));
        let mut sorted = team.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 3);
    }

    #[test]
    fn good_never_plays_fail() {
        let mut heuristics = Heuristics::new(11);
        for _ in 0..100 {
            assert_eq!(
                heuristics.mission_play(Alignment::Good),
                MissionAction::Success
            );
        }
    }

    #[test]
    fn evil_fails_often_but_not_always() {
        let mut heuristics = Heuristics::new(13);
        let fails = (0..200)
            .filter(|_| heuristics.mission_play(Alignment::Evil) == MissionAction::Fail)
            .count();
        assert!(fails > 100, "fails: {fails}");
        assert!(fails < 200, "fails: {fails}");
    }

    #[test]
    fn seeded_runs_replay_identically() {
        let state = view();
        let mut a = Heuristics::new(42);
        let mut b = Heuristics::new(42);
        for _ in 0..20 {
            assert_eq!(
                a.vote(&state, Alignment::Good, &[]),
                b.vote(&state, Alignment::Good, &[])
            );
        }
    }

    #[test]
    fn assassin_avoids_self_and_known_teammates() {
        let state = view();
        let mut heuristics = Heuristics::new(3);
        let visible = vec![conclave_types::VisibleSeat {
            seat: Seat(3),
            label: conclave_types::DisclosedLabel::FellowEvil,
            reason: conclave_types::VisibilityReason::EvilReveal,
        }];
        for _ in 0..50 {
            let target = heuristics.assassination_target(&state, Seat(4), &visible);
            assert_ne!(target, Seat(4));
            assert_ne!(target, Seat(3));
        }
    }
}
