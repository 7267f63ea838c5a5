//! Phase consistency invariant.

use super::Invariant;
use crate::record::{Match, Phase};
use crate::rules::is_winning_path;

/// Invariant: the record's fields agree with its phase.
///
/// Waiting records have no second seat and no stones. Playing records have
/// both seats and no winner. Won records name a winner whose chain is a
/// valid connection on the board.
pub struct PhaseConsistentInvariant;

impl Invariant<Match> for PhaseConsistentInvariant {
    fn holds(game: &Match) -> bool {
        match game.phase {
            Phase::Waiting => {
                game.player2_id.is_none()
                    && game.board.is_blank()
                    && game.winner.is_none()
                    && game.winning_path.is_empty()
            }
            Phase::Playing => {
                game.player2_id.is_some() && game.winner.is_none() && game.winning_path.is_empty()
            }
            Phase::Won => match game.winner {
                Some(color) => {
                    game.player2_id.is_some() && is_winning_path(&game.board, color, &game.winning_path)
                }
                None => false,
            },
        }
    }

    fn description() -> &'static str {
        "Seats, winner and winning path agree with the lifecycle phase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Color;
    use crate::match_id::MatchId;
    use chrono::Utc;

    #[test]
    fn test_won_without_path_violates() {
        let mut game = Match::new(MatchId::parse("PHA001").unwrap(), "a".into(), Color::Blue, Utc::now());
        game.join("b", Utc::now()).unwrap();
        game.phase = Phase::Won;
        game.winner = Some(Color::Blue);
        assert!(!PhaseConsistentInvariant::holds(&game));
    }

    #[test]
    fn test_waiting_with_opponent_violates() {
        let mut game = Match::new(MatchId::parse("PHA001").unwrap(), "a".into(), Color::Blue, Utc::now());
        game.player2_id = Some("b".into());
        assert!(!PhaseConsistentInvariant::holds(&game));
    }
}
