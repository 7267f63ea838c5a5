//! Stone balance invariant: Blue opens, colors alternate.

use super::Invariant;
use crate::board::Color;
use crate::record::{Match, Phase};

/// Invariant: stone counts match strict alternation from Blue.
///
/// Blue has as many stones as Red, or exactly one more. Outside the won
/// phase the color to move is Blue iff the counts are equal; once won the
/// color to move is frozen on the winner, who placed the last stone.
pub struct StoneBalanceInvariant;

impl Invariant<Match> for StoneBalanceInvariant {
    fn holds(game: &Match) -> bool {
        let blue = game.board.stone_count(Color::Blue);
        let red = game.board.stone_count(Color::Red);
        if blue != red && blue != red + 1 {
            return false;
        }

        let last_mover = if blue == red { Color::Red } else { Color::Blue };
        match game.phase {
            Phase::Won => {
                game.winner == Some(game.current_player) && last_mover == game.current_player
            }
            Phase::Waiting | Phase::Playing => {
                let expected = if blue == red { Color::Blue } else { Color::Red };
                game.current_player == expected
            }
        }
    }

    fn description() -> &'static str {
        "Colors alternate from Blue and the color to move matches the stone counts"
    }
}
