//! Seat color invariant.

use super::Invariant;
use crate::record::Match;

/// Invariant: the two seats hold distinct ids and complementary colors.
pub struct SeatColorsInvariant;

impl Invariant<Match> for SeatColorsInvariant {
    fn holds(game: &Match) -> bool {
        game.player1_color.opponent() == game.player2_color
            && game.player2_id.as_deref() != Some(game.player1_id.as_str())
    }

    fn description() -> &'static str {
        "Seats have distinct ids and complementary colors"
    }
}
