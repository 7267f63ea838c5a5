//! Game rules for the hex board.
//!
//! Pure functions over an immutable board. Rules are separated from match
//! bookkeeping so both the server authority and the local engine share them.

pub mod win;

pub use win::{check_win, is_winning_path};
