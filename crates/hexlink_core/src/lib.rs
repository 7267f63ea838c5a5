//! Hexlink core - board, rules and match record for the hex connection game
//!
//! This crate holds everything both ends of an online match agree on: the
//! board and its neighbor topology, edge ownership, win detection, the
//! authoritative match record, and the realtime/REST wire types.
//!
//! # Architecture
//!
//! - **Board**: fixed 11×11 rhombus grid of cells
//! - **Edges**: per-color start/goal boundaries from a fixed border table
//! - **Rules**: breadth-first win detection
//! - **Record**: the online match state machine (`Waiting → Playing → Won`)
//! - **Protocol**: tagged realtime frames and REST bodies
//!
//! # Example
//!
//! ```
//! use hexlink_core::{Color, LocalGame, Position};
//!
//! let mut game = LocalGame::new();
//! game.play(Position::new(0, 0)).unwrap();
//! assert_eq!(game.current(), Color::Red);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod action;
mod board;
mod edges;
mod game;
mod match_id;
mod record;

pub mod invariants;
pub mod protocol;
pub mod rules;

// Crate-level exports - Board
pub use board::{BOARD_SIZE, Board, Cell, Color, InvalidCode, Position, create_empty_board};

// Crate-level exports - Edge ownership
pub use edges::{
    BorderSegment, Edge, HexSide, NEIGHBOR_OFFSETS, are_adjacent, border_segments, neighbors, touches,
    touches_goal, touches_start,
};

// Crate-level exports - Rules and local play
pub use action::{Move, MoveError};
pub use game::{LocalGame, Placement, place_stone};
pub use rules::{check_win, is_winning_path};

// Crate-level exports - Online match record
pub use match_id::{MATCH_ID_ALPHABET, MATCH_ID_LEN, MatchId, MatchIdError};
pub use record::{ErrorKind, Match, Phase, PlayerId, PlayerView, Rejection};
