//! Core domain types for the hex board.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

/// Side length of the rhombus board.
pub const BOARD_SIZE: usize = 11;

/// One of the two competing sides.
///
/// Blue always moves first and connects the top row to the bottom row.
/// Red connects the left column to the right column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum Color {
    /// First mover.
    Blue,
    /// Second mover.
    Red,
}

impl Color {
    /// The color that opens every match.
    pub const FIRST: Color = Color::Blue;

    /// Returns the opposing color.
    pub fn opponent(self) -> Self {
        match self {
            Color::Blue => Color::Red,
            Color::Red => Color::Blue,
        }
    }
}

impl From<Color> for u8 {
    fn from(color: Color) -> Self {
        match color {
            Color::Blue => 1,
            Color::Red => 2,
        }
    }
}

impl TryFrom<u8> for Color {
    type Error = InvalidCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Color::Blue),
            2 => Ok(Color::Red),
            other => Err(InvalidCode(other)),
        }
    }
}

/// A wire code that does not name a cell or color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, derive_more::Error)]
#[display("invalid cell code {}", _0)]
pub struct InvalidCode(#[error(not(source))] pub u8);

/// A cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Cell {
    /// Nobody has played here.
    #[default]
    Empty,
    /// Occupied by a stone.
    Stone(Color),
}

impl Cell {
    /// Returns the stone color, if any.
    pub fn color(self) -> Option<Color> {
        match self {
            Cell::Empty => None,
            Cell::Stone(color) => Some(color),
        }
    }
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => 0,
            Cell::Stone(color) => color.into(),
        }
    }
}

impl TryFrom<u8> for Cell {
    type Error = InvalidCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Cell::Empty),
            other => Color::try_from(other).map(Cell::Stone),
        }
    }
}

/// A (row, col) coordinate, 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display("({row}, {col})")]
pub struct Position {
    /// Row index.
    pub row: usize,
    /// Column index.
    pub col: usize,
}

impl Position {
    /// Creates a position without bounds checking.
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Builds a position from untrusted signed coordinates.
    ///
    /// Returns `None` when either coordinate falls outside `[0, BOARD_SIZE)`.
    pub fn from_signed(row: i64, col: i64) -> Option<Self> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        let pos = Self { row, col };
        pos.in_bounds().then_some(pos)
    }

    /// Whether the position lies on the board.
    pub fn in_bounds(&self) -> bool {
        self.row < BOARD_SIZE && self.col < BOARD_SIZE
    }

    /// Iterates every board position in row-major order.
    pub fn all() -> impl Iterator<Item = Position> {
        (0..BOARD_SIZE).flat_map(|row| (0..BOARD_SIZE).map(move |col| Position { row, col }))
    }
}

/// The 11x11 board. Dimensions are fixed by the type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// Creates a board with every cell empty.
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Empty; BOARD_SIZE]; BOARD_SIZE],
        }
    }

    /// Gets the cell at `pos`, or `None` off the board.
    pub fn get(&self, pos: Position) -> Option<Cell> {
        self.cells.get(pos.row)?.get(pos.col).copied()
    }

    /// Checks if a cell is on the board and empty.
    pub fn is_empty(&self, pos: Position) -> bool {
        matches!(self.get(pos), Some(Cell::Empty))
    }

    /// Whether the cell at `pos` holds a stone of `color`.
    pub fn is_color(&self, pos: Position, color: Color) -> bool {
        self.get(pos) == Some(Cell::Stone(color))
    }

    /// Places a stone. Callers validate bounds and emptiness first.
    pub(crate) fn set(&mut self, pos: Position, color: Color) {
        self.cells[pos.row][pos.col] = Cell::Stone(color);
    }

    /// Number of stones of the given color.
    pub fn stone_count(&self, color: Color) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| **cell == Cell::Stone(color))
            .count()
    }

    /// Whether no stone has been placed yet.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().flatten().all(|cell| *cell == Cell::Empty)
    }

    /// Rows of cells, top to bottom.
    pub fn rows(&self) -> &[[Cell; BOARD_SIZE]; BOARD_SIZE] {
        &self.cells
    }

    /// Formats the board as a skewed text rhombus.
    ///
    /// Each row is indented one step further than the previous one so the
    /// hex adjacency reads naturally: `.` empty, `B` blue, `R` red.
    pub fn display(&self) -> String {
        let mut result = String::from("   ");
        for col in 0..BOARD_SIZE {
            result.push_str(&format!("{:<2}", (b'a' + col as u8) as char));
        }
        result.push('\n');
        for (row, cells) in self.cells.iter().enumerate() {
            result.push_str(&" ".repeat(row));
            result.push_str(&format!("{:>2} ", row));
            for cell in cells {
                let symbol = match cell {
                    Cell::Empty => '.',
                    Cell::Stone(Color::Blue) => 'B',
                    Cell::Stone(Color::Red) => 'R',
                };
                result.push(symbol);
                result.push(' ');
            }
            result.push('\n');
        }
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds an empty board.
pub fn create_empty_board() -> Board {
    Board::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_board_is_blank() {
        let board = create_empty_board();
        assert!(board.is_blank());
        assert!(Position::all().all(|pos| board.is_empty(pos)));
        assert_eq!(Position::all().count(), BOARD_SIZE * BOARD_SIZE);
    }

    #[test]
    fn test_cells_serialize_as_codes() {
        let mut board = Board::new();
        board.set(Position::new(0, 1), Color::Blue);
        board.set(Position::new(0, 2), Color::Red);

        let json = serde_json::to_value(&board).unwrap();
        assert_eq!(json[0][0], 0);
        assert_eq!(json[0][1], 1);
        assert_eq!(json[0][2], 2);

        let back: Board = serde_json::from_value(json).unwrap();
        assert_eq!(back, board);
    }

    #[test]
    fn test_bad_code_rejected() {
        assert!(serde_json::from_str::<Cell>("3").is_err());
        assert!(serde_json::from_str::<Color>("0").is_err());
    }

    #[test]
    fn test_wrong_dimensions_rejected() {
        let short = serde_json::json!([[0, 0, 0]]);
        assert!(serde_json::from_value::<Board>(short).is_err());
    }

    #[test]
    fn test_from_signed_bounds() {
        assert_eq!(Position::from_signed(0, 0), Some(Position::new(0, 0)));
        assert_eq!(Position::from_signed(10, 10), Some(Position::new(10, 10)));
        assert_eq!(Position::from_signed(-1, 0), None);
        assert_eq!(Position::from_signed(0, 11), None);
    }

    #[test]
    fn test_get_off_board() {
        let board = Board::new();
        assert_eq!(board.get(Position::new(11, 0)), None);
        assert!(!board.is_empty(Position::new(0, 11)));
    }
}
