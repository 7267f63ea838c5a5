//! Board topology: neighbor offsets and edge ownership.
//!
//! The board is a rhombus of hexagons laid out on a skewed grid. Every
//! perimeter hexagon paints some of its sides in the color that owns that
//! edge. The painted-side table below is the single source of truth for
//! corner ownership; the win detector derives boundary membership from it
//! so that what the player sees on the border is exactly what counts.

use crate::board::{BOARD_SIZE, Color, Position};
use strum::EnumIter;

/// Offsets of the six neighbors on the skewed grid.
pub const NEIGHBOR_OFFSETS: [(isize, isize); 6] = [(-1, 0), (-1, 1), (0, 1), (1, 0), (1, -1), (0, -1)];

/// Returns the in-bounds neighbors of `pos`, in a fixed order.
pub fn neighbors(pos: Position) -> impl Iterator<Item = Position> {
    NEIGHBOR_OFFSETS.iter().filter_map(move |(dr, dc)| {
        let row = pos.row.checked_add_signed(*dr)?;
        let col = pos.col.checked_add_signed(*dc)?;
        let next = Position::new(row, col);
        next.in_bounds().then_some(next)
    })
}

/// Whether two positions are adjacent on the board.
pub fn are_adjacent(a: Position, b: Position) -> bool {
    neighbors(a).any(|n| n == b)
}

/// A side of a pointy-top hexagon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum HexSide {
    /// Upper-left side when the hexagon is viewed in the rhombus.
    Top,
    /// Upper-right side.
    TopRight,
    /// Lower-right side.
    BottomRight,
    /// Lower side.
    Bottom,
    /// Lower-left side.
    BottomLeft,
    /// Left side.
    TopLeft,
}

/// One painted border side of a perimeter cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BorderSegment {
    /// Which side of the hexagon.
    pub side: HexSide,
    /// The color that owns the side.
    pub color: Color,
}

/// Painted border sides for the cell at `pos`, duplicates removed.
///
/// Interior cells return an empty list.
pub fn border_segments(pos: Position) -> Vec<BorderSegment> {
    let last = BOARD_SIZE - 1;
    let top = pos.row == 0;
    let bottom = pos.row == last;
    let left = pos.col == 0;
    let right = pos.col == last;

    let mut segments: Vec<BorderSegment> = Vec::new();
    let mut add = |side: HexSide, color: Color| {
        let segment = BorderSegment { side, color };
        if !segments.contains(&segment) {
            segments.push(segment);
        }
    };

    if top {
        add(HexSide::Top, if left { Color::Red } else { Color::Blue });
        add(HexSide::TopRight, Color::Blue);
    }
    if right {
        add(HexSide::BottomRight, Color::Red);
        if !bottom {
            add(HexSide::Bottom, Color::Red);
        }
    }
    if bottom {
        add(HexSide::Bottom, if right { Color::Red } else { Color::Blue });
        add(HexSide::BottomLeft, Color::Blue);
    }
    if left {
        add(HexSide::TopLeft, Color::Red);
        if !top {
            add(HexSide::Top, Color::Red);
        }
    }

    segments
}

/// A named board edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Edge {
    /// Row 0.
    Top,
    /// Last row.
    Bottom,
    /// Column 0.
    Left,
    /// Last column.
    Right,
}

impl Edge {
    /// Whether `pos` lies on this edge.
    pub fn contains(self, pos: Position) -> bool {
        let last = BOARD_SIZE - 1;
        match self {
            Edge::Top => pos.row == 0,
            Edge::Bottom => pos.row == last,
            Edge::Left => pos.col == 0,
            Edge::Right => pos.col == last,
        }
    }
}

impl Color {
    /// Edge this color starts from.
    pub fn start_edge(self) -> Edge {
        match self {
            Color::Blue => Edge::Top,
            Color::Red => Edge::Left,
        }
    }

    /// Edge this color must reach.
    pub fn goal_edge(self) -> Edge {
        match self {
            Color::Blue => Edge::Bottom,
            Color::Red => Edge::Right,
        }
    }
}

/// Whether `pos` carries a painted side of `color` on the given edge.
///
/// Corner cells sit on two edges and carry both colors, so they count for
/// either owner of either edge they touch.
pub fn touches(pos: Position, color: Color, edge: Edge) -> bool {
    edge.contains(pos)
        && border_segments(pos)
            .iter()
            .any(|segment| segment.color == color)
}

/// Whether `pos` touches the start edge of `color`.
pub fn touches_start(pos: Position, color: Color) -> bool {
    touches(pos, color, color.start_edge())
}

/// Whether `pos` touches the goal edge of `color`.
pub fn touches_goal(pos: Position, color: Color) -> bool {
    touches(pos, color, color.goal_edge())
}
