//! Win detection for the hex board.

use crate::board::{BOARD_SIZE, Board, Color, Position};
use crate::edges::{are_adjacent, neighbors, touches_goal, touches_start};
use std::collections::VecDeque;
use tracing::instrument;

/// Checks whether `color` has connected its start edge to its goal edge.
///
/// Breadth-first search seeded, in row-major order, from every `color`
/// stone touching the start edge. The first dequeued cell touching the goal
/// edge ends the search; the chain from its seed is returned. Each cell is
/// visited at most once, so the search is O(N²).
#[instrument(skip(board))]
pub fn check_win(board: &Board, color: Color) -> Option<Vec<Position>> {
    let mut visited = [[false; BOARD_SIZE]; BOARD_SIZE];
    let mut parent: [[Option<Position>; BOARD_SIZE]; BOARD_SIZE] = [[None; BOARD_SIZE]; BOARD_SIZE];
    let mut queue = VecDeque::new();

    for pos in Position::all() {
        if board.is_color(pos, color) && touches_start(pos, color) {
            visited[pos.row][pos.col] = true;
            queue.push_back(pos);
        }
    }

    while let Some(pos) = queue.pop_front() {
        if touches_goal(pos, color) {
            return Some(trace_back(&parent, pos));
        }
        for next in neighbors(pos) {
            if !visited[next.row][next.col] && board.is_color(next, color) {
                visited[next.row][next.col] = true;
                parent[next.row][next.col] = Some(pos);
                queue.push_back(next);
            }
        }
    }

    None
}

/// Walks parent links from `end` back to its seed, returning seed→end.
fn trace_back(
    parent: &[[Option<Position>; BOARD_SIZE]; BOARD_SIZE],
    end: Position,
) -> Vec<Position> {
    let mut path = vec![end];
    let mut current = end;
    while let Some(prev) = parent[current.row][current.col] {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Validates a claimed winning chain for `color` on `board`.
///
/// The chain must be non-empty, entirely `color`, neighbor-connected, start
/// on the start edge and end on the goal edge.
pub fn is_winning_path(board: &Board, color: Color, path: &[Position]) -> bool {
    let (Some(first), Some(last)) = (path.first(), path.last()) else {
        return false;
    };
    touches_start(*first, color)
        && touches_goal(*last, color)
        && path.iter().all(|pos| board.is_color(*pos, color))
        && path.windows(2).all(|pair| are_adjacent(pair[0], pair[1]))
}
