//! Rule engine: run counting, forbidden-move detection, and victory checks.
//!
//! Every function here is pure over a [`Grid`] and treats `(x, y)` as part of
//! the run being measured whatever its current content. That lets callers ask
//! "what would placing here create?" before writing the cell, and "did this
//! placement win?" after writing it, with the same code.
//!
//! Scans rely on [`Grid::get_cell`] returning `Empty` off the board, so no
//! bounds checks are repeated here. One consequence: the physical border
//! counts as open space for [`is_open_run`]. Only a piece on the cell beyond
//! the run closes that end.

use crate::color::Color;
use crate::config::GameConfig;
use crate::grid::Grid;

/// The four line orientations. Each is scanned in both senses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// `(1, 0)`
    Horizontal,
    /// `(0, 1)`
    Vertical,
    /// `(1, 1)`
    Diagonal,
    /// `(1, -1)`
    AntiDiagonal,
}

impl Direction {
    /// All four orientations.
    pub const ALL: [Direction; 4] = [
        Direction::Horizontal,
        Direction::Vertical,
        Direction::Diagonal,
        Direction::AntiDiagonal,
    ];

    /// Unit step `(dx, dy)`.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Horizontal => (1, 0),
            Self::Vertical => (0, 1),
            Self::Diagonal => (1, 1),
            Self::AntiDiagonal => (1, -1),
        }
    }
}

/// Number of consecutive `color` cells starting one step from `(x, y)` and
/// walking in `(dx, dy)`.
fn walk(grid: &Grid, color: Color, x: i32, y: i32, dx: i32, dy: i32) -> u32 {
    let mut steps = 0;
    let (mut cx, mut cy) = (x + dx, y + dy);
    while grid.get_cell(cx, cy) == color && grid.in_bounds(cx, cy) {
        steps += 1;
        cx += dx;
        cy += dy;
    }
    steps
}

/// Length of the `color` run through `(x, y)` along `(dx, dy)` and its
/// opposite, counting `(x, y)` itself.
pub fn count_run(grid: &Grid, color: Color, x: i32, y: i32, dx: i32, dy: i32) -> u32 {
    1 + walk(grid, color, x, y, dx, dy) + walk(grid, color, x, y, -dx, -dy)
}

/// Returns `true` if the cells just past both ends of the `color` run through
/// `(x, y)` are empty (off-board counts as empty).
pub fn is_open_run(grid: &Grid, color: Color, x: i32, y: i32, dx: i32, dy: i32) -> bool {
    let ahead = walk(grid, color, x, y, dx, dy) as i32 + 1;
    let behind = walk(grid, color, x, y, -dx, -dy) as i32 + 1;
    let front = grid.get_cell(x + dx * ahead, y + dy * ahead);
    let back = grid.get_cell(x - dx * behind, y - dy * behind);
    front.is_empty() && back.is_empty()
}

/// Returns `true` if `(x, y)` would sit on open runs of exactly three in at
/// least two orientations.
pub fn violates_double_three(grid: &Grid, color: Color, x: i32, y: i32) -> bool {
    let open_threes = Direction::ALL
        .iter()
        .filter(|dir| {
            let (dx, dy) = dir.delta();
            count_run(grid, color, x, y, dx, dy) == 3 && is_open_run(grid, color, x, y, dx, dy)
        })
        .count();
    open_threes >= 2
}

/// Returns `true` if `(x, y)` would sit on runs of exactly four in at least
/// two orientations.
pub fn violates_double_four(grid: &Grid, color: Color, x: i32, y: i32) -> bool {
    let fours = Direction::ALL
        .iter()
        .filter(|dir| {
            let (dx, dy) = dir.delta();
            count_run(grid, color, x, y, dx, dy) == 4
        })
        .count();
    fours >= 2
}

/// Returns `true` if the run through `(x, y)` wins under `config`.
///
/// A run of exactly `victory_length` always wins. Longer runs win only when
/// `allow_overlines` is set.
pub fn check_victory(grid: &Grid, color: Color, x: i32, y: i32, config: &GameConfig) -> bool {
    Direction::ALL.iter().any(|dir| {
        let (dx, dy) = dir.delta();
        let run = count_run(grid, color, x, y, dx, dy);
        run == config.victory_length || (run > config.victory_length && config.allow_overlines)
    })
}
