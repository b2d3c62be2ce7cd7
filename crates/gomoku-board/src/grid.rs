//! Fixed-size 2D cell store.
//!
//! Cells are stored row-major in a flat array (`index = x + width * y`). All
//! mutation goes through [`Grid::set_cell`], which records a [`CellChanged`]
//! value in an internal buffer. Renderers drain the buffer once per frame with
//! [`Grid::drain_changes`]; nothing is invoked synchronously during mutation.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::config::{MAX_BOARD_SIZE, MIN_BOARD_SIZE};

/// Emitted by [`Grid::set_cell`] for every successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellChanged {
    /// The color now at this position.
    pub color: Color,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

/// Errors produced by grid construction and mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// A write targeted a coordinate outside the board.
    #[error("cell ({x}, {y}) outside {width}x{height} board")]
    OutOfBounds {
        /// Requested column.
        x: i32,
        /// Requested row.
        y: i32,
        /// Board width.
        width: u32,
        /// Board height.
        height: u32,
    },
    /// Width or height outside the supported range.
    #[error("grid dimensions {width}x{height} outside 5..=40")]
    Dimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// A decoded cell array does not match the declared dimensions.
    #[error("expected {expected} cells, got {actual}")]
    CellCount {
        /// `width * height`.
        expected: usize,
        /// Length of the supplied array.
        actual: usize,
    },
}

/// Wire/disk shape of a grid. Validated on the way back in.
#[derive(Serialize, Deserialize)]
struct RawGrid {
    width: u32,
    height: u32,
    cells: Vec<Color>,
}

/// Board occupancy. No rules live here; see [`crate::rules`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawGrid", into = "RawGrid")]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Color>,
    /// Writes not yet drained by a consumer.
    changes: Vec<CellChanged>,
}

impl Grid {
    /// Creates an empty grid.
    pub fn new(width: u32, height: u32) -> Result<Self, GridError> {
        Self::check_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            cells: vec![Color::Empty; (width * height) as usize],
            changes: Vec::new(),
        })
    }

    /// Rebuilds a grid from raw parts, e.g. a resync snapshot.
    pub fn from_cells(width: u32, height: u32, cells: Vec<Color>) -> Result<Self, GridError> {
        Self::check_dimensions(width, height)?;
        let expected = (width * height) as usize;
        if cells.len() != expected {
            return Err(GridError::CellCount {
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self {
            width,
            height,
            cells,
            changes: Vec::new(),
        })
    }

    fn check_dimensions(width: u32, height: u32) -> Result<(), GridError> {
        let ok = |n: u32| (MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&n);
        if ok(width) && ok(height) {
            Ok(())
        } else {
            Err(GridError::Dimensions { width, height })
        }
    }

    /// Board width in cells.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Board height in cells.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major cell slice.
    pub fn cells(&self) -> &[Color] {
        &self.cells
    }

    /// Returns `true` if `(x, y)` lies on the board.
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        self.in_bounds(x, y)
            .then(|| x as usize + self.width as usize * y as usize)
    }

    /// Returns the cell at `(x, y)`, or `Empty` for coordinates off the board.
    pub fn get_cell(&self, x: i32, y: i32) -> Color {
        self.index(x, y)
            .map_or(Color::Empty, |index| self.cells[index])
    }

    /// Writes `color` at `(x, y)` and records the change.
    pub fn set_cell(&mut self, x: i32, y: i32, color: Color) -> Result<(), GridError> {
        let index = self.index(x, y).ok_or(GridError::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        })?;
        self.cells[index] = color;
        self.changes.push(CellChanged { color, x, y });
        Ok(())
    }

    /// Returns `true` once no empty cell remains.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|c| c.is_player())
    }

    /// Number of non-empty cells.
    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| c.is_player()).count()
    }

    /// Clears every cell. Records one change per previously occupied cell.
    pub fn clear(&mut self) {
        for index in 0..self.cells.len() {
            if self.cells[index].is_player() {
                self.cells[index] = Color::Empty;
                self.changes.push(CellChanged {
                    color: Color::Empty,
                    x: (index % self.width as usize) as i32,
                    y: (index / self.width as usize) as i32,
                });
            }
        }
    }

    /// Takes all changes recorded since the last drain.
    pub fn drain_changes(&mut self) -> Vec<CellChanged> {
        std::mem::take(&mut self.changes)
    }

    /// Number of undrained changes.
    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }
}

impl PartialEq for Grid {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.cells == other.cells
    }
}

impl Eq for Grid {}

impl TryFrom<RawGrid> for Grid {
    type Error = GridError;

    fn try_from(raw: RawGrid) -> Result<Self, Self::Error> {
        Grid::from_cells(raw.width, raw.height, raw.cells)
    }
}

impl From<Grid> for RawGrid {
    fn from(grid: Grid) -> Self {
        RawGrid {
            width: grid.width,
            height: grid.height,
            cells: grid.cells,
        }
    }
}
