//! Action and state errors.

use gomoku_board::GridError;

use crate::action::ActionPhase;

/// A placement the rules do not allow. Expected during play; surfaced to the
/// acting user and never fatal to a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IllegalAction {
    /// The target cell already holds a piece.
    #[error("cell ({x}, {y}) is already occupied")]
    Occupied {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
    /// The target cell is off the board.
    #[error("cell ({x}, {y}) is outside the board")]
    OutOfBounds {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
    /// The placement creates two open threes.
    #[error("placing at ({x}, {y}) makes a double three")]
    DoubleThree {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
    /// The placement creates two fours.
    #[error("placing at ({x}, {y}) makes a double four")]
    DoubleFour {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
    /// The action names no player color.
    #[error("action has no player color")]
    NoColor,
}

/// Errors from applying, confirming or undoing a [`crate::GameAction`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// Rejected by the rules.
    #[error(transparent)]
    Illegal(#[from] IllegalAction),

    /// The match already ended. Reaching this means a caller let play
    /// continue past the end of the game.
    #[error("match is already over")]
    GameOver,

    /// The operation does not fit the action's lifecycle.
    #[error("action is {actual:?}, expected {expected:?}")]
    InvalidPhase {
        /// Phase the operation requires.
        expected: ActionPhase,
        /// Phase the action is in.
        actual: ActionPhase,
    },

    /// The grid refused the write.
    #[error("grid error: {0}")]
    Grid(#[from] GridError),
}

impl ActionError {
    /// Returns the rule violation, if this is one.
    pub fn as_illegal(&self) -> Option<&IllegalAction> {
        match self {
            Self::Illegal(illegal) => Some(illegal),
            _ => None,
        }
    }
}

/// A resync snapshot that cannot replace the local board.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// Snapshot dimensions differ from the match configuration.
    #[error("snapshot is {width}x{height}, match is {expected_width}x{expected_height}")]
    Dimensions {
        /// Snapshot width.
        width: u32,
        /// Snapshot height.
        height: u32,
        /// Configured width.
        expected_width: u32,
        /// Configured height.
        expected_height: u32,
    },
}
