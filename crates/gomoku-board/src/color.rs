//! Cell occupancy / player color.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Contents of a board cell, and the color a player plays.
///
/// `Empty` doubles as the "no player" sentinel wherever a player color is
/// expected (e.g. a spectator's assigned color).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Color {
    /// Unoccupied cell / no player.
    #[default]
    Empty,
    /// Black piece. Black moves first.
    Black,
    /// White piece.
    White,
}

impl Color {
    /// Returns the opposing color. `Empty` has no opponent and maps to itself.
    pub fn opponent(self) -> Self {
        match self {
            Self::Black => Self::White,
            Self::White => Self::Black,
            Self::Empty => Self::Empty,
        }
    }

    /// Returns `true` for `Empty`.
    pub fn is_empty(self) -> bool {
        self == Self::Empty
    }

    /// Returns `true` for the two playable colors.
    pub fn is_player(self) -> bool {
        !self.is_empty()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "none"),
            Self::Black => write!(f, "black"),
            Self::White => write!(f, "white"),
        }
    }
}
