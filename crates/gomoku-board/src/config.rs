//! Per-match rule configuration.

use serde::{Deserialize, Serialize};

/// Smallest allowed board side length.
pub const MIN_BOARD_SIZE: u32 = 5;

/// Largest allowed board side length.
pub const MAX_BOARD_SIZE: u32 = 40;

/// Default board side length.
pub const DEFAULT_BOARD_SIZE: u32 = 15;

/// Default number of pieces in a row required to win.
pub const DEFAULT_VICTORY_LENGTH: u32 = 5;

/// Shortest victory length accepted by [`GameConfig::validate`].
const MIN_VICTORY_LENGTH: u32 = 3;

/// Immutable rule set for one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Board width in cells.
    pub width: u32,
    /// Board height in cells.
    pub height: u32,
    /// Run length that wins the game.
    pub victory_length: u32,
    /// Whether runs longer than `victory_length` also win.
    pub allow_overlines: bool,
    /// Forbid placements creating two open runs of three.
    pub three_and_three: bool,
    /// Forbid placements creating two runs of four.
    pub four_and_four: bool,
    /// Display name shown in game lists.
    pub name: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_BOARD_SIZE,
            height: DEFAULT_BOARD_SIZE,
            victory_length: DEFAULT_VICTORY_LENGTH,
            allow_overlines: false,
            three_and_three: false,
            four_and_four: false,
            name: "Gomoku".to_string(),
        }
    }
}

/// Reasons a [`GameConfig`] is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameConfigError {
    /// Width or height is outside `MIN_BOARD_SIZE..=MAX_BOARD_SIZE`.
    #[error("board size {width}x{height} outside 5..=40")]
    BoardSize {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// Victory length cannot fit on the board or is too short.
    #[error("victory length {length} invalid for a {width}x{height} board")]
    VictoryLength {
        /// Requested run length.
        length: u32,
        /// Board width.
        width: u32,
        /// Board height.
        height: u32,
    },
}

impl GameConfig {
    /// Checks the board dimensions and victory length.
    pub fn validate(&self) -> Result<(), GameConfigError> {
        let size_ok = |n: u32| (MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&n);
        if !size_ok(self.width) || !size_ok(self.height) {
            return Err(GameConfigError::BoardSize {
                width: self.width,
                height: self.height,
            });
        }

        let longest = self.width.max(self.height);
        if self.victory_length < MIN_VICTORY_LENGTH || self.victory_length > longest {
            return Err(GameConfigError::VictoryLength {
                length: self.victory_length,
                width: self.width,
                height: self.height,
            });
        }

        Ok(())
    }

    /// Builder-style helper used by lobbies and tests.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GameConfig::default();
        assert_eq!(config.width, 15);
        assert_eq!(config.victory_length, 5);
        assert!(!config.allow_overlines);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_board_size_limits() {
        assert!(GameConfig::default().with_size(5, 40).validate().is_ok());
        assert!(matches!(
            GameConfig::default().with_size(4, 15).validate(),
            Err(GameConfigError::BoardSize { .. })
        ));
        assert!(matches!(
            GameConfig::default().with_size(15, 41).validate(),
            Err(GameConfigError::BoardSize { .. })
        ));
    }

    #[test]
    fn test_victory_length_must_fit() {
        let mut config = GameConfig::default().with_size(5, 6);
        config.victory_length = 7;
        assert!(matches!(
            config.validate(),
            Err(GameConfigError::VictoryLength { length: 7, .. })
        ));
        config.victory_length = 6;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: GameConfig = ron::from_str("(width: 19, height: 19)").unwrap();
        assert_eq!(config.width, 19);
        assert_eq!(config.victory_length, DEFAULT_VICTORY_LENGTH);
        assert_eq!(config.name, "Gomoku");
    }
}
