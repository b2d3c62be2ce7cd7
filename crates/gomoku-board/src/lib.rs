//! Board storage and the rule engine: grid cells, line counting, forbidden-move
//! detection, and victory detection under configurable rule variants.

pub mod color;
pub mod config;
pub mod grid;
pub mod rules;

pub use color::Color;
pub use config::{
    DEFAULT_BOARD_SIZE, DEFAULT_VICTORY_LENGTH, GameConfig, GameConfigError, MAX_BOARD_SIZE,
    MIN_BOARD_SIZE,
};
pub use grid::{CellChanged, Grid, GridError};
pub use rules::{
    Direction, check_victory, count_run, is_open_run, violates_double_four, violates_double_three,
};
