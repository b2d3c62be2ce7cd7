//! Settings error types.

use gomoku_board::GameConfigError;

/// Errors from loading, saving or validating settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the settings file.
    #[error("failed to read settings: {0}")]
    ReadError(#[source] std::io::Error),

    /// Failed to write the settings file.
    #[error("failed to write settings: {0}")]
    WriteError(#[source] std::io::Error),

    /// The file is not valid RON for [`crate::Settings`].
    #[error("failed to parse settings: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// Failed to serialize settings to RON.
    #[error("failed to serialize settings: {0}")]
    SerializeError(#[source] ron::Error),

    /// The server's default match rules are unusable.
    #[error("invalid default game: {0}")]
    InvalidGame(#[from] GameConfigError),

    /// No platform config directory and none given on the command line.
    #[error("no config directory available")]
    NoConfigDir,
}
