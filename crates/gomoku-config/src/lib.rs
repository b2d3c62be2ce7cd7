//! Settings for the gomoku server and client.
//!
//! Settings persist as `gomoku.ron` in a config directory. Missing fields fall
//! back to defaults, unknown fields are ignored, and CLI flags override what
//! was loaded.

mod cli;
mod error;
mod settings;

pub use cli::CliArgs;
pub use error::ConfigError;
pub use settings::{
    ClientSettings, DebugSettings, SETTINGS_FILE, ServerSettings, Settings, default_config_dir,
};
