//! Settings structs with defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gomoku_board::GameConfig;

use crate::error::ConfigError;

/// File name inside the config directory.
pub const SETTINGS_FILE: &str = "gomoku.ron";

/// Default TCP port. Matches the network crate's default.
const DEFAULT_PORT: u16 = 9123;

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Server binary settings.
    pub server: ServerSettings,
    /// Client settings.
    pub client: ClientSettings,
    /// Logging and diagnostics.
    pub debug: DebugSettings,
}

/// Server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to bind.
    pub bind_address: String,
    /// TCP port.
    pub port: u16,
    /// Host exactly one match and route every client into it.
    pub single_game: bool,
    /// Connections beyond this are closed on accept.
    pub max_connections: usize,
    /// Rules for the single-game match and the lobby's suggested match.
    pub default_game: GameConfig,
}

/// Client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
    /// Server host.
    pub server_address: String,
    /// Server port.
    pub server_port: u16,
    /// Name sent in the handshake.
    pub player_name: String,
    /// Require a second click on the same cell before a move is sent.
    pub confirm_moves: bool,
    /// Bound on the TCP connect, in seconds.
    pub connect_timeout_secs: u64,
}

/// Debug settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugSettings {
    /// Log filter (e.g. "info", "debug,gomoku_server=trace"). `RUST_LOG` wins.
    pub log_level: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            single_game: false,
            max_connections: 256,
            default_game: GameConfig::default(),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1".to_string(),
            server_port: DEFAULT_PORT,
            player_name: "Player".to_string(),
            confirm_moves: false,
            connect_timeout_secs: 5,
        }
    }
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Platform config directory for gomoku, e.g. `~/.config/gomoku`.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("gomoku"))
        .ok_or(ConfigError::NoConfigDir)
}

// --- Load / Save / Reload ---

impl Settings {
    /// Loads `gomoku.ron` from `config_dir`, writing defaults if it is missing.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(SETTINGS_FILE);

        if path.exists() {
            let settings = Self::read(&path)?;
            log::info!("Loaded settings from {}", path.display());
            Ok(settings)
        } else {
            let settings = Settings::default();
            settings.save(config_dir)?;
            log::info!("Created default settings at {}", path.display());
            Ok(settings)
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        ron::from_str(&contents).map_err(ConfigError::ParseError)
    }

    /// Writes `gomoku.ron` into `config_dir`, creating the directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .enumerate_arrays(false);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(config_dir.join(SETTINGS_FILE), serialized)
            .map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Re-reads the file. `Some` only if it differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let fresh = Self::read(&config_dir.join(SETTINGS_FILE))?;
        if &fresh != self {
            log::info!("Settings reloaded with changes");
            Ok(Some(fresh))
        } else {
            Ok(None)
        }
    }

    /// Checks values that would otherwise only fail once the server runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.default_game.validate()?;
        Ok(())
    }

    /// `host:port` the server binds.
    pub fn server_bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }

    /// `host:port` the client connects to.
    pub fn client_server_addr(&self) -> String {
        format!("{}:{}", self.client.server_address, self.client.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 9123);
        assert_eq!(settings.client.server_port, 9123);
        assert_eq!(settings.server.max_connections, 256);
        assert_eq!(settings.client.connect_timeout_secs, 5);
        assert_eq!(settings.debug.log_level, "info");
        assert!(!settings.server.single_game);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let settings: Settings = ron::from_str("(server: (single_game: true))").unwrap();
        assert!(settings.server.single_game);
        assert_eq!(settings.server.port, 9123);
        assert_eq!(settings.client, ClientSettings::default());
    }

    #[test]
    fn test_nested_game_rules_parse() {
        let settings: Settings =
            ron::from_str("(server: (default_game: (width: 19, height: 19, allow_overlines: true)))")
                .unwrap();
        assert_eq!(settings.server.default_game.width, 19);
        assert!(settings.server.default_game.allow_overlines);
        assert_eq!(settings.server.default_game.victory_length, 5);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let result: Result<Settings, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_ron_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{{not ron}}").unwrap();
        assert!(matches!(
            Settings::load_or_create(dir.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_create(dir.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(dir.path().join(SETTINGS_FILE).exists());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.server.port = 4000;
        settings.client.player_name = "carol".to_string();
        settings.server.default_game.three_and_three = true;

        settings.save(dir.path()).unwrap();
        assert_eq!(Settings::load_or_create(dir.path()).unwrap(), settings);
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default();
        settings.save(dir.path()).unwrap();
        assert!(settings.reload(dir.path()).unwrap().is_none());

        let mut changed = settings.clone();
        changed.debug.log_level = "debug".to_string();
        changed.save(dir.path()).unwrap();

        let reloaded = settings.reload(dir.path()).unwrap().unwrap();
        assert_eq!(reloaded.debug.log_level, "debug");
    }

    #[test]
    fn test_invalid_default_game_rejected() {
        let mut settings = Settings::default();
        settings.server.default_game.width = 2;
        assert!(matches!(settings.validate(), Err(ConfigError::InvalidGame(_))));
    }

    #[test]
    fn test_address_helpers() {
        let settings = Settings::default();
        assert_eq!(settings.server_bind_addr(), "0.0.0.0:9123");
        assert_eq!(settings.client_server_addr(), "127.0.0.1:9123");
    }
}
