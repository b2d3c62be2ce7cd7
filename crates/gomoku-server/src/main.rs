//! Gomoku server binary.
//!
//! Run with: `cargo run -p gomoku-server -- --single-game`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gomoku_config::{CliArgs, ConfigError, Settings, default_config_dir};
use tracing::{error, info};

/// Loads `gomoku.ron`, applies CLI overrides and validates the result.
fn load_settings(args: &CliArgs) -> Result<(Settings, PathBuf), ConfigError> {
    let config_dir = match &args.config {
        Some(dir) => dir.clone(),
        None => default_config_dir()?,
    };
    let mut settings = Settings::load_or_create(&config_dir)?;
    settings.apply_cli_overrides(args);
    settings.validate()?;
    Ok((settings, config_dir))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let (settings, config_dir) = match load_settings(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            gomoku_log::init_logging(None, false, None);
            error!("Failed to load settings: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_dir = config_dir.join("logs");
    gomoku_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&settings));
    info!("Settings loaded from {}", config_dir.display());

    let (server, listener) = match gomoku_server::bind(&settings.server).await {
        Ok(bound) => bound,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = server.run_with_listener(listener) => {
            if let Err(e) = result {
                error!("Server stopped: {e}");
                return ExitCode::FAILURE;
            }
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for Ctrl-C: {e}");
            }
            info!("Ctrl-C received");
            server.shutdown();
        }
    }

    ExitCode::SUCCESS
}
