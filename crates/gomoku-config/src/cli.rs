//! Command-line arguments for the server binary.

use std::path::PathBuf;

use clap::Parser;

use crate::Settings;

/// Gomoku server command-line arguments.
///
/// Values given here override `gomoku.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "gomoku-server", about = "Authoritative gomoku game server")]
pub struct CliArgs {
    /// TCP port to listen on.
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind.
    #[arg(long)]
    pub bind: Option<String>,

    /// Host a single match and route every client into it.
    #[arg(long)]
    pub single_game: bool,

    /// Log filter (error, warn, info, debug, trace or a directive list).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Config directory (overrides the platform default).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Settings {
    /// Applies CLI overrides on top of loaded settings.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(ref bind) = args.bind {
            self.server.bind_address = bind.clone();
        }
        if args.single_game {
            self.server.single_game = true;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
