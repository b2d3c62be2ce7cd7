//! Authoritative gomoku server.
//!
//! [`ServerSession`] owns one match and decides what every participant is
//! told. [`ServerDirectory`] is the lobby and router in front of the sessions.
//! [`ServerHandler`] plugs the directory into [`gomoku_net::GameServer`].

pub mod directory;
pub mod handler;
pub mod session;

use std::sync::Arc;

use gomoku_config::ServerSettings;
use gomoku_net::{FrameConfig, GameServer, ServerConfig};
use tokio::net::TcpListener;

pub use directory::{LobbyError, MatchIdAllocator, ServerDirectory};
pub use handler::ServerHandler;
pub use session::{LeaveOutcome, Outbound, ProtocolViolation, RosterEntry, Seat, ServerSession};

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The default match rules are invalid.
    #[error("invalid default game: {0}")]
    Config(#[from] gomoku_board::GameConfigError),

    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address from settings.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Builds the directory and server from settings and binds the listener.
pub async fn bind(
    settings: &ServerSettings,
) -> Result<(GameServer<ServerHandler>, TcpListener), StartupError> {
    let directory = if settings.single_game {
        ServerDirectory::single_game(settings.default_game.clone())?
    } else {
        ServerDirectory::multi_game()
    };

    let addr = format!("{}:{}", settings.bind_address, settings.port);
    let listener = TcpListener::bind(addr.as_str())
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let bind_addr = listener
        .local_addr()
        .map_err(|source| StartupError::Bind { addr, source })?;

    let config = ServerConfig {
        bind_addr,
        max_connections: settings.max_connections,
        frame: FrameConfig::default(),
    };
    let handler = Arc::new(ServerHandler::new(Arc::new(directory)));
    tracing::info!(
        %bind_addr,
        single_game = settings.single_game,
        max_connections = settings.max_connections,
        "server configured"
    );
    Ok((GameServer::new(config, handler), listener))
}
