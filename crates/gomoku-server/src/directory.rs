//! Match directory: the lobby and packet routing for every connection.
//!
//! Lock order is always directory, then session. Game packets clone the
//! session handle under the directory lock and release it before locking the
//! session, so one busy match never blocks the lobby.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use gomoku_board::{GameConfig, GameConfigError};
use gomoku_net::{ConnectionId, MatchId, Packet, Request};

use crate::session::{Outbound, ProtocolViolation, ServerSession};

/// Longest display name kept; longer names are truncated.
const MAX_NAME_CHARS: usize = 32;

// ---------------------------------------------------------------------------
// MatchIdAllocator
// ---------------------------------------------------------------------------

/// Hands out match ids, starting at 1. Ids are never reused.
#[derive(Debug)]
pub struct MatchIdAllocator {
    next: AtomicU64,
}

impl MatchIdAllocator {
    /// Starts at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Next unused id.
    pub fn allocate(&self) -> MatchId {
        MatchId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for MatchIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// LobbyError
// ---------------------------------------------------------------------------

/// A refused lobby request. Reported to the client as a
/// [`Packet::ServerNotice`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// No match with this id.
    #[error("no match {0}")]
    UnknownMatch(MatchId),

    /// The connection is already in a match.
    #[error("already in match {0}")]
    AlreadyJoined(MatchId),

    /// The request needs a joined match.
    #[error("not in a match")]
    NotJoined,

    /// The requested rules are invalid.
    #[error("invalid game settings: {0}")]
    InvalidConfig(#[from] GameConfigError),

    /// The request does not apply to this server's mode.
    #[error("{0} is not available on this server")]
    WrongMode(&'static str),
}

// ---------------------------------------------------------------------------
// ServerDirectory
// ---------------------------------------------------------------------------

struct Inner {
    sessions: BTreeMap<MatchId, Arc<Mutex<ServerSession>>>,
    joined: HashMap<ConnectionId, MatchId>,
    names: HashMap<ConnectionId, String>,
}

impl Inner {
    fn name_of(&self, conn: ConnectionId) -> String {
        self.names
            .get(&conn)
            .cloned()
            .unwrap_or_else(|| format!("Player {}", conn.0))
    }
}

/// Every match on the server and which connection is in which.
pub struct ServerDirectory {
    inner: Mutex<Inner>,
    ids: MatchIdAllocator,
    single_game: Option<MatchId>,
}

impl ServerDirectory {
    /// Multi-game server with an empty lobby.
    pub fn multi_game() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: BTreeMap::new(),
                joined: HashMap::new(),
                names: HashMap::new(),
            }),
            ids: MatchIdAllocator::new(),
            single_game: None,
        }
    }

    /// Single-game server hosting one match with `config`.
    pub fn single_game(config: GameConfig) -> Result<Self, GameConfigError> {
        let mut directory = Self::multi_game();
        let id = directory.ids.allocate();
        let session = ServerSession::new(id, config)?;
        directory
            .inner
            .get_mut()
            .sessions
            .insert(id, Arc::new(Mutex::new(session)));
        directory.single_game = Some(id);
        Ok(directory)
    }

    /// Whether this is a single-game server.
    pub fn is_single_game(&self) -> bool {
        self.single_game.is_some()
    }

    /// Number of live matches.
    pub async fn match_count(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    /// Match `conn` is in.
    pub async fn joined_match(&self, conn: ConnectionId) -> Option<MatchId> {
        self.inner.lock().await.joined.get(&conn).copied()
    }

    /// Session handle for a match.
    pub async fn session(&self, id: MatchId) -> Option<Arc<Mutex<ServerSession>>> {
        self.inner.lock().await.sessions.get(&id).cloned()
    }

    // --- Lobby handlers ---

    /// Records the name `conn` wants to be shown under.
    pub async fn set_name(&self, conn: ConnectionId, name: &str) {
        let name: String = name.trim().chars().take(MAX_NAME_CHARS).collect();
        let mut inner = self.inner.lock().await;
        if name.is_empty() {
            inner.names.remove(&conn);
        } else {
            inner.names.insert(conn, name);
        }
    }

    /// Answers a client handshake.
    pub async fn handshake(&self, conn: ConnectionId, player_name: &str) -> Vec<Outbound> {
        self.set_name(conn, player_name).await;
        tracing::info!(connection = conn.0, player_name, "handshake");
        vec![Outbound::new(
            conn,
            Packet::HandshakeServer {
                single_game_server: self.is_single_game(),
                ready: true,
            },
        )]
    }

    /// Ids and names of every match, ascending by id.
    pub async fn list_games(&self) -> Packet {
        let sessions: Vec<_> = self.inner.lock().await.sessions.values().cloned().collect();
        let mut ids = Vec::with_capacity(sessions.len());
        let mut names = Vec::with_capacity(sessions.len());
        for session in sessions {
            let session = session.lock().await;
            ids.push(session.id());
            names.push(session.name().to_string());
        }
        Packet::GameList { ids, names }
    }

    /// Creates a match with `conn` in seat one.
    pub async fn create_game(
        &self,
        conn: ConnectionId,
        config: GameConfig,
    ) -> Result<Vec<Outbound>, LobbyError> {
        if self.is_single_game() {
            return Err(LobbyError::WrongMode("creating games"));
        }
        let mut inner = self.inner.lock().await;
        if let Some(&current) = inner.joined.get(&conn) {
            return Err(LobbyError::AlreadyJoined(current));
        }
        config.validate()?;

        let id = self.ids.allocate();
        let mut session = ServerSession::new(id, config)?;
        let (_, out) = session.join(conn, &inner.name_of(conn));
        tracing::info!(match_id = id.0, connection = conn.0, name = session.name(), "match created");
        inner.sessions.insert(id, Arc::new(Mutex::new(session)));
        inner.joined.insert(conn, id);
        Ok(out)
    }

    /// Joins `conn` to match `id`.
    pub async fn join_game(
        &self,
        conn: ConnectionId,
        id: MatchId,
    ) -> Result<Vec<Outbound>, LobbyError> {
        if self.is_single_game() {
            return Err(LobbyError::WrongMode("joining by id"));
        }
        self.join(conn, id).await
    }

    /// Joins `conn` to the only match of a single-game server.
    pub async fn join_single_game(&self, conn: ConnectionId) -> Result<Vec<Outbound>, LobbyError> {
        let id = self
            .single_game
            .ok_or(LobbyError::WrongMode("the single game"))?;
        self.join(conn, id).await
    }

    async fn join(&self, conn: ConnectionId, id: MatchId) -> Result<Vec<Outbound>, LobbyError> {
        let mut inner = self.inner.lock().await;
        if let Some(&current) = inner.joined.get(&conn) {
            return Err(LobbyError::AlreadyJoined(current));
        }
        let session = inner
            .sessions
            .get(&id)
            .cloned()
            .ok_or(LobbyError::UnknownMatch(id))?;
        let name = inner.name_of(conn);
        let (_, out) = session.lock().await.join(conn, &name);
        inner.joined.insert(conn, id);
        Ok(out)
    }

    /// Takes `conn` out of its match.
    pub async fn leave_game(&self, conn: ConnectionId) -> Result<Vec<Outbound>, LobbyError> {
        let mut inner = self.inner.lock().await;
        let id = inner.joined.remove(&conn).ok_or(LobbyError::NotJoined)?;
        Ok(self.leave_locked(&mut inner, conn, id).await)
    }

    /// Cleans up after a closed connection.
    pub async fn disconnect(&self, conn: ConnectionId) -> Vec<Outbound> {
        let mut inner = self.inner.lock().await;
        inner.names.remove(&conn);
        match inner.joined.remove(&conn) {
            Some(id) => self.leave_locked(&mut inner, conn, id).await,
            None => Vec::new(),
        }
    }

    /// Removes `conn` from session `id`. An emptied session is dropped, or
    /// reset when it is the single game.
    async fn leave_locked(&self, inner: &mut Inner, conn: ConnectionId, id: MatchId) -> Vec<Outbound> {
        let Some(session) = inner.sessions.get(&id).cloned() else {
            return Vec::new();
        };
        let mut session = session.lock().await;
        let outcome = session.leave(conn);
        if outcome.empty {
            if self.single_game == Some(id) {
                session.reset();
                tracing::info!(match_id = id.0, "single game emptied, board reset");
            } else {
                inner.sessions.remove(&id);
                tracing::info!(match_id = id.0, "match closed");
            }
        }
        outcome.outbound
    }

    // --- Routing ---

    /// Dispatches one packet from `conn` and returns what to send.
    ///
    /// Lobby refusals become a [`Packet::ServerNotice`] to the sender.
    /// Protocol violations are logged and produce nothing.
    pub async fn route(&self, conn: ConnectionId, packet: Packet) -> Vec<Outbound> {
        tracing::debug!(connection = conn.0, kind = packet.kind(), "routing");
        let result = match packet {
            Packet::HandshakeClient { player_name } => Ok(self.handshake(conn, &player_name).await),
            Packet::InitialClientData { player_name } => {
                self.set_name(conn, &player_name).await;
                Ok(Vec::new())
            }
            Packet::CreateGame { config } => self.create_game(conn, config).await,
            Packet::JoinGame { match_id } => self.join_game(conn, match_id).await,
            Packet::Request(Request::GetGameList) => {
                Ok(vec![Outbound::new(conn, self.list_games().await)])
            }
            Packet::Request(Request::JoinSingleGameServer) => self.join_single_game(conn).await,
            Packet::Request(Request::LeaveGame) => self.leave_game(conn).await,
            Packet::GameAction(_)
            | Packet::Request(
                Request::UpdateBoard
                | Request::ClearBoard
                | Request::GetTurn
                | Request::GetPlayerList,
            ) => self.route_to_session(conn, packet).await,
            Packet::HandshakeServer { .. }
            | Packet::GameList { .. }
            | Packet::InitialServerData(_)
            | Packet::BoardSnapshot { .. }
            | Packet::NotifyTurn { .. }
            | Packet::PlayerList { .. }
            | Packet::Victory { .. }
            | Packet::ServerNotice { .. } => {
                tracing::warn!(connection = conn.0, kind = packet.kind(), "server-only packet from client ignored");
                Ok(Vec::new())
            }
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(connection = conn.0, "lobby request refused: {e}");
            vec![Outbound::new(
                conn,
                Packet::ServerNotice {
                    message: e.to_string(),
                },
            )]
        })
    }

    async fn route_to_session(
        &self,
        conn: ConnectionId,
        packet: Packet,
    ) -> Result<Vec<Outbound>, LobbyError> {
        let session = {
            let inner = self.inner.lock().await;
            let id = inner.joined.get(&conn).ok_or(LobbyError::NotJoined)?;
            inner
                .sessions
                .get(id)
                .cloned()
                .ok_or(LobbyError::UnknownMatch(*id))?
        };
        let mut session = session.lock().await;

        let result: Result<Vec<Outbound>, ProtocolViolation> = match packet {
            Packet::GameAction(action) => session.handle_action(conn, action),
            Packet::Request(Request::UpdateBoard) => Ok(session.resync_for(conn)),
            Packet::Request(Request::ClearBoard) => session.clear_board(conn),
            Packet::Request(Request::GetTurn) => Ok(vec![session.turn_for(conn)]),
            Packet::Request(Request::GetPlayerList) => Ok(vec![session.player_list_for(conn)]),
            other => {
                tracing::debug!(kind = other.kind(), "not a session packet");
                Ok(Vec::new())
            }
        };
        Ok(result.unwrap_or_else(|violation| {
            tracing::error!(
                match_id = session.id().0,
                connection = conn.0,
                "protocol violation: {violation}"
            );
            Vec::new()
        }))
    }
}
