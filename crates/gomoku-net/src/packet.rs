//! Wire packets and their versioned postcard encoding.
//!
//! Every payload is `[PROTOCOL_VERSION] [postcard(Packet)]`. The enum
//! discriminant is the packet tag; both ends match on it exhaustively.

use std::fmt;

use serde::{Deserialize, Serialize};

use gomoku_board::{Color, GameConfig, Grid};
use gomoku_game::GameAction;

/// Current wire-protocol version. Prepended to every encoded packet.
pub const PROTOCOL_VERSION: u8 = 1;

/// Default TCP port for servers and clients.
pub const DEFAULT_PORT: u16 = 9123;

// ---------------------------------------------------------------------------
// MatchId
// ---------------------------------------------------------------------------

/// Server-assigned match identifier. Unique for the server's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// Every message exchanged between client and server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Packet {
    // --- Handshake / lobby ---
    /// Client greeting, first packet on a new connection.
    HandshakeClient {
        /// Name the player wants to be shown under.
        player_name: String,
    },
    /// Server reply to [`Packet::HandshakeClient`].
    HandshakeServer {
        /// The server hosts exactly one match and routes everyone to it.
        single_game_server: bool,
        /// The server accepted the handshake.
        ready: bool,
    },
    /// Client updates its display name.
    InitialClientData {
        /// New display name.
        player_name: String,
    },
    /// Create a new match and take seat one.
    CreateGame {
        /// Rules for the new match.
        config: GameConfig,
    },
    /// Join an existing match.
    JoinGame {
        /// Target match.
        match_id: MatchId,
    },
    /// Matches available to join. `ids[i]` is named `names[i]`.
    GameList {
        /// Match ids, ascending.
        ids: Vec<MatchId>,
        /// Display names.
        names: Vec<String>,
    },

    // --- In game ---
    /// Full state sent to a participant when they join.
    InitialServerData(InitialServerData),
    /// A confirmed action, relayed to the other participants.
    GameAction(GameAction),
    /// Authoritative board, sent for resync.
    BoardSnapshot {
        /// The board.
        grid: Grid,
        /// Board width.
        width: u32,
        /// Board height.
        height: u32,
        /// Whether the match has ended. `false` after a board clear.
        game_over: bool,
    },
    /// Whose turn it is.
    NotifyTurn {
        /// Color to move.
        color: Color,
    },
    /// Roster: seat one, seat two (empty string when vacant), then spectators.
    PlayerList {
        /// Display names in seat order.
        names: Vec<String>,
    },
    /// The match ended. `None` means a draw.
    Victory {
        /// Winning color.
        winner: Option<Color>,
    },
    /// A request without payload.
    Request(Request),
    /// Human-readable message from the server, e.g. a refused lobby request.
    ServerNotice {
        /// Text to show.
        message: String,
    },
}

/// Parameterless client requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Request {
    /// Send me a [`Packet::BoardSnapshot`].
    UpdateBoard,
    /// Reset the match (seated players only).
    ClearBoard,
    /// Send me a [`Packet::NotifyTurn`].
    GetTurn,
    /// Send me a [`Packet::PlayerList`].
    GetPlayerList,
    /// Send me a [`Packet::GameList`].
    GetGameList,
    /// Leave the current match.
    LeaveGame,
    /// Join the only match on a single-game server.
    JoinSingleGameServer,
}

/// Snapshot of a match from the joiner's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialServerData {
    /// Current board.
    pub grid: Grid,
    /// Match rules.
    pub config: GameConfig,
    /// Color the joiner plays, `Empty` for spectators.
    pub assigned_player: Color,
    /// Color to move.
    pub current_turn: Color,
    /// Roster, same order as [`Packet::PlayerList`].
    pub player_names: Vec<String>,
    /// Color of seat one.
    pub seat_one_color: Color,
    /// Color of seat two.
    pub seat_two_color: Color,
    /// The match joined.
    pub match_id: MatchId,
    /// Whether the match has already ended.
    pub game_over: bool,
}

impl Packet {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HandshakeClient { .. } => "HandshakeClient",
            Self::HandshakeServer { .. } => "HandshakeServer",
            Self::InitialClientData { .. } => "InitialClientData",
            Self::CreateGame { .. } => "CreateGame",
            Self::JoinGame { .. } => "JoinGame",
            Self::GameList { .. } => "GameList",
            Self::InitialServerData(_) => "InitialServerData",
            Self::GameAction(_) => "GameAction",
            Self::BoardSnapshot { .. } => "BoardSnapshot",
            Self::NotifyTurn { .. } => "NotifyTurn",
            Self::PlayerList { .. } => "PlayerList",
            Self::Victory { .. } => "Victory",
            Self::Request(_) => "Request",
            Self::ServerNotice { .. } => "ServerNotice",
        }
    }

    /// Builds a [`Packet::BoardSnapshot`] from a grid and the match's
    /// game-over flag.
    pub fn snapshot(grid: &Grid, game_over: bool) -> Self {
        Self::BoardSnapshot {
            grid: grid.clone(),
            width: grid.width(),
            height: grid.height(),
            game_over,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from decoding a payload.
#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    /// No version byte.
    #[error("empty payload")]
    EmptyPayload,

    /// Version byte does not match [`PROTOCOL_VERSION`].
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Postcard failed; includes grids that fail validation.
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes a packet as `[version] [postcard body]`.
pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, PacketError> {
    let body = postcard::to_allocvec(packet)?;
    let mut out = Vec::with_capacity(1 + body.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decodes a payload produced by [`encode_packet`].
pub fn decode_packet(data: &[u8]) -> Result<Packet, PacketError> {
    let (&version, body) = data.split_first().ok_or(PacketError::EmptyPayload)?;
    if version != PROTOCOL_VERSION {
        return Err(PacketError::UnsupportedVersion(version));
    }
    Ok(postcard::from_bytes(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(packet: &Packet) -> Packet {
        decode_packet(&encode_packet(packet).unwrap()).unwrap()
    }

    #[test]
    fn test_initial_server_data_roundtrip() {
        let mut grid = Grid::new(15, 15).unwrap();
        grid.set_cell(3, 4, Color::White).unwrap();
        let packet = Packet::InitialServerData(InitialServerData {
            grid,
            config: GameConfig::default(),
            assigned_player: Color::White,
            current_turn: Color::Black,
            player_names: vec!["alice".into(), "bob".into()],
            seat_one_color: Color::Black,
            seat_two_color: Color::White,
            match_id: MatchId(3),
            game_over: false,
        });
        assert_eq!(roundtrip(&packet), packet);
    }

    #[test]
    fn test_game_action_roundtrip() {
        let packet = Packet::GameAction(GameAction::place(Color::Black, 7, 3));
        assert_eq!(roundtrip(&packet), packet);
    }

    #[test]
    fn test_snapshot_carries_dimensions() {
        let grid = Grid::new(19, 9).unwrap();
        match roundtrip(&Packet::snapshot(&grid, true)) {
            Packet::BoardSnapshot {
                grid: decoded,
                width,
                height,
                game_over,
            } => {
                assert_eq!((width, height), (19, 9));
                assert_eq!(decoded, grid);
                assert!(game_over);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_largest_snapshot_fits_in_a_frame() {
        let mut grid = Grid::new(40, 40).unwrap();
        for x in 0..40 {
            grid.set_cell(x, x, Color::White).unwrap();
        }
        let bytes = encode_packet(&Packet::snapshot(&grid, false)).unwrap();
        assert!(bytes.len() < crate::framing::DEFAULT_MAX_PAYLOAD as usize);
    }

    #[test]
    fn test_version_byte_first() {
        let bytes = encode_packet(&Packet::Request(Request::GetTurn)).unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut bytes = encode_packet(&Packet::Victory { winner: None }).unwrap();
        bytes[0] = 9;
        assert!(matches!(
            decode_packet(&bytes),
            Err(PacketError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_empty_and_corrupt_payloads_rejected() {
        assert!(matches!(decode_packet(&[]), Err(PacketError::EmptyPayload)));
        assert!(decode_packet(&[PROTOCOL_VERSION, 0xFF, 0xFF, 0xFF]).is_err());
    }

    #[test]
    fn test_snapshot_with_wrong_cell_count_rejected() {
        #[derive(Serialize)]
        struct BadGrid {
            width: u32,
            height: u32,
            cells: Vec<Color>,
        }
        #[derive(Serialize)]
        enum Forged {
            _HandshakeClient,
            _HandshakeServer,
            _InitialClientData,
            _CreateGame,
            _JoinGame,
            _GameList,
            _InitialServerData,
            _GameAction,
            BoardSnapshot {
                grid: BadGrid,
                width: u32,
                height: u32,
                game_over: bool,
            },
        }
        let forged = Forged::BoardSnapshot {
            grid: BadGrid {
                width: 5,
                height: 5,
                cells: vec![Color::Empty; 3],
            },
            width: 5,
            height: 5,
            game_over: false,
        };
        let mut bytes = vec![PROTOCOL_VERSION];
        bytes.extend(postcard::to_allocvec(&forged).unwrap());
        assert!(matches!(decode_packet(&bytes), Err(PacketError::Postcard(_))));
    }
}
