//! TCP networking: length-prefixed framing, the versioned packet codec, and
//! the connection-level server and client.

pub mod framing;
pub mod packet;
pub mod tcp_client;
pub mod tcp_server;

pub use framing::{DEFAULT_MAX_PAYLOAD, FrameConfig, FrameError, read_frame, write_frame};
pub use packet::{
    DEFAULT_PORT, InitialServerData, MatchId, PROTOCOL_VERSION, Packet, PacketError, Request,
    decode_packet, encode_packet,
};
pub use tcp_client::{
    ClientError, ClientEvent, ConnectionState, ConnectionStateWatch, DEFAULT_CONNECT_TIMEOUT,
    GameClient,
};
pub use tcp_server::{
    ConnectionId, ConnectionLimitReached, ConnectionMap, GameServer, IdGenerator, PacketHandler,
    ServerConfig,
};
