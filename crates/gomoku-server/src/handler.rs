//! Glue between the TCP server and the match directory.

use std::sync::Arc;

use gomoku_net::{ConnectionId, ConnectionMap, Packet, PacketHandler};

use crate::directory::ServerDirectory;
use crate::session::Outbound;

/// [`PacketHandler`] that routes every packet through a [`ServerDirectory`]
/// and delivers the resulting [`Outbound`]s.
pub struct ServerHandler {
    directory: Arc<ServerDirectory>,
}

impl ServerHandler {
    /// Wraps a directory.
    pub fn new(directory: Arc<ServerDirectory>) -> Self {
        Self { directory }
    }

    /// The directory.
    pub fn directory(&self) -> &Arc<ServerDirectory> {
        &self.directory
    }
}

async fn deliver(connections: &ConnectionMap, outbound: Vec<Outbound>) {
    connections
        .send_all(outbound.into_iter().map(|o| (o.to, o.packet)))
        .await;
}

impl PacketHandler for ServerHandler {
    async fn on_connect(&self, id: ConnectionId, _connections: &ConnectionMap) {
        tracing::debug!(connection = id.0, "awaiting handshake");
    }

    async fn on_packet(&self, id: ConnectionId, packet: Packet, connections: &ConnectionMap) {
        let outbound = self.directory.route(id, packet).await;
        deliver(connections, outbound).await;
    }

    async fn on_disconnect(&self, id: ConnectionId, connections: &ConnectionMap) {
        let outbound = self.directory.disconnect(id).await;
        deliver(connections, outbound).await;
    }
}
