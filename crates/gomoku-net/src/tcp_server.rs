//! TCP server: accepts connections and hands decoded packets to a
//! [`PacketHandler`].
//!
//! Each connection gets two tasks. The reader decodes frames and awaits the
//! handler. The writer drains an unbounded queue onto the socket, so a slow
//! peer never stalls a handler that is sending to it.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{RwLock, mpsc, watch};

use crate::framing::{FrameConfig, FrameError, read_frame, write_frame};
use crate::packet::{DEFAULT_PORT, Packet, decode_packet, encode_packet};

/// Unique identifier for a TCP connection within a server run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

/// Atomic generator for monotonically increasing [`ConnectionId`]s.
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Starts at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns the next id.
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Returned when the connection map is at capacity.
#[derive(Debug, thiserror::Error)]
#[error("connection limit reached")]
pub struct ConnectionLimitReached;

/// Outbound queues of every live connection.
pub struct ConnectionMap {
    inner: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<Packet>>>,
    max_connections: usize,
}

impl ConnectionMap {
    /// Creates an empty map holding at most `max_connections` entries.
    pub fn new(max_connections: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_connections,
        }
    }

    /// Registers a connection's outbound queue.
    pub async fn insert(
        &self,
        id: ConnectionId,
        sender: mpsc::UnboundedSender<Packet>,
    ) -> Result<(), ConnectionLimitReached> {
        let mut map = self.inner.write().await;
        if map.len() >= self.max_connections {
            return Err(ConnectionLimitReached);
        }
        map.insert(id, sender);
        Ok(())
    }

    /// Drops a connection's queue, which ends its writer task.
    pub async fn remove(&self, id: &ConnectionId) -> bool {
        self.inner.write().await.remove(id).is_some()
    }

    /// Queues `packet` for `id`. Returns `false` if the connection is gone.
    pub async fn send(&self, id: ConnectionId, packet: Packet) -> bool {
        match self.inner.read().await.get(&id) {
            Some(sender) => sender.send(packet).is_ok(),
            None => false,
        }
    }

    /// Queues every `(to, packet)` pair, skipping connections that are gone.
    pub async fn send_all(&self, outbound: impl IntoIterator<Item = (ConnectionId, Packet)>) {
        let map = self.inner.read().await;
        for (to, packet) in outbound {
            match map.get(&to) {
                Some(sender) => {
                    if sender.send(packet).is_err() {
                        tracing::debug!(connection = to.0, "dropping packet for closing connection");
                    }
                }
                None => tracing::debug!(connection = to.0, "dropping packet for unknown connection"),
            }
        }
    }

    /// Number of live connections.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether no connection is live.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Application callbacks for a [`GameServer`].
///
/// Calls for one connection are sequential: `on_connect`, then every packet
/// in arrival order, then `on_disconnect` exactly once.
pub trait PacketHandler: Send + Sync + 'static {
    /// A connection was accepted and registered.
    fn on_connect(
        &self,
        id: ConnectionId,
        connections: &ConnectionMap,
    ) -> impl Future<Output = ()> + Send;

    /// A packet arrived from `id`.
    fn on_packet(
        &self,
        id: ConnectionId,
        packet: Packet,
        connections: &ConnectionMap,
    ) -> impl Future<Output = ()> + Send;

    /// The connection closed or failed. Its queue is already gone.
    fn on_disconnect(
        &self,
        id: ConnectionId,
        connections: &ConnectionMap,
    ) -> impl Future<Output = ()> + Send;
}

/// Configuration for [`GameServer`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to. Default: `0.0.0.0:9123`.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections. Default: 256.
    pub max_connections: usize,
    /// Frame limits for every connection.
    pub frame: FrameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 256,
            frame: FrameConfig::default(),
        }
    }
}

/// TCP server driving a [`PacketHandler`].
pub struct GameServer<H: PacketHandler> {
    config: ServerConfig,
    /// Live connections (public for test inspection).
    pub connections: Arc<ConnectionMap>,
    handler: Arc<H>,
    id_gen: Arc<IdGenerator>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<H: PacketHandler> GameServer<H> {
    /// Creates a server. Nothing is bound until [`GameServer::run`].
    pub fn new(config: ServerConfig, handler: Arc<H>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            connections: Arc::new(ConnectionMap::new(config.max_connections)),
            handler,
            id_gen: Arc::new(IdGenerator::new()),
            config,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// The handler.
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Binds the configured address and runs the accept loop.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Runs the accept loop on a pre-bound listener until shutdown.
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "server listening");
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!("accept failed: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!("set_nodelay failed for {peer_addr}: {e}");
                    }

                    let id = self.id_gen.next_id();
                    let (reader, writer) = stream.into_split();
                    let (tx, rx) = mpsc::unbounded_channel();

                    if self.connections.insert(id, tx).await.is_err() {
                        tracing::warn!("connection limit reached, rejecting {peer_addr}");
                        continue;
                    }
                    tracing::info!(connection = id.0, %peer_addr, "accepted connection");

                    tokio::spawn(Self::write_loop(id, writer, rx, self.config.frame.clone()));

                    let connections = Arc::clone(&self.connections);
                    let handler = Arc::clone(&self.handler);
                    let frame = self.config.frame.clone();
                    let mut task_shutdown = self.shutdown_rx.clone();
                    tokio::spawn(async move {
                        handler.on_connect(id, &connections).await;
                        Self::read_loop(id, reader, &frame, &*handler, &connections, &mut task_shutdown)
                            .await;
                        connections.remove(&id).await;
                        handler.on_disconnect(id, &connections).await;
                        tracing::info!(connection = id.0, "connection closed");
                    });
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("server shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Signals the accept loop and every connection to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn read_loop(
        id: ConnectionId,
        mut reader: OwnedReadHalf,
        frame: &FrameConfig,
        handler: &H,
        connections: &ConnectionMap,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                result = read_frame(&mut reader, frame) => {
                    let payload = match result {
                        Ok(payload) => payload,
                        Err(FrameError::ConnectionClosed) => break,
                        Err(e) => {
                            tracing::warn!(connection = id.0, "dropping connection: {e}");
                            break;
                        }
                    };
                    match decode_packet(&payload) {
                        Ok(packet) => {
                            tracing::trace!(connection = id.0, kind = packet.kind(), "received");
                            handler.on_packet(id, packet, connections).await;
                        }
                        Err(e) => {
                            tracing::warn!(connection = id.0, "malformed packet ignored: {e}");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn write_loop(
        id: ConnectionId,
        mut writer: OwnedWriteHalf,
        mut rx: mpsc::UnboundedReceiver<Packet>,
        frame: FrameConfig,
    ) {
        while let Some(packet) = rx.recv().await {
            let payload = match encode_packet(&packet) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(connection = id.0, kind = packet.kind(), "encode failed: {e}");
                    continue;
                }
            };
            if let Err(e) = write_frame(&mut writer, &payload, &frame).await {
                tracing::debug!(connection = id.0, "write failed: {e}");
                break;
            }
        }
    }
}
