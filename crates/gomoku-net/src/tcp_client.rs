//! TCP client for a gomoku server.
//!
//! [`GameClient::connect`] returns the client handle plus a receiver of
//! [`ClientEvent`]s. Outgoing packets go through an unbounded queue drained by
//! a writer task, so [`GameClient::send`] never blocks and can be called from
//! synchronous code. State changes are published on a [`watch`] channel.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};

use crate::framing::{FrameConfig, FrameError, read_frame, write_frame};
use crate::packet::{Packet, decode_packet, encode_packet};

/// Default bound on the TCP connect.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// TCP connect in progress.
    Connecting,
    /// Connected and exchanging packets.
    Connected,
    /// Closed by either side, or never connected.
    Disconnected,
}

/// Observable connection state backed by a [`watch`] channel.
pub struct ConnectionStateWatch {
    tx: watch::Sender<ConnectionState>,
    rx: watch::Receiver<ConnectionState>,
}

impl Default for ConnectionStateWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateWatch {
    /// Starts out [`ConnectionState::Disconnected`].
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx, rx }
    }

    /// Publishes a new state.
    pub fn set(&self, state: ConnectionState) {
        let _ = self.tx.send(state);
    }

    /// New subscriber.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.rx.clone()
    }

    /// Current state.
    pub fn current(&self) -> ConnectionState {
        *self.rx.borrow()
    }
}

/// Errors from connecting or sending.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server did not accept within the timeout.
    #[error("connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Target address.
        addr: SocketAddr,
        /// Bound that expired.
        timeout: Duration,
    },

    /// Socket error while connecting.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection is already closed.
    #[error("not connected")]
    NotConnected,
}

/// What the reader task reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A packet from the server.
    Packet(Packet),
    /// The connection ended. Always the last event.
    Disconnected,
}

/// Handle to a live server connection.
pub struct GameClient {
    outgoing: mpsc::UnboundedSender<Packet>,
    state: Arc<ConnectionStateWatch>,
    shutdown_tx: watch::Sender<bool>,
}

impl GameClient {
    /// Connects to `addr`, giving up after `timeout`.
    pub async fn connect(
        addr: SocketAddr,
        timeout: Duration,
        frame: FrameConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ClientEvent>), ClientError> {
        let state = Arc::new(ConnectionStateWatch::new());
        state.set(ConnectionState::Connecting);

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                state.set(ConnectionState::Disconnected);
                return Err(e.into());
            }
            Err(_) => {
                state.set(ConnectionState::Disconnected);
                return Err(ClientError::ConnectTimeout { addr, timeout });
            }
        };
        stream.set_nodelay(true)?;
        state.set(ConnectionState::Connected);
        tracing::info!(%addr, "connected to server");

        let (reader, writer) = stream.into_split();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let reader_state = Arc::clone(&state);
        let reader_frame = frame.clone();
        let mut reader_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            Self::read_loop(reader, &reader_frame, &events_tx, &mut reader_shutdown).await;
            reader_state.set(ConnectionState::Disconnected);
            let _ = events_tx.send(ClientEvent::Disconnected);
        });

        let mut writer_shutdown = shutdown_rx;
        tokio::spawn(async move {
            Self::write_loop(writer, outgoing_rx, &frame, &mut writer_shutdown).await;
        });

        Ok((
            Self {
                outgoing,
                state,
                shutdown_tx,
            },
            events_rx,
        ))
    }

    /// Connection state watch.
    pub fn state(&self) -> &Arc<ConnectionStateWatch> {
        &self.state
    }

    /// Queues a packet for the server.
    pub fn send(&self, packet: Packet) -> Result<(), ClientError> {
        if self.state.current() == ConnectionState::Disconnected {
            return Err(ClientError::NotConnected);
        }
        self.outgoing
            .send(packet)
            .map_err(|_| ClientError::NotConnected)
    }

    /// Stops both tasks. The reader emits [`ClientEvent::Disconnected`].
    pub fn disconnect(&self) {
        let _ = self.shutdown_tx.send(true);
        self.state.set(ConnectionState::Disconnected);
    }

    async fn read_loop(
        mut reader: OwnedReadHalf,
        frame: &FrameConfig,
        events: &mpsc::UnboundedSender<ClientEvent>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                result = read_frame(&mut reader, frame) => {
                    let payload = match result {
                        Ok(payload) => payload,
                        Err(FrameError::ConnectionClosed) => {
                            tracing::info!("server closed the connection");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!("connection lost: {e}");
                            break;
                        }
                    };
                    match decode_packet(&payload) {
                        Ok(packet) => {
                            if events.send(ClientEvent::Packet(packet)).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("malformed packet from server ignored: {e}"),
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
        mut writer: OwnedWriteHalf,
        mut rx: mpsc::UnboundedReceiver<Packet>,
        frame: &FrameConfig,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                next = rx.recv() => {
                    let Some(packet) = next else { break };
                    let payload = match encode_packet(&packet) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::error!(kind = packet.kind(), "encode failed: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = write_frame(&mut writer, &payload, frame).await {
                        tracing::warn!("send failed: {e}");
                        break;
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
}
