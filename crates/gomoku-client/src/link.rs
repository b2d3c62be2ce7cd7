//! Background network thread for frame-driven callers.
//!
//! The UI loop is synchronous, so the async [`GameClient`] runs on its own
//! thread with a single-threaded tokio runtime. Outgoing packets go in through
//! a tokio channel and everything that happens on the connection comes back
//! as [`LinkEvent`]s on a crossbeam channel, drained once per frame.

use std::io;
use std::net::SocketAddr;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use gomoku_net::{ClientError, ClientEvent, FrameConfig, GameClient, Packet};
use tokio::sync::mpsc;

/// Errors that end a link before or while connecting.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The network thread or its runtime could not be started.
    #[error("failed to start network runtime: {0}")]
    Runtime(#[source] io::Error),

    /// Name lookup for the server host failed.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        /// Host as configured.
        host: String,
        /// Resolver error.
        #[source]
        source: io::Error,
    },

    /// Name lookup succeeded but returned nothing.
    #[error("{host} resolved to no addresses")]
    NoAddress {
        /// Host as configured.
        host: String,
    },

    /// The TCP connect did not finish in time.
    #[error("connection to {addr} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Resolved server address.
        addr: SocketAddr,
        /// Configured connect timeout.
        timeout: Duration,
    },

    /// The TCP connect failed outright, e.g. refused.
    #[error("connect failed: {0}")]
    Connect(#[source] ClientError),

    /// The link was shut down.
    #[error("link is closed")]
    Closed,
}

impl From<ClientError> for LinkError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::ConnectTimeout { addr, timeout } => Self::ConnectTimeout { addr, timeout },
            other => Self::Connect(other),
        }
    }
}

/// Something that happened on the connection.
#[derive(Debug)]
pub enum LinkEvent {
    /// TCP connection established.
    Connected(SocketAddr),
    /// A packet from the server.
    Packet(Packet),
    /// The connection ended after being established.
    Disconnected,
    /// The connection could not be established.
    Failed(LinkError),
}

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Give up connecting after this long.
    pub connect_timeout: Duration,
    /// Frame limits.
    pub frame: FrameConfig,
}

/// Handle to the network thread.
pub struct NetworkLink {
    outgoing: Option<mpsc::UnboundedSender<Packet>>,
    events: Receiver<LinkEvent>,
    thread: Option<JoinHandle<()>>,
}

impl NetworkLink {
    /// Spawns the network thread and starts connecting. Packets sent before
    /// the connection is up are held and flushed once it is.
    pub fn connect(config: LinkConfig) -> Result<Self, LinkError> {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = crossbeam_channel::unbounded();

        let thread = std::thread::Builder::new()
            .name("gomoku-net".to_string())
            .spawn(move || run_link(config, outgoing_rx, events_tx))
            .map_err(LinkError::Runtime)?;

        Ok(Self {
            outgoing: Some(outgoing),
            events,
            thread: Some(thread),
        })
    }

    /// Queues a packet for the server.
    pub fn send(&self, packet: Packet) -> Result<(), LinkError> {
        self.outgoing
            .as_ref()
            .ok_or(LinkError::Closed)?
            .send(packet)
            .map_err(|_| LinkError::Closed)
    }

    /// Takes every event that arrived since the last call. Called once per
    /// frame on the main thread.
    pub fn drain_events(&self) -> Vec<LinkEvent> {
        self.events.try_iter().collect()
    }

    /// Blocks up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LinkEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Closes the connection and joins the network thread.
    pub fn shutdown(&mut self) {
        self.outgoing.take();
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            tracing::error!("network thread panicked");
        }
    }
}

impl Drop for NetworkLink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_link(
    config: LinkConfig,
    outgoing: mpsc::UnboundedReceiver<Packet>,
    events: Sender<LinkEvent>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = events.send(LinkEvent::Failed(LinkError::Runtime(e)));
            return;
        }
    };

    runtime.block_on(async move {
        match open(&config).await {
            Ok((addr, client, incoming)) => {
                let _ = events.send(LinkEvent::Connected(addr));
                pump(client, incoming, outgoing, &events).await;
            }
            Err(e) => {
                tracing::warn!("connection failed: {e}");
                let _ = events.send(LinkEvent::Failed(e));
            }
        }
    });
}

async fn open(
    config: &LinkConfig,
) -> Result<(SocketAddr, GameClient, mpsc::UnboundedReceiver<ClientEvent>), LinkError> {
    let addr = tokio::net::lookup_host((config.host.as_str(), config.port))
        .await
        .map_err(|source| LinkError::Resolve {
            host: config.host.clone(),
            source,
        })?
        .next()
        .ok_or_else(|| LinkError::NoAddress {
            host: config.host.clone(),
        })?;

    let (client, incoming) =
        GameClient::connect(addr, config.connect_timeout, config.frame.clone()).await?;
    Ok((addr, client, incoming))
}

async fn pump(
    client: GameClient,
    mut incoming: mpsc::UnboundedReceiver<ClientEvent>,
    mut outgoing: mpsc::UnboundedReceiver<Packet>,
    events: &Sender<LinkEvent>,
) {
    let mut local_closed = false;
    loop {
        tokio::select! {
            packet = outgoing.recv(), if !local_closed => match packet {
                Some(packet) => {
                    if let Err(e) = client.send(packet) {
                        tracing::debug!("dropping outgoing packet: {e}");
                    }
                }
                None => {
                    // Handle dropped; the reader reports Disconnected next.
                    local_closed = true;
                    client.disconnect();
                }
            },
            event = incoming.recv() => match event {
                Some(ClientEvent::Packet(packet)) => {
                    if events.send(LinkEvent::Packet(packet)).is_err() {
                        client.disconnect();
                    }
                }
                Some(ClientEvent::Disconnected) | None => {
                    let _ = events.send(LinkEvent::Disconnected);
                    break;
                }
            },
        }
    }
}
