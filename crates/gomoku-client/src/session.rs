//! A connected client: network link plus predictor, advanced once per frame.

use std::time::Duration;

use gomoku_config::ClientSettings;
use gomoku_game::MatchEvent;
use gomoku_net::FrameConfig;

use crate::link::{LinkConfig, LinkError, LinkEvent, NetworkLink};
use crate::predictor::{ClientPredictor, ConfirmMode, UiNotice};

/// What one [`ClientSession::tick`] produced for the UI.
#[derive(Debug, Default)]
pub struct TickOutput {
    /// Board, turn and result changes.
    pub events: Vec<MatchEvent>,
    /// Messages for the player.
    pub notices: Vec<UiNotice>,
}

/// Owns the connection and the local match view.
pub struct ClientSession {
    link: NetworkLink,
    predictor: ClientPredictor,
    player_name: String,
}

impl ClientSession {
    /// Starts connecting with `settings` and queues the handshake.
    pub fn connect(settings: &ClientSettings) -> Result<Self, LinkError> {
        let link = NetworkLink::connect(LinkConfig {
            host: settings.server_address.clone(),
            port: settings.server_port,
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            frame: FrameConfig::default(),
        })?;
        let mode = if settings.confirm_moves {
            ConfirmMode::TwoStep
        } else {
            ConfirmMode::Immediate
        };

        let mut session = Self {
            link,
            predictor: ClientPredictor::new(mode),
            player_name: settings.player_name.clone(),
        };
        session.predictor.handshake(&settings.player_name);
        session.flush();
        Ok(session)
    }

    /// Local match view.
    pub fn predictor(&self) -> &ClientPredictor {
        &self.predictor
    }

    /// Mutable access for lobby requests and input. Queued packets go out on
    /// the next [`tick`](Self::tick).
    pub fn predictor_mut(&mut self) -> &mut ClientPredictor {
        &mut self.predictor
    }

    /// Name sent in the handshake.
    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    /// Forwards a board click.
    pub fn on_local_input(&mut self, x: i32, y: i32) {
        self.predictor.on_local_input(x, y);
        self.flush();
    }

    /// Applies everything the network delivered since the last call and
    /// sends whatever the predictor queued in response.
    pub fn tick(&mut self) -> TickOutput {
        for event in self.link.drain_events() {
            self.apply(event);
        }
        self.flush();
        TickOutput {
            events: self.predictor.drain_events(),
            notices: self.predictor.drain_notices(),
        }
    }

    /// Like [`tick`](Self::tick), but waits up to `timeout` for the first
    /// event. Useful for headless callers.
    pub fn tick_blocking(&mut self, timeout: Duration) -> TickOutput {
        if let Some(event) = self.link.recv_timeout(timeout) {
            self.apply(event);
        }
        self.tick()
    }

    fn apply(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected(addr) => tracing::info!(%addr, "link up"),
            LinkEvent::Packet(packet) => self.predictor.on_packet(packet),
            LinkEvent::Disconnected => self.predictor.on_disconnected(),
            LinkEvent::Failed(e) => {
                tracing::error!("could not connect: {e}");
                self.predictor.on_connect_failed(e.to_string());
            }
        }
    }

    fn flush(&mut self) {
        for packet in self.predictor.drain_outbox() {
            if let Err(e) = self.link.send(packet) {
                tracing::debug!("not sent: {e}");
            }
        }
    }

    /// Closes the connection.
    pub fn disconnect(&mut self) {
        self.link.shutdown();
        self.predictor.on_disconnected();
    }
}
