//! Client-side prediction for one match.
//!
//! Local moves are applied to a local [`MatchState`] at once and sent to the
//! server afterwards. The server either relays them to the other participants
//! or answers with an authoritative board, which replaces the local one
//! verbatim. Nothing here does I/O: outgoing packets collect in an outbox and
//! user-facing messages in a notice queue, both drained by the owner.

use gomoku_board::{Color, GameConfig, Grid};
use gomoku_game::{GameAction, MatchEvent, MatchState, Outcome};
use gomoku_net::{InitialServerData, MatchId, Packet, Request};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// When a local move is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfirmMode {
    /// Send on the first click.
    #[default]
    Immediate,
    /// First click previews, a second click on the same cell sends.
    TwoStep,
}

/// Something the UI should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiNotice {
    /// A refused move or request.
    Error(String),
    /// Informational, e.g. the match result.
    Info(String),
    /// The connection is gone. Emitted once.
    Disconnected,
}

// ---------------------------------------------------------------------------
// ClientPredictor
// ---------------------------------------------------------------------------

/// Local view of a match plus the optimistic move pipeline.
#[derive(Debug, Default)]
pub struct ClientPredictor {
    mode: ConfirmMode,
    state: Option<MatchState>,
    local_color: Color,
    match_id: Option<MatchId>,
    player_names: Vec<String>,
    games: Vec<(MatchId, String)>,
    single_game_server: bool,
    pending: Option<GameAction>,
    outbox: Vec<Packet>,
    notices: Vec<UiNotice>,
    disconnected: bool,
}

impl ClientPredictor {
    /// A predictor not yet in any match.
    pub fn new(mode: ConfirmMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    // --- Accessors ---

    /// Local match state, once joined.
    pub fn state(&self) -> Option<&MatchState> {
        self.state.as_ref()
    }

    /// Color this client plays, `Empty` for spectators or before joining.
    pub fn local_color(&self) -> Color {
        self.local_color
    }

    /// Joined match.
    pub fn match_id(&self) -> Option<MatchId> {
        self.match_id
    }

    /// Latest roster: seat one, seat two, then spectators.
    pub fn player_names(&self) -> &[String] {
        &self.player_names
    }

    /// Latest lobby listing.
    pub fn games(&self) -> &[(MatchId, String)] {
        &self.games
    }

    /// Whether the server announced single-game mode.
    pub fn is_single_game_server(&self) -> bool {
        self.single_game_server
    }

    /// Unconfirmed two-step move, if any.
    pub fn pending(&self) -> Option<&GameAction> {
        self.pending.as_ref()
    }

    /// Confirmation mode.
    pub fn confirm_mode(&self) -> ConfirmMode {
        self.mode
    }

    /// Switches confirmation mode, dropping any pending preview.
    pub fn set_confirm_mode(&mut self, mode: ConfirmMode) {
        self.cancel_pending();
        self.mode = mode;
    }

    /// Joined without a seat.
    pub fn is_spectator(&self) -> bool {
        self.state.is_some() && !self.local_color.is_player()
    }

    /// Joined, seated, match running, and our color to move.
    pub fn is_my_turn(&self) -> bool {
        self.state.as_ref().is_some_and(|state| {
            self.local_color.is_player()
                && !state.is_game_over()
                && state.current_turn() == self.local_color
        })
    }

    // --- Queues ---

    /// Takes packets waiting to be sent.
    pub fn drain_outbox(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.outbox)
    }

    /// Takes notices waiting to be shown.
    pub fn drain_notices(&mut self) -> Vec<UiNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Takes board/turn/result changes for the renderer.
    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        self.state
            .as_mut()
            .map(MatchState::drain_events)
            .unwrap_or_default()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.notices.push(UiNotice::Error(message.into()));
    }

    fn info(&mut self, message: impl Into<String>) {
        self.notices.push(UiNotice::Info(message.into()));
    }

    // --- Lobby requests ---

    /// Queues the opening handshake.
    pub fn handshake(&mut self, player_name: &str) {
        self.outbox.push(Packet::HandshakeClient {
            player_name: player_name.to_string(),
        });
    }

    /// Queues a display name change.
    pub fn set_name(&mut self, player_name: &str) {
        self.outbox.push(Packet::InitialClientData {
            player_name: player_name.to_string(),
        });
    }

    /// Queues a lobby listing request.
    pub fn request_game_list(&mut self) {
        self.outbox.push(Packet::Request(Request::GetGameList));
    }

    /// Queues creation of a new match.
    pub fn create_game(&mut self, config: GameConfig) {
        self.outbox.push(Packet::CreateGame { config });
    }

    /// Queues a join request.
    pub fn join_game(&mut self, match_id: MatchId) {
        self.outbox.push(Packet::JoinGame { match_id });
    }

    /// Leaves the current match and forgets its state.
    pub fn leave_game(&mut self) {
        if self.state.is_none() {
            return;
        }
        self.outbox.push(Packet::Request(Request::LeaveGame));
        self.state = None;
        self.pending = None;
        self.match_id = None;
        self.local_color = Color::Empty;
        self.player_names.clear();
    }

    /// Asks the server to reset the board.
    pub fn clear_board(&mut self) {
        self.outbox.push(Packet::Request(Request::ClearBoard));
    }

    /// Asks the server for an authoritative board.
    pub fn request_resync(&mut self) {
        self.outbox.push(Packet::Request(Request::UpdateBoard));
    }

    // --- Local input ---

    /// Handles a click on cell `(x, y)`.
    pub fn on_local_input(&mut self, x: i32, y: i32) {
        let Some(state) = self.state.as_ref() else {
            self.error("not in a game");
            return;
        };
        if !self.local_color.is_player() {
            self.error("spectators cannot play");
            return;
        }
        if state.is_game_over() {
            self.error("the game is over");
            return;
        }
        if state.current_turn() != self.local_color {
            self.error("not your turn");
            return;
        }

        if let Some(pending) = self.pending.as_ref() {
            if pending.position() == (x, y) {
                self.commit_pending();
                return;
            }
            self.cancel_pending();
        }

        let Some(state) = self.state.as_mut() else {
            return;
        };
        let mut action = GameAction::place(self.local_color, x, y);
        if let Err(e) = action.do_action(state) {
            self.error(e.to_string());
            return;
        }

        match self.mode {
            ConfirmMode::Immediate => self.confirm_and_send(action),
            ConfirmMode::TwoStep => self.pending = Some(action),
        }
    }

    /// Confirms and sends the previewed move.
    pub fn commit_pending(&mut self) {
        if let Some(action) = self.pending.take() {
            self.confirm_and_send(action);
        }
    }

    /// Undoes the previewed move, if any.
    pub fn cancel_pending(&mut self) {
        let Some(mut action) = self.pending.take() else {
            return;
        };
        if let Some(state) = self.state.as_mut()
            && let Err(e) = action.undo_action(state)
        {
            tracing::warn!("undo of pending move failed: {e}");
            self.request_resync();
        }
    }

    fn confirm_and_send(&mut self, mut action: GameAction) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if let Err(e) = action.confirm_action(state) {
            tracing::error!("local confirm failed: {e}");
            self.request_resync();
            return;
        }
        self.outbox.push(Packet::GameAction(action));
    }

    // --- Server input ---

    /// Applies a move relayed by the server. A move that does not fit the
    /// local board means we diverged, so ask for the authoritative one.
    pub fn on_remote_action(&mut self, mut action: GameAction) {
        self.cancel_pending();
        let Some(state) = self.state.as_mut() else {
            tracing::warn!("remote action before joining a match ignored");
            return;
        };
        let result = action
            .do_action(state)
            .and_then(|()| action.confirm_action(state));
        if let Err(e) = result {
            tracing::warn!("remote action rejected locally ({e}), requesting board");
            self.request_resync();
        }
    }

    /// Replaces the local board and game-over flag with the server's. Any
    /// locally predicted result the server does not share is dropped.
    pub fn on_snapshot(&mut self, grid: Grid, game_over: bool) {
        self.pending = None;
        let Some(state) = self.state.as_mut() else {
            tracing::warn!("board snapshot before joining a match ignored");
            return;
        };
        if let Err(e) = state.apply_snapshot(grid, game_over) {
            tracing::error!("unusable board snapshot: {e}");
            self.error(e.to_string());
        }
    }

    fn on_initial_data(&mut self, data: InitialServerData) {
        let InitialServerData {
            grid,
            config,
            assigned_player,
            current_turn,
            player_names,
            seat_one_color,
            seat_two_color,
            match_id,
            game_over,
        } = data;

        match MatchState::from_parts(config, grid, current_turn, game_over) {
            Ok(mut state) => {
                if let Some(name) = player_names.first() {
                    state.set_player_name(seat_one_color, name.clone());
                }
                if let Some(name) = player_names.get(1) {
                    state.set_player_name(seat_two_color, name.clone());
                }
                tracing::info!(%match_id, color = %assigned_player, "joined match");
                self.state = Some(state);
                self.pending = None;
                self.local_color = assigned_player;
                self.match_id = Some(match_id);
                self.player_names = player_names;
            }
            Err(e) => {
                tracing::error!("bad initial match data: {e}");
                self.error(e.to_string());
            }
        }
    }

    fn on_player_list(&mut self, names: Vec<String>) {
        if let Some(state) = self.state.as_mut() {
            let (one, two) = (state.player_one().color, state.player_two().color);
            if let Some(name) = names.first() {
                state.set_player_name(one, name.clone());
            }
            if let Some(name) = names.get(1) {
                state.set_player_name(two, name.clone());
            }
        }
        self.player_names = names;
    }

    fn on_victory(&mut self, winner: Option<Color>) {
        self.cancel_pending();
        let outcome = winner.map_or(Outcome::Draw, Outcome::Winner);
        if let Some(state) = self.state.as_mut() {
            state.finish(outcome);
        }
        let message = match winner {
            Some(color) if color == self.local_color => "you win".to_string(),
            Some(color) => format!("{color} wins"),
            None => "draw".to_string(),
        };
        self.info(message);
    }

    /// Records that the connection is gone. Only the first call has effect.
    pub fn on_disconnected(&mut self) {
        if !self.disconnected {
            self.disconnected = true;
            self.pending = None;
            self.notices.push(UiNotice::Disconnected);
        }
    }

    /// The connection never came up. Queued packets are discarded.
    pub fn on_connect_failed(&mut self, reason: String) {
        self.outbox.clear();
        self.error(reason);
        self.on_disconnected();
    }

    /// Dispatches one packet from the server.
    pub fn on_packet(&mut self, packet: Packet) {
        match packet {
            Packet::HandshakeServer {
                single_game_server,
                ready,
            } => {
                self.single_game_server = single_game_server;
                if !ready {
                    self.error("server is not ready");
                } else if single_game_server {
                    self.outbox
                        .push(Packet::Request(Request::JoinSingleGameServer));
                } else {
                    self.request_game_list();
                }
            }
            Packet::InitialServerData(data) => self.on_initial_data(data),
            Packet::GameAction(action) => self.on_remote_action(action),
            Packet::BoardSnapshot {
                grid, game_over, ..
            } => self.on_snapshot(grid, game_over),
            Packet::NotifyTurn { color } => {
                if let Some(state) = self.state.as_mut() {
                    state.set_turn(color);
                }
            }
            Packet::PlayerList { names } => self.on_player_list(names),
            Packet::Victory { winner } => self.on_victory(winner),
            Packet::GameList { ids, names } => {
                self.games = ids.into_iter().zip(names).collect();
            }
            Packet::ServerNotice { message } => self.error(message),
            Packet::HandshakeClient { .. }
            | Packet::InitialClientData { .. }
            | Packet::CreateGame { .. }
            | Packet::JoinGame { .. }
            | Packet::Request(_) => {
                tracing::warn!(kind = packet.kind(), "client-only packet from server ignored");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(mode: ConfirmMode, color: Color) -> ClientPredictor {
        let mut p = ClientPredictor::new(mode);
        p.on_packet(Packet::InitialServerData(InitialServerData {
            grid: Grid::new(15, 15).unwrap(),
            config: GameConfig::default(),
            assigned_player: color,
            current_turn: Color::Black,
            player_names: vec!["alice".into(), "bob".into()],
            seat_one_color: Color::Black,
            seat_two_color: Color::White,
            match_id: MatchId(1),
            game_over: false,
        }));
        p.drain_events();
        p
    }

    fn sent_actions(p: &mut ClientPredictor) -> Vec<GameAction> {
        p.drain_outbox()
            .into_iter()
            .filter_map(|packet| match packet {
                Packet::GameAction(action) => Some(action),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_immediate_move_applied_and_sent() {
        let mut p = joined(ConfirmMode::Immediate, Color::Black);
        assert!(p.is_my_turn());
        p.on_local_input(7, 7);

        assert_eq!(p.state().unwrap().grid().get_cell(7, 7), Color::Black);
        assert_eq!(p.state().unwrap().current_turn(), Color::White);
        assert_eq!(sent_actions(&mut p), vec![GameAction::place(Color::Black, 7, 7)]);
        assert!(p.drain_notices().is_empty());
    }

    #[test]
    fn test_not_my_turn_only_notifies() {
        let mut p = joined(ConfirmMode::Immediate, Color::White);
        p.on_local_input(7, 7);
        assert_eq!(p.drain_notices(), vec![UiNotice::Error("not your turn".into())]);
        assert!(p.drain_outbox().is_empty());
        assert_eq!(p.state().unwrap().grid().occupied(), 0);
    }

    #[test]
    fn test_spectator_cannot_play() {
        let mut p = joined(ConfirmMode::Immediate, Color::Empty);
        assert!(p.is_spectator());
        p.on_local_input(0, 0);
        assert_eq!(
            p.drain_notices(),
            vec![UiNotice::Error("spectators cannot play".into())]
        );
        assert!(p.drain_outbox().is_empty());
    }

    #[test]
    fn test_input_before_join_is_refused() {
        let mut p = ClientPredictor::new(ConfirmMode::Immediate);
        p.on_local_input(0, 0);
        assert_eq!(p.drain_notices().len(), 1);
    }

    #[test]
    fn test_illegal_local_move_reports_error() {
        let mut p = joined(ConfirmMode::Immediate, Color::Black);
        p.on_local_input(20, 0);
        let notices = p.drain_notices();
        assert!(matches!(&notices[..], [UiNotice::Error(msg)] if msg.contains("outside")));
        assert!(p.drain_outbox().is_empty());
    }

    #[test]
    fn test_two_step_same_cell_confirms() {
        let mut p = joined(ConfirmMode::TwoStep, Color::Black);
        p.on_local_input(3, 3);
        assert!(p.pending().is_some());
        assert_eq!(p.state().unwrap().grid().get_cell(3, 3), Color::Black);
        assert!(sent_actions(&mut p).is_empty());

        p.on_local_input(3, 3);
        assert!(p.pending().is_none());
        assert_eq!(sent_actions(&mut p), vec![GameAction::place(Color::Black, 3, 3)]);
        assert_eq!(p.state().unwrap().current_turn(), Color::White);
    }

    #[test]
    fn test_two_step_other_cell_moves_preview() {
        let mut p = joined(ConfirmMode::TwoStep, Color::Black);
        p.on_local_input(3, 3);
        p.on_local_input(4, 4);
        let grid = p.state().unwrap().grid();
        assert_eq!(grid.get_cell(3, 3), Color::Empty);
        assert_eq!(grid.get_cell(4, 4), Color::Black);
        assert_eq!(p.pending().unwrap().position(), (4, 4));
    }

    #[test]
    fn test_cancel_pending_restores_board() {
        let mut p = joined(ConfirmMode::TwoStep, Color::Black);
        let before = p.state().unwrap().grid().clone();
        p.on_local_input(9, 9);
        p.cancel_pending();
        assert_eq!(p.state().unwrap().grid(), &before);
        assert!(p.drain_outbox().is_empty());
    }

    #[test]
    fn test_remote_action_applied() {
        let mut p = joined(ConfirmMode::Immediate, Color::White);
        p.on_packet(Packet::GameAction(GameAction::place(Color::Black, 1, 1)));
        assert_eq!(p.state().unwrap().grid().get_cell(1, 1), Color::Black);
        assert!(p.is_my_turn());
        assert!(p.drain_outbox().is_empty());
    }

    #[test]
    fn test_conflicting_remote_action_requests_resync() {
        let mut p = joined(ConfirmMode::Immediate, Color::White);
        p.on_packet(Packet::GameAction(GameAction::place(Color::Black, 1, 1)));
        p.on_packet(Packet::GameAction(GameAction::place(Color::Black, 1, 1)));
        assert_eq!(
            p.drain_outbox(),
            vec![Packet::Request(Request::UpdateBoard)]
        );
    }

    #[test]
    fn test_snapshot_replaces_prediction() {
        let mut p = joined(ConfirmMode::Immediate, Color::Black);
        p.on_local_input(2, 2);
        let mut authoritative = Grid::new(15, 15).unwrap();
        authoritative.set_cell(8, 8, Color::White).unwrap();

        p.on_packet(Packet::snapshot(&authoritative, false));
        p.on_packet(Packet::NotifyTurn {
            color: Color::Black,
        });
        assert_eq!(p.state().unwrap().grid(), &authoritative);
        assert!(p.is_my_turn());
    }

    fn play_black_win(p: &mut ClientPredictor) {
        for i in 0..4 {
            p.on_local_input(i, 0);
            p.on_packet(Packet::GameAction(GameAction::place(Color::White, i, 1)));
        }
        p.on_local_input(4, 0);
        p.on_packet(Packet::Victory {
            winner: Some(Color::Black),
        });
        p.drain_outbox();
        p.drain_notices();
    }

    #[test]
    fn test_board_clear_after_victory_resumes_play() {
        let mut p = joined(ConfirmMode::Immediate, Color::Black);
        play_black_win(&mut p);
        assert!(p.state().unwrap().is_game_over());

        let cleared = Grid::new(15, 15).unwrap();
        p.on_packet(Packet::snapshot(&cleared, false));
        p.on_packet(Packet::NotifyTurn {
            color: Color::Black,
        });
        assert!(p.is_my_turn());
        assert_eq!(p.state().unwrap().outcome(), None);

        p.on_local_input(7, 7);
        assert!(p.drain_notices().is_empty());
        assert_eq!(sent_actions(&mut p), vec![GameAction::place(Color::Black, 7, 7)]);
        assert_eq!(p.state().unwrap().grid().get_cell(7, 7), Color::Black);
    }

    #[test]
    fn test_rejected_winning_prediction_rolled_back() {
        let mut p = joined(ConfirmMode::Immediate, Color::Black);
        for i in 0..4 {
            p.on_local_input(i, 0);
            p.on_packet(Packet::GameAction(GameAction::place(Color::White, i, 1)));
        }
        // The server already had White on (4, 0).
        let mut authoritative = p.state().unwrap().grid().clone();
        p.on_local_input(4, 0);
        assert!(p.state().unwrap().is_game_over());

        authoritative.set_cell(4, 0, Color::White).unwrap();
        p.on_packet(Packet::snapshot(&authoritative, false));
        p.on_packet(Packet::NotifyTurn {
            color: Color::Black,
        });
        let state = p.state().unwrap();
        assert!(!state.is_game_over());
        assert_eq!(state.grid().get_cell(4, 0), Color::White);
        assert!(p.is_my_turn());
    }

    #[test]
    fn test_game_over_snapshot_blocks_input() {
        let mut p = joined(ConfirmMode::Immediate, Color::Black);
        p.on_packet(Packet::snapshot(&Grid::new(15, 15).unwrap(), true));
        p.on_local_input(0, 0);
        assert_eq!(
            p.drain_notices(),
            vec![UiNotice::Error("the game is over".into())]
        );
        assert!(p.drain_outbox().is_empty());
    }

    #[test]
    fn test_victory_ends_match() {
        let mut p = joined(ConfirmMode::TwoStep, Color::White);
        p.on_packet(Packet::Victory {
            winner: Some(Color::Black),
        });
        let state = p.state().unwrap();
        assert!(state.is_game_over());
        assert_eq!(state.outcome(), Some(Outcome::Winner(Color::Black)));
        assert_eq!(p.drain_notices(), vec![UiNotice::Info("black wins".into())]);
        assert!(!p.is_my_turn());
    }

    #[test]
    fn test_handshake_reply_drives_lobby() {
        let mut single = ClientPredictor::new(ConfirmMode::Immediate);
        single.on_packet(Packet::HandshakeServer {
            single_game_server: true,
            ready: true,
        });
        assert_eq!(
            single.drain_outbox(),
            vec![Packet::Request(Request::JoinSingleGameServer)]
        );

        let mut multi = ClientPredictor::new(ConfirmMode::Immediate);
        multi.on_packet(Packet::HandshakeServer {
            single_game_server: false,
            ready: true,
        });
        assert_eq!(multi.drain_outbox(), vec![Packet::Request(Request::GetGameList)]);
        multi.on_packet(Packet::GameList {
            ids: vec![MatchId(4)],
            names: vec!["friday".into()],
        });
        assert_eq!(multi.games(), &[(MatchId(4), "friday".to_string())]);
    }

    #[test]
    fn test_disconnect_notice_once() {
        let mut p = joined(ConfirmMode::Immediate, Color::Black);
        p.on_disconnected();
        p.on_disconnected();
        assert_eq!(p.drain_notices(), vec![UiNotice::Disconnected]);
    }

    #[test]
    fn test_leave_forgets_match() {
        let mut p = joined(ConfirmMode::Immediate, Color::Black);
        p.leave_game();
        assert!(p.state().is_none());
        assert_eq!(p.local_color(), Color::Empty);
        assert_eq!(p.drain_outbox(), vec![Packet::Request(Request::LeaveGame)]);
    }

    #[test]
    fn test_events_follow_moves() {
        let mut p = joined(ConfirmMode::Immediate, Color::Black);
        p.on_local_input(0, 0);
        let events = p.drain_events();
        assert!(events.contains(&MatchEvent::TurnChanged(Color::White)));
        assert!(events.iter().any(|e| matches!(e, MatchEvent::CellChanged(c) if c.x == 0 && c.y == 0)));
    }
}
