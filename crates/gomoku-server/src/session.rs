//! One authoritative match: state, roster, and packet fan-out.
//!
//! A [`ServerSession`] never touches sockets. Every operation returns the
//! [`Outbound`] packets it wants delivered and the caller hands them to the
//! connection map. That keeps the whole game protocol testable without I/O.

use std::collections::BTreeMap;

use gomoku_board::{Color, GameConfig, GameConfigError};
use gomoku_game::{ActionError, GameAction, MatchState};
use gomoku_net::{ConnectionId, InitialServerData, MatchId, Packet};

// ---------------------------------------------------------------------------
// Roster types
// ---------------------------------------------------------------------------

/// Where a participant sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    /// Plays Black, moves first.
    One,
    /// Plays White.
    Two,
    /// Watches only.
    Spectator,
}

/// A joined participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Assigned seat.
    pub seat: Seat,
    /// Display name.
    pub name: String,
}

/// A packet addressed to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Recipient.
    pub to: ConnectionId,
    /// Payload.
    pub packet: Packet,
}

impl Outbound {
    /// Shorthand constructor.
    pub fn new(to: ConnectionId, packet: Packet) -> Self {
        Self { to, packet }
    }
}

/// Result of [`ServerSession::leave`].
#[derive(Debug, Default)]
pub struct LeaveOutcome {
    /// Seat the connection held, `None` if it was not in the session.
    pub seat: Option<Seat>,
    /// Roster updates for the remaining members.
    pub outbound: Vec<Outbound>,
    /// The roster is now empty.
    pub empty: bool,
}

/// A packet that breaks the game protocol. Logged and dropped; nothing is
/// sent back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// The connection is not part of this session.
    #[error("connection {0} is not in the session")]
    NotInSession(u64),

    /// Wrong color, or not this seat's turn.
    #[error("out of turn: seat plays {seat:?}, action is {action:?}, turn is {turn:?}")]
    OutOfTurn {
        /// Color of the sender's seat.
        seat: Color,
        /// Color named in the action.
        action: Color,
        /// Color to move.
        turn: Color,
    },

    /// The match already ended.
    #[error("match is over")]
    GameOver,

    /// Only seated players may do this.
    #[error("connection {0} has no seat")]
    NotSeated(u64),
}

// ---------------------------------------------------------------------------
// ServerSession
// ---------------------------------------------------------------------------

/// Authoritative state of one match plus who is in it.
pub struct ServerSession {
    id: MatchId,
    state: MatchState,
    roster: BTreeMap<ConnectionId, RosterEntry>,
}

impl ServerSession {
    /// Creates an empty session.
    pub fn new(id: MatchId, config: GameConfig) -> Result<Self, GameConfigError> {
        Ok(Self {
            id,
            state: MatchState::new(config)?,
            roster: BTreeMap::new(),
        })
    }

    /// Match id.
    pub fn id(&self) -> MatchId {
        self.id
    }

    /// Display name from the match rules.
    pub fn name(&self) -> &str {
        &self.state.config().name
    }

    /// Authoritative state.
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Number of joined connections.
    pub fn len(&self) -> usize {
        self.roster.len()
    }

    /// No one is joined. An empty session is terminal in multi-game mode.
    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// Seat held by `conn`.
    pub fn seat_of(&self, conn: ConnectionId) -> Option<Seat> {
        self.roster.get(&conn).map(|entry| entry.seat)
    }

    /// Color played from `seat`.
    pub fn seat_color(&self, seat: Seat) -> Color {
        match seat {
            Seat::One => self.state.player_one().color,
            Seat::Two => self.state.player_two().color,
            Seat::Spectator => Color::Empty,
        }
    }

    fn holder(&self, seat: Seat) -> Option<&RosterEntry> {
        self.roster.values().find(|entry| entry.seat == seat)
    }

    fn free_seat(&self) -> Seat {
        [Seat::One, Seat::Two]
            .into_iter()
            .find(|seat| self.holder(*seat).is_none())
            .unwrap_or(Seat::Spectator)
    }

    /// Seat one, seat two (empty when vacant), then spectators in join order
    /// of connection id.
    pub fn player_names(&self) -> Vec<String> {
        let seated = |seat| {
            self.holder(seat)
                .map(|entry| entry.name.clone())
                .unwrap_or_default()
        };
        let mut names = vec![seated(Seat::One), seated(Seat::Two)];
        names.extend(
            self.roster
                .values()
                .filter(|entry| entry.seat == Seat::Spectator)
                .map(|entry| entry.name.clone()),
        );
        names
    }

    fn to_all(&self, packet: &Packet) -> Vec<Outbound> {
        self.roster
            .keys()
            .map(|&to| Outbound::new(to, packet.clone()))
            .collect()
    }

    fn to_others(&self, origin: ConnectionId, packet: &Packet) -> Vec<Outbound> {
        self.roster
            .keys()
            .filter(|&&to| to != origin)
            .map(|&to| Outbound::new(to, packet.clone()))
            .collect()
    }

    fn roster_broadcast(&self) -> Vec<Outbound> {
        self.to_all(&Packet::PlayerList {
            names: self.player_names(),
        })
    }

    /// What a joiner needs to render the match.
    pub fn initial_data_for(&self, conn: ConnectionId) -> InitialServerData {
        let seat = self.seat_of(conn).unwrap_or(Seat::Spectator);
        InitialServerData {
            grid: self.state.grid().clone(),
            config: self.state.config().clone(),
            assigned_player: self.seat_color(seat),
            current_turn: self.state.current_turn(),
            player_names: self.player_names(),
            seat_one_color: self.seat_color(Seat::One),
            seat_two_color: self.seat_color(Seat::Two),
            match_id: self.id,
            game_over: self.state.is_game_over(),
        }
    }

    /// Adds `conn` to the first free seat, or as a spectator.
    pub fn join(&mut self, conn: ConnectionId, name: &str) -> (Seat, Vec<Outbound>) {
        let seat = self.free_seat();
        self.roster.insert(
            conn,
            RosterEntry {
                seat,
                name: name.to_string(),
            },
        );
        if seat != Seat::Spectator {
            self.state.set_player_name(self.seat_color(seat), name);
        }
        tracing::info!(match_id = self.id.0, connection = conn.0, ?seat, name, "joined match");

        let mut out = vec![Outbound::new(
            conn,
            Packet::InitialServerData(self.initial_data_for(conn)),
        )];
        out.extend(self.roster_broadcast());
        (seat, out)
    }

    /// Removes `conn`. A freed seat stays open for the next joiner and the
    /// game continues.
    pub fn leave(&mut self, conn: ConnectionId) -> LeaveOutcome {
        let Some(entry) = self.roster.remove(&conn) else {
            return LeaveOutcome {
                empty: self.roster.is_empty(),
                ..LeaveOutcome::default()
            };
        };
        if entry.seat != Seat::Spectator {
            self.state.set_player_name(self.seat_color(entry.seat), "");
        }
        tracing::info!(
            match_id = self.id.0,
            connection = conn.0,
            seat = ?entry.seat,
            remaining = self.roster.len(),
            "left match"
        );
        LeaveOutcome {
            seat: Some(entry.seat),
            outbound: self.roster_broadcast(),
            empty: self.roster.is_empty(),
        }
    }

    /// Validates and applies a player's action.
    ///
    /// An illegal placement is answered privately with the authoritative board
    /// and turn. A legal one is relayed to every other member, followed by
    /// `Victory` to everyone if it ended the match.
    pub fn handle_action(
        &mut self,
        conn: ConnectionId,
        action: GameAction,
    ) -> Result<Vec<Outbound>, ProtocolViolation> {
        let seat = self
            .seat_of(conn)
            .ok_or(ProtocolViolation::NotInSession(conn.0))?;
        if seat == Seat::Spectator {
            tracing::debug!(match_id = self.id.0, connection = conn.0, "spectator action ignored");
            return Ok(Vec::new());
        }
        if self.state.is_game_over() {
            return Err(ProtocolViolation::GameOver);
        }
        let seat_color = self.seat_color(seat);
        let turn = self.state.current_turn();
        if action.color() != seat_color || seat_color != turn {
            return Err(ProtocolViolation::OutOfTurn {
                seat: seat_color,
                action: action.color(),
                turn,
            });
        }

        // Rebuilt from color and position so the sender's phase is ignored.
        let (x, y) = action.position();
        let mut applied = GameAction::place(seat_color, x, y);
        if let Err(e) = applied.do_action(&mut self.state) {
            match e {
                ActionError::Illegal(ref illegal) => {
                    tracing::warn!(match_id = self.id.0, connection = conn.0, "rejected: {illegal}");
                }
                ref other => {
                    tracing::error!(match_id = self.id.0, connection = conn.0, "apply failed: {other}");
                }
            }
            return Ok(self.resync_for(conn));
        }

        let outcome = match applied.confirm_action(&mut self.state) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(match_id = self.id.0, "confirm failed after apply: {e}");
                if let Err(e) = applied.undo_action(&mut self.state) {
                    tracing::error!(match_id = self.id.0, "rollback failed: {e}");
                }
                return Ok(self.resync_for(conn));
            }
        };
        self.state.drain_events();

        tracing::debug!(match_id = self.id.0, ?seat_color, x, y, "action applied");

        let relay = GameAction::place(seat_color, x, y);
        let mut out = self.to_others(conn, &Packet::GameAction(relay));
        if let Some(outcome) = outcome {
            tracing::info!(match_id = self.id.0, ?outcome, "match finished");
            out.extend(self.to_all(&Packet::Victory {
                winner: outcome.winner(),
            }));
        }
        Ok(out)
    }

    fn snapshot(&self) -> Packet {
        Packet::snapshot(self.state.grid(), self.state.is_game_over())
    }

    /// Authoritative board followed by the turn, for `conn` only.
    pub fn resync_for(&self, conn: ConnectionId) -> Vec<Outbound> {
        vec![
            Outbound::new(conn, self.snapshot()),
            self.turn_for(conn),
        ]
    }

    /// Current turn, for `conn`.
    pub fn turn_for(&self, conn: ConnectionId) -> Outbound {
        Outbound::new(
            conn,
            Packet::NotifyTurn {
                color: self.state.current_turn(),
            },
        )
    }

    /// Roster, for `conn`.
    pub fn player_list_for(&self, conn: ConnectionId) -> Outbound {
        Outbound::new(
            conn,
            Packet::PlayerList {
                names: self.player_names(),
            },
        )
    }

    /// Clears the board on behalf of a seated player and tells everyone.
    pub fn clear_board(&mut self, conn: ConnectionId) -> Result<Vec<Outbound>, ProtocolViolation> {
        match self.seat_of(conn) {
            None => Err(ProtocolViolation::NotInSession(conn.0)),
            Some(Seat::Spectator) => Err(ProtocolViolation::NotSeated(conn.0)),
            Some(_) => {
                self.reset();
                tracing::info!(match_id = self.id.0, connection = conn.0, "board cleared");
                let mut out = self.to_all(&self.snapshot());
                out.extend(self.to_all(&Packet::NotifyTurn {
                    color: self.state.current_turn(),
                }));
                Ok(out)
            }
        }
    }

    /// Starts the match over with the same rules and roster.
    pub fn reset(&mut self) {
        self.state.reset();
        self.state.drain_events();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gomoku_game::Outcome;

    const A: ConnectionId = ConnectionId(1);
    const B: ConnectionId = ConnectionId(2);
    const C: ConnectionId = ConnectionId(3);

    fn session() -> ServerSession {
        ServerSession::new(MatchId(1), GameConfig::default()).unwrap()
    }

    fn seated() -> ServerSession {
        let mut s = session();
        s.join(A, "alice");
        s.join(B, "bob");
        s
    }

    fn place(s: &mut ServerSession, conn: ConnectionId, color: Color, x: i32, y: i32) -> Vec<Outbound> {
        s.handle_action(conn, GameAction::place(color, x, y)).unwrap()
    }

    fn recipients(out: &[Outbound]) -> Vec<ConnectionId> {
        out.iter().map(|o| o.to).collect()
    }

    #[test]
    fn test_seats_assigned_in_order() {
        let mut s = session();
        assert_eq!(s.join(A, "alice").0, Seat::One);
        assert_eq!(s.join(B, "bob").0, Seat::Two);
        assert_eq!(s.join(C, "carol").0, Seat::Spectator);
        assert_eq!(s.player_names(), vec!["alice", "bob", "carol"]);
        assert_eq!(s.seat_color(Seat::One), Color::Black);
    }

    #[test]
    fn test_join_sends_initial_data_then_roster() {
        let mut s = session();
        s.join(A, "alice");
        let (_, out) = s.join(B, "bob");

        match &out[0] {
            Outbound {
                to,
                packet: Packet::InitialServerData(data),
            } => {
                assert_eq!(*to, B);
                assert_eq!(data.assigned_player, Color::White);
                assert_eq!(data.current_turn, Color::Black);
                assert_eq!(data.match_id, MatchId(1));
                assert!(!data.game_over);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(recipients(&out[1..]), vec![A, B]);
        assert!(out[1..]
            .iter()
            .all(|o| matches!(&o.packet, Packet::PlayerList { names } if names == &["alice", "bob"])));
    }

    #[test]
    fn test_legal_action_relayed_to_others() {
        let mut s = seated();
        s.join(C, "carol");
        let out = place(&mut s, A, Color::Black, 7, 7);
        assert_eq!(recipients(&out), vec![B, C]);
        assert_eq!(out[0].packet, Packet::GameAction(GameAction::place(Color::Black, 7, 7)));
        assert_eq!(s.state().current_turn(), Color::White);
    }

    #[test]
    fn test_out_of_turn_rejected_without_mutation() {
        let mut s = seated();
        let before = s.state().grid().clone();
        let err = s
            .handle_action(B, GameAction::place(Color::White, 0, 0))
            .unwrap_err();
        assert!(matches!(err, ProtocolViolation::OutOfTurn { turn: Color::Black, .. }));
        assert_eq!(s.state().grid(), &before);
        assert_eq!(s.state().current_turn(), Color::Black);
    }

    #[test]
    fn test_wrong_color_rejected() {
        let mut s = seated();
        let err = s
            .handle_action(A, GameAction::place(Color::White, 0, 0))
            .unwrap_err();
        assert!(matches!(err, ProtocolViolation::OutOfTurn { .. }));
    }

    #[test]
    fn test_unknown_connection_rejected() {
        let mut s = seated();
        let err = s
            .handle_action(ConnectionId(99), GameAction::place(Color::Black, 0, 0))
            .unwrap_err();
        assert_eq!(err, ProtocolViolation::NotInSession(99));
    }

    #[test]
    fn test_spectator_action_ignored() {
        let mut s = seated();
        s.join(C, "carol");
        let out = s
            .handle_action(C, GameAction::place(Color::Black, 1, 1))
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(s.state().grid().occupied(), 0);
    }

    #[test]
    fn test_illegal_action_resyncs_origin_only() {
        let mut s = seated();
        place(&mut s, A, Color::Black, 4, 4);
        let out = place(&mut s, B, Color::White, 4, 4);
        assert_eq!(recipients(&out), vec![B, B]);
        assert!(matches!(out[0].packet, Packet::BoardSnapshot { width: 15, height: 15, .. }));
        assert_eq!(
            out[1].packet,
            Packet::NotifyTurn {
                color: Color::White
            }
        );
        assert_eq!(s.state().current_turn(), Color::White);
    }

    #[test]
    fn test_victory_broadcast_and_later_actions_refused() {
        let mut s = seated();
        for i in 0..4 {
            place(&mut s, A, Color::Black, 3 + i, 3);
            place(&mut s, B, Color::White, 3 + i, 10);
        }
        let out = place(&mut s, A, Color::Black, 7, 3);
        assert_eq!(recipients(&out), vec![B, A, B]);
        assert_eq!(
            out[1].packet,
            Packet::Victory {
                winner: Some(Color::Black)
            }
        );
        assert_eq!(s.state().outcome(), Some(Outcome::Winner(Color::Black)));

        let err = s
            .handle_action(B, GameAction::place(Color::White, 0, 0))
            .unwrap_err();
        assert_eq!(err, ProtocolViolation::GameOver);
    }

    #[test]
    fn test_leave_frees_seat_for_next_joiner() {
        let mut s = seated();
        s.join(C, "carol");
        place(&mut s, A, Color::Black, 0, 0);

        let outcome = s.leave(A);
        assert_eq!(outcome.seat, Some(Seat::One));
        assert!(!outcome.empty);
        assert_eq!(recipients(&outcome.outbound), vec![B, C]);
        assert_eq!(s.player_names(), vec!["", "bob", "carol"]);
        assert_eq!(s.state().grid().occupied(), 1);

        let (seat, _) = s.join(ConnectionId(4), "dave");
        assert_eq!(seat, Seat::One);
    }

    #[test]
    fn test_last_leave_reports_empty() {
        let mut s = seated();
        assert!(!s.leave(A).empty);
        let last = s.leave(B);
        assert!(last.empty);
        assert!(last.outbound.is_empty());
        assert!(s.leave(B).seat.is_none());
    }

    #[test]
    fn test_clear_board_requires_seat() {
        let mut s = seated();
        s.join(C, "carol");
        place(&mut s, A, Color::Black, 5, 5);

        assert_eq!(s.clear_board(C).unwrap_err(), ProtocolViolation::NotSeated(3));
        let out = s.clear_board(B).unwrap();
        assert_eq!(out.len(), 6);
        assert_eq!(s.state().grid().occupied(), 0);
        assert_eq!(s.state().current_turn(), Color::Black);
    }

    #[test]
    fn test_clear_after_victory_reports_match_running() {
        let mut s = seated();
        for i in 0..4 {
            place(&mut s, A, Color::Black, i, 0);
            place(&mut s, B, Color::White, i, 1);
        }
        place(&mut s, A, Color::Black, 4, 0);
        assert!(s.state().is_game_over());

        let out = s.clear_board(A).unwrap();
        assert!(!s.state().is_game_over());
        assert!(matches!(
            out[0].packet,
            Packet::BoardSnapshot { game_over: false, .. }
        ));
    }

    #[test]
    fn test_action_phase_from_sender_ignored() {
        let mut s = seated();
        // An action already confirmed against someone else's state.
        let mut other = MatchState::new(GameConfig::default()).unwrap();
        let mut action = GameAction::place(Color::Black, 6, 6);
        action.do_action(&mut other).unwrap();
        action.confirm_action(&mut other).unwrap();
        assert!(action.is_confirmed());

        let out = s.handle_action(A, action).unwrap();
        assert_eq!(recipients(&out), vec![B]);
        assert_eq!(s.state().grid().get_cell(6, 6), Color::Black);
        assert_eq!(s.state().current_turn(), Color::White);
        match &out[0].packet {
            Packet::GameAction(relayed) => assert!(!relayed.is_confirmed()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_draw_broadcasts_victory_none() {
        let mut config = GameConfig::default().with_size(5, 5);
        config.victory_length = 5;
        let mut s = ServerSession::new(MatchId(2), config).unwrap();
        s.join(A, "alice");
        s.join(B, "bob");

        // Column pairs alternate colors per row; no line of five forms.
        let color_at = |x: i32, y: i32| {
            if ((x / 2) + y) % 2 == 0 { Color::Black } else { Color::White }
        };
        let mut blacks: Vec<(i32, i32)> = Vec::new();
        let mut whites: Vec<(i32, i32)> = Vec::new();
        for y in 0..5 {
            for x in 0..5 {
                match color_at(x, y) {
                    Color::Black => blacks.push((x, y)),
                    _ => whites.push((x, y)),
                }
            }
        }
        assert_eq!(blacks.len(), 13);
        let mut last = Vec::new();
        for i in 0..13 {
            let (x, y) = blacks[i];
            last = place(&mut s, A, Color::Black, x, y);
            if let Some(&(x, y)) = whites.get(i) {
                last = place(&mut s, B, Color::White, x, y);
            }
        }
        assert!(last.iter().any(|o| o.packet == Packet::Victory { winner: None }));
        assert_eq!(s.state().outcome(), Some(Outcome::Draw));
    }
}
