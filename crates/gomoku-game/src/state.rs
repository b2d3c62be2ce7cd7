//! Match state: board, rules, players, turn and result.

use serde::{Deserialize, Serialize};

use gomoku_board::{CellChanged, Color, GameConfig, GameConfigError, Grid};

use crate::error::SnapshotError;

// ---------------------------------------------------------------------------
// Player / Outcome
// ---------------------------------------------------------------------------

/// One of the two participants in a match. Identity is the color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Color this player places.
    pub color: Color,
    /// Display name.
    pub name: String,
}

impl Player {
    /// Creates a player.
    pub fn new(color: Color, name: impl Into<String>) -> Self {
        Self {
            color,
            name: name.into(),
        }
    }
}

/// How a finished match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The given color completed a winning run.
    Winner(Color),
    /// The board filled up with no winner.
    Draw,
}

impl Outcome {
    /// Winning color, or `None` for a draw.
    pub fn winner(self) -> Option<Color> {
        match self {
            Self::Winner(color) => Some(color),
            Self::Draw => None,
        }
    }
}

// ---------------------------------------------------------------------------
// MatchEvent
// ---------------------------------------------------------------------------

/// State changes a renderer reacts to. Drained with
/// [`MatchState::drain_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    /// A single cell was written.
    CellChanged(CellChanged),
    /// The current turn moved to this color.
    TurnChanged(Color),
    /// The match ended.
    GameOver(Outcome),
    /// The whole board was replaced (resync or reset).
    BoardReplaced,
}

// ---------------------------------------------------------------------------
// MatchState
// ---------------------------------------------------------------------------

/// Complete state of one match.
///
/// The seat-one player plays Black and moves first. `game_over` only ever
/// goes from `false` to `true`, except through [`MatchState::reset`] or an
/// authoritative [`MatchState::apply_snapshot`].
#[derive(Debug, Clone)]
pub struct MatchState {
    grid: Grid,
    config: GameConfig,
    player_one: Player,
    player_two: Player,
    current_turn: Color,
    game_over: bool,
    outcome: Option<Outcome>,
    events: Vec<MatchEvent>,
}

impl MatchState {
    /// Creates a fresh match with an empty board. Black (player one) to move.
    pub fn new(config: GameConfig) -> Result<Self, GameConfigError> {
        config.validate()?;
        let grid =
            Grid::new(config.width, config.height).map_err(|_| GameConfigError::BoardSize {
                width: config.width,
                height: config.height,
            })?;
        Ok(Self {
            grid,
            config,
            player_one: Player::new(Color::Black, ""),
            player_two: Player::new(Color::White, ""),
            current_turn: Color::Black,
            game_over: false,
            outcome: None,
            events: Vec::new(),
        })
    }

    /// Rebuilds a state from values received on the wire (initial join data).
    pub fn from_parts(
        config: GameConfig,
        grid: Grid,
        current_turn: Color,
        game_over: bool,
    ) -> Result<Self, SnapshotError> {
        if grid.width() != config.width || grid.height() != config.height {
            return Err(SnapshotError::Dimensions {
                width: grid.width(),
                height: grid.height(),
                expected_width: config.width,
                expected_height: config.height,
            });
        }
        let mut grid = grid;
        grid.drain_changes();
        Ok(Self {
            grid,
            config,
            player_one: Player::new(Color::Black, ""),
            player_two: Player::new(Color::White, ""),
            current_turn: if current_turn.is_player() {
                current_turn
            } else {
                Color::Black
            },
            game_over,
            outcome: None,
            events: Vec::new(),
        })
    }

    /// The board.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub(crate) fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// The rule set.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Seat one (Black).
    pub fn player_one(&self) -> &Player {
        &self.player_one
    }

    /// Seat two (White).
    pub fn player_two(&self) -> &Player {
        &self.player_two
    }

    /// Player holding `color`, if any.
    pub fn player(&self, color: Color) -> Option<&Player> {
        [&self.player_one, &self.player_two]
            .into_iter()
            .find(|p| p.color == color)
    }

    /// Renames the player holding `color`.
    pub fn set_player_name(&mut self, color: Color, name: impl Into<String>) {
        let name = name.into();
        if self.player_one.color == color {
            self.player_one.name = name;
        } else if self.player_two.color == color {
            self.player_two.name = name;
        }
    }

    /// Color to move.
    pub fn current_turn(&self) -> Color {
        self.current_turn
    }

    /// The player to move.
    pub fn current_player(&self) -> &Player {
        if self.current_turn == self.player_two.color {
            &self.player_two
        } else {
            &self.player_one
        }
    }

    /// Whether the match has ended.
    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// How the match ended, once it has.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Hands the turn to the other player.
    pub(crate) fn switch_turn(&mut self) {
        let next = if self.current_turn == self.player_one.color {
            self.player_two.color
        } else {
            self.player_one.color
        };
        self.set_turn(next);
    }

    /// Sets the color to move, e.g. from a server turn notification.
    /// `Empty` and unchanged values are ignored.
    pub fn set_turn(&mut self, color: Color) {
        if color.is_player() && color != self.current_turn {
            self.current_turn = color;
            self.events.push(MatchEvent::TurnChanged(color));
        }
    }

    /// Ends the match. Has no effect once an outcome is recorded. A match
    /// marked over without a known outcome (rebuilt from the wire) takes the
    /// first outcome it is given.
    pub fn finish(&mut self, outcome: Outcome) {
        if self.outcome.is_some() {
            return;
        }
        self.game_over = true;
        self.outcome = Some(outcome);
        self.events.push(MatchEvent::GameOver(outcome));
    }

    /// Replaces the whole board with an authoritative snapshot.
    pub fn replace_grid(&mut self, grid: Grid) -> Result<(), SnapshotError> {
        if grid.width() != self.config.width || grid.height() != self.config.height {
            return Err(SnapshotError::Dimensions {
                width: grid.width(),
                height: grid.height(),
                expected_width: self.config.width,
                expected_height: self.config.height,
            });
        }
        self.grid = grid;
        self.grid.drain_changes();
        self.events.push(MatchEvent::BoardReplaced);
        Ok(())
    }

    /// Adopts an authoritative board and game-over flag from the server.
    ///
    /// A server that reports the match running clears any local result, e.g.
    /// after a board clear or a rejected winning move. A server that reports
    /// it over marks it over; the outcome comes with the victory notice.
    pub fn apply_snapshot(&mut self, grid: Grid, game_over: bool) -> Result<(), SnapshotError> {
        self.replace_grid(grid)?;
        self.game_over = game_over;
        if !game_over {
            self.outcome = None;
        }
        Ok(())
    }

    /// Clears the board and result and gives the first move back to Black.
    pub fn reset(&mut self) {
        self.grid.clear();
        self.grid.drain_changes();
        self.game_over = false;
        self.outcome = None;
        self.current_turn = self.player_one.color;
        self.events.push(MatchEvent::BoardReplaced);
        self.events.push(MatchEvent::TurnChanged(self.current_turn));
    }

    /// Takes all pending events: cell writes first, then turn/result changes.
    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        let mut out: Vec<MatchEvent> = self
            .grid
            .drain_changes()
            .into_iter()
            .map(MatchEvent::CellChanged)
            .collect();
        out.append(&mut self.events);
        out
    }
}
