//! Replayable game actions with a `Created → Applied → Confirmed` lifecycle.
//!
//! The same action type runs on the server (validate, apply, confirm in one
//! step) and on predicting clients (apply now, confirm or undo later). The
//! phase is local bookkeeping: it is skipped by serde, so an action decoded
//! from the wire always starts out `Created`.

use serde::{Deserialize, Serialize};

use gomoku_board::{Color, check_victory, violates_double_four, violates_double_three};

use crate::error::{ActionError, IllegalAction};
use crate::state::{MatchState, Outcome};

// ---------------------------------------------------------------------------
// ActionPhase
// ---------------------------------------------------------------------------

/// Where an action sits in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ActionPhase {
    /// Built or decoded, not yet on the board.
    #[default]
    Created,
    /// On the board, turn and result not yet settled.
    Applied,
    /// Final. Turn switched or match ended.
    Confirmed,
}

// ---------------------------------------------------------------------------
// PlacePiece
// ---------------------------------------------------------------------------

/// Put one piece of `color` on `(x, y)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacePiece {
    /// Color being placed.
    pub color: Color,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    #[serde(skip)]
    phase: ActionPhase,
}

impl PartialEq for PlacePiece {
    fn eq(&self, other: &Self) -> bool {
        self.color == other.color && self.x == other.x && self.y == other.y
    }
}

impl Eq for PlacePiece {}

impl PlacePiece {
    /// A new, unapplied placement.
    pub fn new(color: Color, x: i32, y: i32) -> Self {
        Self {
            color,
            x,
            y,
            phase: ActionPhase::Created,
        }
    }

    fn expect_phase(&self, expected: ActionPhase) -> Result<(), ActionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(ActionError::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    /// Validates against the rules and writes the cell. No turn or victory
    /// side effects, so this doubles as a legality check.
    pub fn do_action(&mut self, state: &mut MatchState) -> Result<(), ActionError> {
        if state.is_game_over() {
            return Err(ActionError::GameOver);
        }
        self.expect_phase(ActionPhase::Created)?;

        let (x, y) = (self.x, self.y);
        if !self.color.is_player() {
            return Err(IllegalAction::NoColor.into());
        }
        let grid = state.grid();
        if !grid.in_bounds(x, y) {
            return Err(IllegalAction::OutOfBounds { x, y }.into());
        }
        if grid.get_cell(x, y).is_player() {
            return Err(IllegalAction::Occupied { x, y }.into());
        }

        let config = state.config();
        if config.three_and_three && violates_double_three(grid, self.color, x, y) {
            return Err(IllegalAction::DoubleThree { x, y }.into());
        }
        if config.four_and_four && violates_double_four(grid, self.color, x, y) {
            return Err(IllegalAction::DoubleFour { x, y }.into());
        }

        state.grid_mut().set_cell(x, y, self.color)?;
        self.phase = ActionPhase::Applied;
        Ok(())
    }

    /// Reverts an applied placement.
    pub fn undo_action(&mut self, state: &mut MatchState) -> Result<(), ActionError> {
        self.expect_phase(ActionPhase::Applied)?;
        state.grid_mut().set_cell(self.x, self.y, Color::Empty)?;
        self.phase = ActionPhase::Created;
        Ok(())
    }

    /// Settles an applied placement: checks for a win or a full board, and
    /// otherwise passes the turn.
    pub fn confirm_action(
        &mut self,
        state: &mut MatchState,
    ) -> Result<Option<Outcome>, ActionError> {
        if state.is_game_over() {
            return Err(ActionError::GameOver);
        }
        self.expect_phase(ActionPhase::Applied)?;
        self.phase = ActionPhase::Confirmed;

        let outcome = if check_victory(state.grid(), self.color, self.x, self.y, state.config()) {
            Some(Outcome::Winner(self.color))
        } else if state.grid().is_full() {
            Some(Outcome::Draw)
        } else {
            None
        };

        match outcome {
            Some(outcome) => {
                tracing::debug!(?outcome, x = self.x, y = self.y, "match decided");
                state.finish(outcome);
            }
            None => state.switch_turn(),
        }
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// GameAction
// ---------------------------------------------------------------------------

/// Everything a player can do to a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameAction {
    /// Place a piece.
    PlacePiece(PlacePiece),
}

impl GameAction {
    /// Shorthand for a fresh `PlacePiece`.
    pub fn place(color: Color, x: i32, y: i32) -> Self {
        Self::PlacePiece(PlacePiece::new(color, x, y))
    }

    /// See [`PlacePiece::do_action`].
    pub fn do_action(&mut self, state: &mut MatchState) -> Result<(), ActionError> {
        match self {
            Self::PlacePiece(place) => place.do_action(state),
        }
    }

    /// See [`PlacePiece::undo_action`].
    pub fn undo_action(&mut self, state: &mut MatchState) -> Result<(), ActionError> {
        match self {
            Self::PlacePiece(place) => place.undo_action(state),
        }
    }

    /// See [`PlacePiece::confirm_action`].
    pub fn confirm_action(
        &mut self,
        state: &mut MatchState,
    ) -> Result<Option<Outcome>, ActionError> {
        match self {
            Self::PlacePiece(place) => place.confirm_action(state),
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ActionPhase {
        match self {
            Self::PlacePiece(place) => place.phase,
        }
    }

    /// Returns `true` once confirmed.
    pub fn is_confirmed(&self) -> bool {
        self.phase() == ActionPhase::Confirmed
    }

    /// Color of the acting player.
    pub fn color(&self) -> Color {
        match self {
            Self::PlacePiece(place) => place.color,
        }
    }

    /// Target cell.
    pub fn position(&self) -> (i32, i32) {
        match self {
            Self::PlacePiece(place) => (place.x, place.y),
        }
    }
}
