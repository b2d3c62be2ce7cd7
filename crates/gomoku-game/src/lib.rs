//! Match state and replayable game actions.
//!
//! A [`MatchState`] owns the board, the rule set, the two players and the turn.
//! It is mutated only through [`GameAction`]s, which follow a
//! `Created → Applied → Confirmed` lifecycle shared by the authoritative
//! server and predicting clients.

pub mod action;
pub mod error;
pub mod state;

pub use action::{ActionPhase, GameAction, PlacePiece};
pub use error::{ActionError, IllegalAction, SnapshotError};
pub use state::{MatchEvent, MatchState, Outcome, Player};
