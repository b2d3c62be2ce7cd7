//! Gomoku client: optimistic local prediction over a background network link.
//!
//! [`ClientPredictor`] is pure state and can be driven directly. [`ClientSession`]
//! wires it to a [`NetworkLink`] for callers that run a frame loop.

pub mod link;
pub mod predictor;
pub mod session;

pub use link::{LinkConfig, LinkError, LinkEvent, NetworkLink};
pub use predictor::{ClientPredictor, ConfirmMode, UiNotice};
pub use session::{ClientSession, TickOutput};
