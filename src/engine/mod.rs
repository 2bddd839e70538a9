//! Engine module housing the live decision runtime.
//!
//! `core` turns captured windows into labels, `ticker` drives it at a fixed
//! rate, `backend` produces audio and `session` wires the three together.

pub mod backend;
pub mod core;
pub mod session;
pub mod ticker;

#[cfg(feature = "live_audio")]
pub use backend::CpalBackend;
pub use backend::{CaptureBackend, ReplayBackend};
pub use core::{DecisionSource, DecisionStats, NoteDecisionService, ServiceState, TickDecision};
pub use session::NoteSession;
pub use ticker::{LabelEvent, PollingTicker};
