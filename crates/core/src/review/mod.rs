//! Per-position evaluation tracking for a game under review

mod session;
mod state;

pub use session::{RequestOutcome, ReviewSession, SessionEvent};
pub use state::{DisplayStatus, EvaluationState};
