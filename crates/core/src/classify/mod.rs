//! Move quality classification

mod classifier;
mod quality;
mod review;

pub use classifier::{classify_move, mate_transition, move_loss, MateTransition};
pub use quality::{MoveLabel, MoveQuality};
pub use review::{accuracy_from_acpl, classify_game, ColorSummary, GameReview, ReviewedMove};
