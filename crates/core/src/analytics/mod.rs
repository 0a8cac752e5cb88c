//! Analytics over a player's game history

mod opponents;
mod rating;
mod streaks;

pub use opponents::{
    segment_by_opponent_strength, strongest_opponent_beaten, BeatenOpponent, Bucket, BucketStats,
    OpponentSegments,
};
pub use rating::{compute_rating_deltas, rating_delta_from_series, RatingDelta, RATING_WINDOW_DAYS};
pub use streaks::{compute_streaks, streaks_from_outcomes, Streaks};
