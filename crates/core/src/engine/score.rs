//! Engine scores and their normalization onto one orderable scale

use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::Color;

/// Magnitude a mate score saturates to.
pub const MATE_SCORE: i32 = 10_000;

/// An engine score, white-positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineScore {
    /// Centipawn score (positive = white advantage)
    Centipawn { value: i32 },
    /// Forced mate (positive = white mates, negative = black mates).
    /// Zero means checkmate is already on the board.
    Mate { plies_to_mate: i32 },
}

impl EngineScore {
    pub fn cp(value: i32) -> Self {
        EngineScore::Centipawn { value }
    }

    pub fn mate(plies_to_mate: i32) -> Self {
        EngineScore::Mate { plies_to_mate }
    }

    pub fn is_mate(&self) -> bool {
        matches!(self, EngineScore::Mate { .. })
    }

    /// Mate distance, if this is a mate score
    pub fn mate_distance(&self) -> Option<u32> {
        match self {
            EngineScore::Mate { plies_to_mate } => Some(plies_to_mate.unsigned_abs()),
            EngineScore::Centipawn { .. } => None,
        }
    }

    /// Flips a side-to-move relative score into the white-positive frame.
    pub fn from_side_to_move(self, side_to_move: Color) -> Self {
        match (self, side_to_move) {
            (score, Color::White) => score,
            (EngineScore::Centipawn { value }, Color::Black) => EngineScore::cp(-value),
            (EngineScore::Mate { plies_to_mate }, Color::Black) => EngineScore::mate(-plies_to_mate),
        }
    }
}

/// Maps a score onto a single white-positive scale.
///
/// Centipawns pass through (clamped just inside the mate band), mates saturate
/// to `±MATE_SCORE`. Mate-in-0 has no sign of its own and maps to 0; callers
/// that know the side to move should use [`signed_centipawns_at`].
pub fn to_signed_centipawns(score: &EngineScore) -> i32 {
    match *score {
        EngineScore::Centipawn { value } => value.clamp(-(MATE_SCORE - 1), MATE_SCORE - 1),
        EngineScore::Mate { plies_to_mate } => plies_to_mate.signum() * MATE_SCORE,
    }
}

/// Like [`to_signed_centipawns`], resolving mate-in-0 through the side to move.
pub fn signed_centipawns_at(score: &EngineScore, side_to_move: Color) -> i32 {
    match mating_side(score, side_to_move) {
        Some(Color::White) => MATE_SCORE,
        Some(Color::Black) => -MATE_SCORE,
        None => to_signed_centipawns(score),
    }
}

/// The side that is delivering mate, if the score is a mate score.
///
/// For mate-in-0 the side to move is the one checkmated, so the winner is the
/// other side regardless of the reported sign.
pub fn mating_side(score: &EngineScore, side_to_move: Color) -> Option<Color> {
    match *score {
        EngineScore::Centipawn { .. } => None,
        EngineScore::Mate { plies_to_mate: 0 } => Some(!side_to_move),
        EngineScore::Mate { plies_to_mate } if plies_to_mate > 0 => Some(Color::White),
        EngineScore::Mate { .. } => Some(Color::Black),
    }
}

/// Reframes a white-positive value as "how good this is for `mover`".
pub fn to_mover_perspective(cp: i32, mover: Color) -> i32 {
    match mover {
        Color::White => cp,
        Color::Black => -cp,
    }
}

impl fmt::Display for EngineScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineScore::Centipawn { value } => {
                let score = *value as f32 / 100.0;
                if score >= 0.0 {
                    write!(f, "+{:.2}", score)
                } else {
                    write!(f, "{:.2}", score)
                }
            }
            EngineScore::Mate { plies_to_mate: 0 } => write!(f, "#"),
            EngineScore::Mate { plies_to_mate } => write!(f, "M{}", plies_to_mate),
        }
    }
}
