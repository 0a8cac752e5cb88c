//! Move quality labels

use serde::{Deserialize, Serialize};

/// Upper bound (inclusive) of the loss band for each banded label
pub const BEST_MAX_LOSS: u32 = 20;
pub const GOOD_MAX_LOSS: u32 = 50;
pub const INACCURACY_MAX_LOSS: u32 = 99;
pub const MISTAKE_MAX_LOSS: u32 = 300;

/// Quality label for a single move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveLabel {
    /// Only legal move
    Forced,
    Best,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
    /// A forced mate was available and let go
    Miss,
}

impl MoveLabel {
    pub const ALL: [MoveLabel; 7] = [
        MoveLabel::Forced,
        MoveLabel::Best,
        MoveLabel::Good,
        MoveLabel::Inaccuracy,
        MoveLabel::Mistake,
        MoveLabel::Blunder,
        MoveLabel::Miss,
    ];

    /// Banded label for a centipawn loss. Band bounds are inclusive.
    pub fn from_cp_loss(cp_loss: u32) -> Self {
        match cp_loss {
            l if l <= BEST_MAX_LOSS => MoveLabel::Best,
            l if l <= GOOD_MAX_LOSS => MoveLabel::Good,
            l if l <= INACCURACY_MAX_LOSS => MoveLabel::Inaccuracy,
            l if l <= MISTAKE_MAX_LOSS => MoveLabel::Mistake,
            _ => MoveLabel::Blunder,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MoveLabel::Forced => "forced",
            MoveLabel::Best => "best",
            MoveLabel::Good => "good",
            MoveLabel::Inaccuracy => "inaccuracy",
            MoveLabel::Mistake => "mistake",
            MoveLabel::Blunder => "blunder",
            MoveLabel::Miss => "miss",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MoveLabel::Forced => "Forced",
            MoveLabel::Best => "Best",
            MoveLabel::Good => "Good",
            MoveLabel::Inaccuracy => "Inaccuracy",
            MoveLabel::Mistake => "Mistake",
            MoveLabel::Blunder => "Blunder",
            MoveLabel::Miss => "Miss",
        }
    }
}

/// Classification of one move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveQuality {
    pub label: MoveLabel,
    /// Centipawns the mover gave up, never negative
    pub loss_centipawns: u32,
    pub description: String,
}
