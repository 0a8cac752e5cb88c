//! Position timeline built from a move transcript

mod transcript;

use serde::{Deserialize, Serialize};
use shakmaty::Color;
use tracing::debug;

use crate::error::{Error, Result};

pub use transcript::GameTags;

/// One ply of a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveSnapshot {
    /// 1-based sequence index
    pub ply: u16,
    pub move_number: u16,
    #[serde(with = "crate::serde_color")]
    pub color: Color,
    pub san: String,
    pub uci: String,
    /// Position after the move
    pub fen: String,
    /// Remaining time annotated for this move, if any
    pub clock: Option<String>,
    /// The mover had no alternative
    pub only_legal_move: bool,
    pub gives_checkmate: bool,
}

/// Ordered snapshots of one game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub tags: GameTags,
    pub start_fen: String,
    pub snapshots: Vec<MoveSnapshot>,
}

impl Timeline {
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, ply: u16) -> Option<&MoveSnapshot> {
        let index = usize::from(ply).checked_sub(1)?;
        self.snapshots.get(index)
    }

    /// Position at a key: 0 is the starting position, `n` is after ply `n`.
    pub fn fen_at(&self, key: u16) -> Option<&str> {
        if key == 0 {
            Some(&self.start_fen)
        } else {
            self.get(key).map(|s| s.fen.as_str())
        }
    }

    /// Position the mover of `ply` was looking at
    pub fn fen_before(&self, ply: u16) -> Option<&str> {
        if ply == 0 || usize::from(ply) > self.snapshots.len() {
            return None;
        }
        self.fen_at(ply - 1)
    }

    /// All positions, indexed by key
    pub fn positions(&self) -> Vec<String> {
        std::iter::once(self.start_fen.clone())
            .chain(self.snapshots.iter().map(|s| s.fen.clone()))
            .collect()
    }
}

/// Builds the timeline for the first game in `transcript`.
///
/// Any illegal or malformed move fails the whole build.
pub fn build_timeline(transcript: &str) -> Result<Timeline> {
    let game = transcript::parse_transcript(transcript).map_err(Error::InvalidTranscript)?;

    let snapshots: Vec<MoveSnapshot> = game
        .moves
        .into_iter()
        .enumerate()
        .map(|(index, applied)| {
            let ply = (index + 1) as u16;
            MoveSnapshot {
                ply,
                move_number: ply.div_ceil(2),
                color: applied.color,
                san: applied.san,
                uci: applied.uci,
                fen: applied.fen,
                clock: applied.clock,
                only_legal_move: applied.only_legal_move,
                gives_checkmate: applied.gives_checkmate,
            }
        })
        .collect();

    debug!(plies = snapshots.len(), "built timeline");

    Ok(Timeline {
        tags: game.tags,
        start_fen: game.start_fen,
        snapshots,
    })
}
