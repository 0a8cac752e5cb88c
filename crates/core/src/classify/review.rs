//! Whole-game classification and per-color summaries

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use shakmaty::Color;
use tracing::debug;

use super::classifier::classify_move;
use super::quality::{MoveLabel, MoveQuality};
use crate::engine::EngineEvaluation;
use crate::timeline::Timeline;

/// Classification of one ply. `quality` is `None` when data was missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewedMove {
    pub ply: u16,
    pub san: String,
    pub quality: Option<MoveQuality>,
}

/// Aggregate figures for one side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorSummary {
    pub counts: BTreeMap<MoveLabel, u32>,
    /// Moves that carry a label, forced ones included
    pub classified: u32,
    /// Moves that could not be classified
    pub unclassified: u32,
    /// Average loss over classified, non-forced moves
    pub average_loss: Option<f64>,
    /// 0..=100, `None` when no move counted towards the average
    pub accuracy: Option<f64>,
}

impl ColorSummary {
    pub fn count(&self, label: MoveLabel) -> u32 {
        self.counts.get(&label).copied().unwrap_or(0)
    }
}

/// Result of classifying a full game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameReview {
    pub moves: Vec<ReviewedMove>,
    pub white: ColorSummary,
    pub black: ColorSummary,
}

impl GameReview {
    pub fn summary_for(&self, color: Color) -> &ColorSummary {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }
}

/// Accuracy from average centipawn loss: `100 * sqrt(1 / (1 + acpl / 100))`
pub fn accuracy_from_acpl(acpl: f64) -> f64 {
    let acpl = acpl.max(0.0);
    (100.0 * (1.0 / (1.0 + acpl / 100.0)).sqrt()).clamp(0.0, 100.0)
}

/// Classifies every move of a timeline.
///
/// `evaluations` is keyed like a review session: 0 is the starting position,
/// `n` the position after ply `n`. Moves without both neighbouring evaluations
/// stay unclassified unless they were forced.
pub fn classify_game(
    timeline: &Timeline,
    evaluations: &HashMap<u16, EngineEvaluation>,
) -> GameReview {
    let moves: Vec<ReviewedMove> = timeline
        .snapshots
        .iter()
        .map(|snapshot| {
            let before = evaluations.get(&(snapshot.ply - 1));
            let after = evaluations.get(&snapshot.ply);
            ReviewedMove {
                ply: snapshot.ply,
                san: snapshot.san.clone(),
                quality: classify_move(snapshot, before, after, snapshot.only_legal_move),
            }
        })
        .collect();

    let white = summarize(timeline, &moves, Color::White);
    let black = summarize(timeline, &moves, Color::Black);

    debug!(
        plies = moves.len(),
        white_classified = white.classified,
        black_classified = black.classified,
        "classified game"
    );

    GameReview { moves, white, black }
}

fn summarize(timeline: &Timeline, moves: &[ReviewedMove], color: Color) -> ColorSummary {
    let mut summary = ColorSummary::default();
    let mut total_loss: u64 = 0;
    let mut counted: u32 = 0;

    for (snapshot, reviewed) in timeline.snapshots.iter().zip(moves) {
        if snapshot.color != color {
            continue;
        }
        match &reviewed.quality {
            Some(quality) => {
                summary.classified += 1;
                *summary.counts.entry(quality.label).or_insert(0) += 1;
                if quality.label != MoveLabel::Forced {
                    total_loss += u64::from(quality.loss_centipawns);
                    counted += 1;
                }
            }
            None => summary.unclassified += 1,
        }
    }

    summary.average_loss = (counted > 0).then(|| total_loss as f64 / f64::from(counted));
    summary.accuracy = summary.average_loss.map(accuracy_from_acpl);
    summary
}
