//! Picking puzzle positions out of an evaluated game

use std::collections::HashMap;

use shakmaty::Color;

use super::types::{GameMeta, Puzzle};
use crate::classify::{classify_move, mate_transition, MateTransition};
use crate::config::MinerConfig;
use crate::engine::{signed_centipawns_at, to_mover_perspective, EngineEvaluation};
use crate::timeline::{MoveSnapshot, Timeline};

/// Origin and destination squares of a UCI move, without promotion
fn squares(uci: &str) -> &str {
    uci.get(..4).unwrap_or(uci)
}

/// Candidate puzzles from `mover`'s moves in one game.
///
/// `evaluations` may be sparse; plies missing either neighbouring
/// evaluation are skipped.
pub fn extract_puzzles(
    timeline: &Timeline,
    evaluations: &HashMap<u16, EngineEvaluation>,
    mover: Color,
    game: &GameMeta,
    config: &MinerConfig,
) -> Vec<Puzzle> {
    timeline
        .snapshots
        .iter()
        .filter(|s| s.color == mover)
        .filter_map(|snapshot| {
            let before = evaluations.get(&(snapshot.ply - 1))?;
            let after = evaluations.get(&snapshot.ply)?;
            let fen = timeline.fen_before(snapshot.ply)?;
            candidate(snapshot, fen, before, after, game, config)
        })
        .collect()
}

fn candidate(
    snapshot: &MoveSnapshot,
    fen: &str,
    before: &EngineEvaluation,
    after: &EngineEvaluation,
    game: &GameMeta,
    config: &MinerConfig,
) -> Option<Puzzle> {
    if snapshot.gives_checkmate {
        return None;
    }

    let score_before = before.score?;
    let score_after = after.score?;
    let mover = snapshot.color;

    let standing = to_mover_perspective(signed_centipawns_at(&score_before, mover), mover);
    if standing < -config.max_disadvantage {
        return None;
    }

    if before.best_move.is_empty() || squares(&before.best_move) == squares(&snapshot.uci) {
        return None;
    }

    let quality = classify_move(snapshot, Some(before), Some(after), snapshot.only_legal_move)?;
    let mate_error = matches!(
        mate_transition(mover, &score_before, &score_after),
        Some(MateTransition::Flipped | MateTransition::Lost | MateTransition::Allowed)
    );
    if quality.loss_centipawns < config.min_loss && !mate_error {
        return None;
    }

    Some(Puzzle {
        fen: fen.to_string(),
        best_move_uci: before.best_move.clone(),
        played_move_uci: snapshot.uci.clone(),
        mover,
        move_number: snapshot.move_number,
        evaluation_before: score_before,
        evaluation_after: score_after,
        label: quality.label,
        loss_centipawns: quality.loss_centipawns,
        game: game.clone(),
    })
}
