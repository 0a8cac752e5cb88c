//! Move classification against the evaluation before and after the move

use shakmaty::Color;

use super::quality::{MoveLabel, MoveQuality};
use crate::engine::{mating_side, signed_centipawns_at, to_mover_perspective, EngineEvaluation, EngineScore};
use crate::timeline::MoveSnapshot;

/// How a move changed the forced-mate situation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MateTransition {
    /// The move is checkmate
    Delivered,
    /// Mover keeps a forced mate that got strictly shorter
    Shortened,
    /// Mover keeps a forced mate that did not get shorter
    Kept,
    /// Mover had a forced mate, now the opponent has one
    Flipped,
    /// Mover had a forced mate and it is gone
    Lost,
    /// Opponent gained a forced mate they did not have before
    Allowed,
}

impl MateTransition {
    /// Label that overrides the banded result
    pub fn label(&self) -> MoveLabel {
        match self {
            MateTransition::Delivered | MateTransition::Shortened => MoveLabel::Best,
            MateTransition::Kept => MoveLabel::Good,
            MateTransition::Flipped | MateTransition::Allowed => MoveLabel::Blunder,
            MateTransition::Lost => MoveLabel::Miss,
        }
    }
}

/// Centipawns the mover gave up between the two scores.
pub fn move_loss(mover: Color, before: &EngineScore, after: &EngineScore) -> u32 {
    let before_cp = to_mover_perspective(signed_centipawns_at(before, mover), mover);
    let after_cp = to_mover_perspective(signed_centipawns_at(after, !mover), mover);
    (before_cp - after_cp).max(0) as u32
}

/// Mate override for a move, if one applies.
///
/// `before` is evaluated with `mover` to move, `after` with the opponent to move.
pub fn mate_transition(mover: Color, before: &EngineScore, after: &EngineScore) -> Option<MateTransition> {
    let before_winner = mating_side(before, mover);
    let after_winner = mating_side(after, !mover);

    if matches!(after, EngineScore::Mate { plies_to_mate: 0 }) && after_winner == Some(mover) {
        return Some(MateTransition::Delivered);
    }

    if before_winner == Some(mover) {
        return Some(match after_winner {
            Some(winner) if winner == mover => {
                match (before.mate_distance(), after.mate_distance()) {
                    (Some(was), Some(now)) if now < was => MateTransition::Shortened,
                    _ => MateTransition::Kept,
                }
            }
            Some(_) => MateTransition::Flipped,
            None => MateTransition::Lost,
        });
    }

    if after_winner == Some(!mover) && before_winner != Some(!mover) {
        return Some(MateTransition::Allowed);
    }

    None
}

/// Classifies one move.
///
/// Returns `None` when an evaluation is missing and the move was not forced.
pub fn classify_move(
    snapshot: &MoveSnapshot,
    eval_before: Option<&EngineEvaluation>,
    eval_after: Option<&EngineEvaluation>,
    is_only_legal_move: bool,
) -> Option<MoveQuality> {
    if is_only_legal_move {
        return Some(MoveQuality {
            label: MoveLabel::Forced,
            loss_centipawns: 0,
            description: format!("{} was the only legal move", snapshot.san),
        });
    }

    let before = eval_before.and_then(|e| e.score)?;
    let after = eval_after.and_then(|e| e.score)?;
    let mover = snapshot.color;

    let loss_centipawns = move_loss(mover, &before, &after);
    let transition = mate_transition(mover, &before, &after);
    let label = transition
        .map(|t| t.label())
        .unwrap_or_else(|| MoveLabel::from_cp_loss(loss_centipawns));

    let best_move = eval_before.map(|e| e.best_move.as_str()).unwrap_or_default();
    Some(MoveQuality {
        label,
        loss_centipawns,
        description: describe(snapshot, label, transition, best_move, loss_centipawns),
    })
}

fn describe(
    snapshot: &MoveSnapshot,
    label: MoveLabel,
    transition: Option<MateTransition>,
    best_move: &str,
    loss: u32,
) -> String {
    let prefix = format!("Move {}: {}", snapshot.move_number, snapshot.san);
    match transition {
        Some(MateTransition::Delivered) => format!("{} delivers checkmate", prefix),
        Some(MateTransition::Shortened) => format!("{} keeps the mating attack", prefix),
        Some(MateTransition::Kept) => format!("{} keeps a forced mate, but not the fastest", prefix),
        Some(MateTransition::Flipped) => {
            format!("{} throws away a forced mate and allows one instead ({} was best)", prefix, best_move)
        }
        Some(MateTransition::Lost) => format!("{} misses a forced mate ({} was best)", prefix, best_move),
        Some(MateTransition::Allowed) => format!("{} allows a forced mate ({} was best)", prefix, best_move),
        None if label == MoveLabel::Best => format!("{} is the best move", prefix),
        None => format!(
            "{} is {} {} instead of {} (-{} cp)",
            prefix,
            if label == MoveLabel::Inaccuracy { "an" } else { "a" },
            label.as_str(),
            best_move,
            loss
        ),
    }
}
