//! Background puzzle mining over a player's games

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::extract::extract_puzzles;
use super::types::{GameMeta, Puzzle, PuzzleSet};
use crate::config::MinerConfig;
use crate::engine::{signed_centipawns_at, to_mover_perspective, EngineEvaluation, Evaluator};
use crate::error::Result;
use crate::games::GameRecord;
use crate::timeline::build_timeline;

/// A running mining job.
///
/// Dropping the job cancels it. Puzzles already reported stay valid.
pub struct MiningJob {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<PuzzleSet>,
}

impl MiningJob {
    /// Stops after the game currently being scanned.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the job and returns the merged puzzle set.
    pub async fn join(self) -> Result<PuzzleSet> {
        let MiningJob { cancel, handle } = self;
        let set = handle.await?;
        drop(cancel);
        Ok(set)
    }
}

/// Scans `games` for `player`'s mistakes on a background task.
///
/// New puzzles are merged into `existing` game by game; `on_batch` receives
/// each game's newly added puzzles as soon as they are merged.
pub fn mine_puzzles<E, F>(
    engine: Arc<E>,
    games: Vec<GameRecord>,
    player: String,
    existing: PuzzleSet,
    config: MinerConfig,
    mut on_batch: F,
) -> MiningJob
where
    E: Evaluator + Send + Sync + 'static,
    F: FnMut(&[Puzzle]) + Send + 'static,
{
    let (cancel, mut cancelled) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut set = existing;
        let mut scanned = 0usize;

        for game in &games {
            if *cancelled.borrow() {
                break;
            }

            let found = tokio::select! {
                biased;
                _ = cancelled.changed() => break,
                found = mine_game(engine.as_ref(), game, &player, &config) => found,
            };
            scanned += 1;

            let added = set.merge(found);
            if !added.is_empty() {
                debug!(game_id = %game.id, added = added.len(), "merged puzzles");
                on_batch(&added);
            }
        }

        info!(
            player = %player,
            scanned,
            total = games.len(),
            puzzles = set.len(),
            "puzzle mining finished"
        );
        set
    });

    MiningJob { cancel, handle }
}

/// Evaluates the player's moves in one game and extracts puzzles.
pub async fn mine_game<E: Evaluator>(
    engine: &E,
    game: &GameRecord,
    player: &str,
    config: &MinerConfig,
) -> Vec<Puzzle> {
    let Some(mover) = game.player_color(player) else {
        return Vec::new();
    };

    let timeline = match build_timeline(&game.transcript) {
        Ok(timeline) => timeline,
        Err(e) => {
            warn!(game_id = %game.id, error = %e, "skipping game with unreadable transcript");
            return Vec::new();
        }
    };

    let mut evaluations: HashMap<u16, EngineEvaluation> = HashMap::new();
    for snapshot in timeline.snapshots.iter() {
        if snapshot.color != mover || snapshot.only_legal_move || snapshot.gives_checkmate {
            continue;
        }

        let before_key = snapshot.ply - 1;
        let (Some(fen_before), Some(fen_after)) =
            (timeline.fen_at(before_key), timeline.fen_at(snapshot.ply))
        else {
            continue;
        };
        if !evaluations.contains_key(&before_key) {
            let Some(eval) = evaluate(engine, fen_before, game, config).await else {
                continue;
            };
            evaluations.insert(before_key, eval);
        }

        // No point looking further if the position was already lost.
        let standing = evaluations[&before_key]
            .score
            .map(|s| to_mover_perspective(signed_centipawns_at(&s, mover), mover));
        if standing.map_or(true, |cp| cp < -config.max_disadvantage) {
            continue;
        }

        if let Some(eval) = evaluate(engine, fen_after, game, config).await {
            evaluations.insert(snapshot.ply, eval);
        }
    }

    extract_puzzles(&timeline, &evaluations, mover, &GameMeta::from(game), config)
}

async fn evaluate<E: Evaluator>(
    engine: &E,
    fen: &str,
    game: &GameRecord,
    config: &MinerConfig,
) -> Option<EngineEvaluation> {
    match tokio::time::timeout(config.eval_timeout, engine.evaluate(fen, config.depth)).await {
        Ok(Ok(eval)) => Some(eval),
        Ok(Err(e)) => {
            debug!(game_id = %game.id, error = %e, "evaluation failed");
            None
        }
        Err(_) => {
            debug!(game_id = %game.id, "evaluation timed out");
            None
        }
    }
}
