//! Puzzle records and the deduplicated puzzle set

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::classify::MoveLabel;
use crate::engine::EngineScore;
use crate::games::{GameMode, GameRecord};

/// Where a puzzle came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMeta {
    pub game_id: String,
    pub white: String,
    pub black: String,
    pub mode: GameMode,
    pub end_time: DateTime<Utc>,
}

impl From<&GameRecord> for GameMeta {
    fn from(game: &GameRecord) -> Self {
        Self {
            game_id: game.id.clone(),
            white: game.white.name.clone(),
            black: game.black.name.clone(),
            mode: game.mode,
            end_time: game.end_time,
        }
    }
}

/// A position where the player went wrong
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    /// Position before the mistake
    pub fen: String,
    pub best_move_uci: String,
    pub played_move_uci: String,
    #[serde(with = "crate::serde_color")]
    pub mover: Color,
    pub move_number: u16,
    pub evaluation_before: EngineScore,
    pub evaluation_after: EngineScore,
    pub label: MoveLabel,
    pub loss_centipawns: u32,
    pub game: GameMeta,
}

impl Puzzle {
    pub fn key(&self) -> PuzzleKey {
        PuzzleKey {
            fen: self.fen.clone(),
            move_number: self.move_number,
            played_move_uci: self.played_move_uci.clone(),
        }
    }
}

/// Identity of a puzzle across scans
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PuzzleKey {
    pub fen: String,
    pub move_number: u16,
    pub played_move_uci: String,
}

/// Append-only, deduplicated puzzles of one player
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Puzzle>", into = "Vec<Puzzle>")]
pub struct PuzzleSet {
    puzzles: Vec<Puzzle>,
    keys: HashSet<PuzzleKey>,
}

impl PuzzleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }

    pub fn puzzles(&self) -> &[Puzzle] {
        &self.puzzles
    }

    pub fn contains(&self, key: &PuzzleKey) -> bool {
        self.keys.contains(key)
    }

    /// Adds one puzzle. Returns false if its key is already present.
    pub fn insert(&mut self, puzzle: Puzzle) -> bool {
        if self.keys.insert(puzzle.key()) {
            self.puzzles.push(puzzle);
            true
        } else {
            false
        }
    }

    /// Adds puzzles in order, returning the ones that were new.
    pub fn merge<I>(&mut self, puzzles: I) -> Vec<Puzzle>
    where
        I: IntoIterator<Item = Puzzle>,
    {
        puzzles
            .into_iter()
            .filter(|p| self.insert(p.clone()))
            .collect()
    }

    /// Random puzzle for a drill
    pub fn pick_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Puzzle> {
        self.puzzles.choose(rng)
    }
}

impl From<Vec<Puzzle>> for PuzzleSet {
    fn from(puzzles: Vec<Puzzle>) -> Self {
        let mut set = PuzzleSet::new();
        set.merge(puzzles);
        set
    }
}

impl From<PuzzleSet> for Vec<Puzzle> {
    fn from(set: PuzzleSet) -> Self {
        set.puzzles
    }
}
