//! Blunder puzzles mined from a player's games

mod extract;
mod miner;
mod types;

pub use extract::extract_puzzles;
pub use miner::{mine_game, mine_puzzles, MiningJob};
pub use types::{GameMeta, Puzzle, PuzzleKey, PuzzleSet};
