//! Chess Review Core Library
//!
//! Builds a position timeline from a game transcript, tracks engine
//! evaluations per position, classifies every move and derives history
//! analytics and training puzzles for a player.

pub mod analytics;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod games;
pub mod lichess;
pub mod puzzles;
pub mod review;
pub mod serde_color;
pub mod storage;
pub mod timeline;

pub use classify::{classify_game, classify_move, GameReview, MoveLabel, MoveQuality};
pub use config::{MinerConfig, ReviewConfig};
pub use engine::{EngineEvaluation, EngineScore, Evaluator, StockfishEngine};
pub use error::{Error, Result};
pub use games::{GameMode, GameRecord};
pub use lichess::LichessClient;
pub use puzzles::{mine_puzzles, Puzzle, PuzzleSet};
pub use review::{EvaluationState, ReviewSession};
pub use storage::{Database, KeyValueStore};
pub use timeline::{build_timeline, MoveSnapshot, Timeline};
