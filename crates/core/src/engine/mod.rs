//! Chess engine integration
//!
//! Scores, evaluations and the evaluator capability, plus a UCI adapter for
//! engines like Stockfish.

pub mod analysis;
pub mod score;
pub mod stockfish;
pub mod stream;

pub use analysis::{EngineEvaluation, EngineLine, MAX_ALTERNATE_LINES};
pub use score::{
    mating_side, signed_centipawns_at, to_mover_perspective, to_signed_centipawns, EngineScore,
    MATE_SCORE,
};
pub use stockfish::StockfishEngine;
pub use stream::{EngineError, EvalStream, Evaluator, StreamEvent};
