//! Types for representing engine evaluations

use serde::{Deserialize, Serialize};

use super::score::EngineScore;

/// Number of alternate lines kept per evaluation
pub const MAX_ALTERNATE_LINES: usize = 3;

/// One line of play reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineLine {
    /// Moves in UCI notation
    pub moves: Vec<String>,
    pub score: Option<EngineScore>,
}

/// Complete evaluation of a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvaluation {
    /// Best move found, in UCI notation. Empty when the game is over.
    pub best_move: String,
    /// White-positive score, if the engine reported one
    pub score: Option<EngineScore>,
    /// Analysis depth reached
    pub depth: u8,
    /// Principal variation (best line of play)
    pub principal_variation: Vec<String>,
    /// Ordered best-to-worst, at most `MAX_ALTERNATE_LINES`
    pub alternate_lines: Vec<EngineLine>,
}

impl EngineEvaluation {
    pub fn new(best_move: impl Into<String>, score: EngineScore, depth: u8) -> Self {
        let best_move = best_move.into();
        let principal_variation = if best_move.is_empty() {
            Vec::new()
        } else {
            vec![best_move.clone()]
        };
        Self {
            best_move,
            score: Some(score),
            depth,
            principal_variation,
            alternate_lines: Vec::new(),
        }
    }

    pub fn with_lines(mut self, mut lines: Vec<EngineLine>) -> Self {
        lines.truncate(MAX_ALTERNATE_LINES);
        self.alternate_lines = lines;
        self
    }

    /// Returns a brief summary of the evaluation
    pub fn summary(&self) -> String {
        let score = self
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!(
            "Eval: {} | Best: {} | Depth: {} | PV: {}",
            score,
            self.best_move,
            self.depth,
            self.principal_variation
                .iter()
                .take(5)
                .cloned()
                .collect::<Vec<_>>()
                .join(" ")
        )
    }
}
