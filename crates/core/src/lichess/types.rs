//! Lichess API data types

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::engine::{EngineEvaluation, EngineLine, EngineScore, MAX_ALTERNATE_LINES};
use crate::games::{GameMode, GameRecord, GameResult, PlayerInfo};

#[derive(Debug, Clone, Default)]
pub struct GameExportParams {
    pub max: Option<u32>,
    pub until: Option<u64>, // Unix timestamp in milliseconds
}

impl GameExportParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max(mut self, max: u32) -> Self {
        self.max = Some(max);
        self
    }

    pub fn until(mut self, timestamp: u64) -> Self {
        self.until = Some(timestamp);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LichessGame {
    pub id: String,
    pub rated: bool,
    pub variant: String,
    pub speed: String,
    pub created_at: u64,
    pub last_move_at: u64,
    pub status: String,
    pub players: Players,
    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default)]
    pub moves: Option<String>,
    #[serde(default)]
    pub pgn: Option<String>,
}

impl LichessGame {
    pub fn result(&self) -> GameResult {
        match self.winner.as_deref() {
            Some("white") => GameResult::WhiteWins,
            Some("black") => GameResult::BlackWins,
            _ => match self.status.as_str() {
                "created" | "started" | "aborted" | "noStart" | "unknownFinish" => {
                    GameResult::Unfinished
                }
                _ => GameResult::Draw,
            },
        }
    }

    /// Converts to a neutral record. Variants other than standard chess and
    /// unknown speeds are not representable and yield `None`.
    pub fn to_record(&self) -> Option<GameRecord> {
        if self.variant != "standard" && self.variant != "fromPosition" {
            return None;
        }
        let mode = GameMode::from_speed(&self.speed)?;
        let end_time = DateTime::from_timestamp_millis(i64::try_from(self.last_move_at).ok()?)?;
        let transcript = self
            .pgn
            .clone()
            .or_else(|| self.moves.clone())
            .unwrap_or_default();

        Some(GameRecord {
            id: self.id.clone(),
            mode,
            rated: self.rated,
            white: self.players.white.info(),
            black: self.players.black.info(),
            result: self.result(),
            end_time,
            transcript,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Players {
    pub white: Player,
    pub black: Player,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub user: Option<User>,
    pub rating: Option<u16>,
    pub rating_diff: Option<i16>,
}

impl Player {
    pub fn username(&self) -> &str {
        self.user
            .as_ref()
            .map(|u| u.name.as_str())
            .unwrap_or("Anonymous")
    }

    /// Rating after the game
    pub fn rating_after(&self) -> Option<u16> {
        let rating = self.rating?;
        match self.rating_diff {
            Some(diff) => u16::try_from(i32::from(rating) + i32::from(diff)).ok(),
            None => Some(rating),
        }
    }

    fn info(&self) -> PlayerInfo {
        PlayerInfo {
            name: self.username().to_string(),
            rating: self.rating_after(),
            rating_before: self.rating,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudEval {
    pub fen: String,
    pub depth: u8,
    pub pvs: Vec<PvLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PvLine {
    pub moves: String,
    pub cp: Option<i32>,
    pub mate: Option<i32>,
}

impl PvLine {
    /// Cloud scores are already white-positive
    pub fn score(&self) -> Option<EngineScore> {
        match (self.mate, self.cp) {
            (Some(mate), _) => Some(EngineScore::mate(mate)),
            (None, Some(cp)) => Some(EngineScore::cp(cp)),
            (None, None) => None,
        }
    }

    pub fn move_list(&self) -> Vec<String> {
        self.moves.split_whitespace().map(String::from).collect()
    }
}

impl CloudEval {
    /// `None` when the service returned no lines
    pub fn to_evaluation(&self) -> Option<EngineEvaluation> {
        let best = self.pvs.first()?;
        let principal_variation = best.move_list();
        let best_move = principal_variation.first().cloned().unwrap_or_default();

        let lines = self
            .pvs
            .iter()
            .take(MAX_ALTERNATE_LINES)
            .map(|pv| EngineLine {
                moves: pv.move_list(),
                score: pv.score(),
            })
            .collect();

        Some(EngineEvaluation {
            best_move,
            score: best.score(),
            depth: self.depth,
            principal_variation,
            alternate_lines: lines,
        })
    }
}

/// One perf's history from `/api/user/{name}/rating-history`
#[derive(Debug, Clone, Deserialize)]
pub struct RatingHistoryEntry {
    pub name: String,
    /// `[year, month (0-based), day, rating]`
    pub points: Vec<[i32; 4]>,
}

impl RatingHistoryEntry {
    pub fn mode(&self) -> Option<GameMode> {
        GameMode::from_speed(&self.name.replace(' ', ""))
    }

    pub fn series(&self) -> Vec<(DateTime<Utc>, u16)> {
        self.points
            .iter()
            .filter_map(|&[year, month, day, rating]| {
                let date = NaiveDate::from_ymd_opt(year, u32::try_from(month + 1).ok()?, u32::try_from(day).ok()?)?;
                let time = date.and_hms_opt(0, 0, 0)?.and_utc();
                Some((time, u16::try_from(rating).ok()?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAME_JSON: &str = r#"{
        "id": "q7ZvsdUF",
        "rated": true,
        "variant": "standard",
        "speed": "blitz",
        "perf": "blitz",
        "createdAt": 1709290000000,
        "lastMoveAt": 1709290800000,
        "status": "mate",
        "players": {
            "white": {"user": {"name": "Alice", "id": "alice"}, "rating": 1500, "ratingDiff": 7},
            "black": {"user": {"name": "bob", "id": "bob"}, "rating": 1520, "ratingDiff": -7}
        },
        "winner": "white",
        "moves": "e4 e5 Qh5 Nc6 Bc4 Nf6 Qxf7#",
        "pgn": "[Event \"Rated blitz game\"]\n\n1. e4 e5 2. Qh5 Nc6 3. Bc4 Nf6 4. Qxf7# 1-0\n"
    }"#;

    #[test]
    fn test_game_to_record() {
        let game: LichessGame = serde_json::from_str(GAME_JSON).unwrap();
        let record = game.to_record().unwrap();
        assert_eq!(record.mode, GameMode::Blitz);
        assert_eq!(record.result, GameResult::WhiteWins);
        assert_eq!(record.white.rating, Some(1507));
        assert_eq!(record.black.rating, Some(1513));
        assert_eq!(record.white.rating_before, Some(1500));
        assert_eq!(record.black.rating_before, Some(1520));
        assert_eq!(record.end_time.timestamp_millis(), 1709290800000);
        assert!(record.transcript.starts_with("[Event"));
    }

    #[test]
    fn test_result_from_status() {
        let mut game: LichessGame = serde_json::from_str(GAME_JSON).unwrap();
        game.winner = None;
        game.status = "stalemate".to_string();
        assert_eq!(game.result(), GameResult::Draw);
        game.status = "started".to_string();
        assert_eq!(game.result(), GameResult::Unfinished);
    }

    #[test]
    fn test_variant_rejected() {
        let mut game: LichessGame = serde_json::from_str(GAME_JSON).unwrap();
        game.variant = "atomic".to_string();
        assert!(game.to_record().is_none());
    }

    #[test]
    fn test_cloud_eval_conversion() {
        let json = r#"{
            "fen": "r1bqkbnr/pppp1ppp/2n5/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
            "knodes": 1200,
            "depth": 30,
            "pvs": [
                {"moves": "h5f7", "mate": 1},
                {"moves": "g1f3 g8f6", "cp": 150}
            ]
        }"#;
        let cloud: CloudEval = serde_json::from_str(json).unwrap();
        let eval = cloud.to_evaluation().unwrap();
        assert_eq!(eval.best_move, "h5f7");
        assert_eq!(eval.score, Some(EngineScore::mate(1)));
        assert_eq!(eval.depth, 30);
        assert_eq!(eval.alternate_lines.len(), 2);
        assert_eq!(eval.alternate_lines[1].score, Some(EngineScore::cp(150)));
    }

    #[test]
    fn test_rating_history_series() {
        let json = r#"[{"name": "Blitz", "points": [[2024, 0, 15, 1500], [2024, 1, 29, 1550]]},
                       {"name": "Puzzles", "points": [[2024, 0, 1, 1800]]}]"#;
        let history: Vec<RatingHistoryEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(history[0].mode(), Some(GameMode::Blitz));
        assert_eq!(history[1].mode(), None);

        let series = history[0].series();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].0.to_rfc3339(), "2024-01-15T00:00:00+00:00");
        assert_eq!(series[1].1, 1550);
    }
}
