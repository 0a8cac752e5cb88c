//! Runtime configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::MAX_ALTERNATE_LINES;
use crate::error::{Error, Result};

/// Settings for reviewing games and mining puzzles
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    /// Path to Stockfish binary
    pub stockfish_path: String,

    /// Search depth for each position
    pub analysis_depth: u8,

    /// Lines reported per search, 1..=3
    pub multi_pv: u8,

    /// Limit for a single evaluation request
    pub eval_timeout: Duration,

    /// Lichess API token for higher rate limits
    pub lichess_token: Option<String>,

    /// SQLite file for persisted puzzles
    pub db_path: String,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            stockfish_path: "stockfish".to_string(),
            analysis_depth: 16,
            multi_pv: MAX_ALTERNATE_LINES as u8,
            eval_timeout: Duration::from_secs(30),
            lichess_token: None,
            db_path: "chess_review.db".to_string(),
        }
    }
}

impl ReviewConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let multi_pv: u8 = parse_var(&lookup, "ENGINE_MULTI_PV")?.unwrap_or(defaults.multi_pv);
        if multi_pv == 0 || usize::from(multi_pv) > MAX_ALTERNATE_LINES {
            return Err(Error::Config(format!(
                "ENGINE_MULTI_PV must be between 1 and {}",
                MAX_ALTERNATE_LINES
            )));
        }

        Ok(Self {
            stockfish_path: lookup("STOCKFISH_PATH").unwrap_or(defaults.stockfish_path),
            analysis_depth: parse_var(&lookup, "ANALYSIS_DEPTH")?.unwrap_or(defaults.analysis_depth),
            multi_pv,
            eval_timeout: parse_var(&lookup, "EVAL_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.eval_timeout),
            lichess_token: lookup("LICHESS_TOKEN").filter(|t| !t.trim().is_empty()),
            db_path: lookup("REVIEW_DB_PATH").unwrap_or(defaults.db_path),
        })
    }

    pub fn miner(&self) -> MinerConfig {
        MinerConfig {
            depth: self.analysis_depth,
            eval_timeout: self.eval_timeout,
            ..MinerConfig::default()
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{} = {:?}: {}", name, raw, e))),
    }
}

/// Puzzle miner settings
#[derive(Debug, Clone)]
pub struct MinerConfig {
    pub depth: u8,
    /// Smallest loss that makes a puzzle
    pub min_loss: u32,
    /// Largest disadvantage (mover's view) a puzzle may start from
    pub max_disadvantage: i32,
    pub eval_timeout: Duration,
    /// Games fetched per archive page
    pub page_size: u32,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            depth: 12,
            min_loss: 200,
            max_disadvantage: 50,
            eval_timeout: Duration::from_secs(30),
            page_size: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ReviewConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.stockfish_path, "stockfish");
        assert_eq!(config.analysis_depth, 16);
        assert_eq!(config.multi_pv, 3);
        assert_eq!(config.eval_timeout, Duration::from_secs(30));
        assert!(config.lichess_token.is_none());
        assert_eq!(config.db_path, "chess_review.db");
    }

    #[test]
    fn test_overrides() {
        let config = ReviewConfig::from_lookup(lookup(&[
            ("STOCKFISH_PATH", "/usr/games/stockfish"),
            ("ANALYSIS_DEPTH", "22"),
            ("ENGINE_MULTI_PV", "1"),
            ("EVAL_TIMEOUT_SECS", " 5 "),
            ("LICHESS_TOKEN", "lip_abc"),
        ]))
        .unwrap();
        assert_eq!(config.stockfish_path, "/usr/games/stockfish");
        assert_eq!(config.analysis_depth, 22);
        assert_eq!(config.multi_pv, 1);
        assert_eq!(config.eval_timeout, Duration::from_secs(5));
        assert_eq!(config.lichess_token.as_deref(), Some("lip_abc"));

        let miner = config.miner();
        assert_eq!(miner.depth, 22);
        assert_eq!(miner.min_loss, 200);
    }

    #[test]
    fn test_malformed_numbers_rejected() {
        let result = ReviewConfig::from_lookup(lookup(&[("ANALYSIS_DEPTH", "deep")]));
        assert!(matches!(result, Err(Error::Config(_))));

        let result = ReviewConfig::from_lookup(lookup(&[("ENGINE_MULTI_PV", "5")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_blank_token_ignored() {
        let config = ReviewConfig::from_lookup(lookup(&[("LICHESS_TOKEN", "  ")])).unwrap();
        assert!(config.lichess_token.is_none());
    }
}
