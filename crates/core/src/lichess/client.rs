//! Lichess API client for game archives, rating history and cloud evaluations

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::types::*;
use crate::engine::{EngineError, EvalStream, Evaluator, StreamEvent, MAX_ALTERNATE_LINES};
use crate::error::{Error, Result};
use crate::games::{GameMode, GameRecord};

const LICHESS_API_BASE: &str = "https://lichess.org/api";

/// One page of a player's game archive, newest first
#[derive(Debug, Clone)]
pub struct ArchivePage {
    pub games: Vec<GameRecord>,
    pub has_more: bool,
    /// Pass back to fetch the next (older) page
    pub next_cursor: Option<u64>,
}

#[derive(Clone)]
pub struct LichessClient {
    client: Client,
    token: Option<String>,
}

impl LichessClient {
    pub fn new() -> Result<Self> {
        Self::build(None)
    }

    pub fn with_token(token: String) -> Result<Self> {
        Self::build(Some(token))
    }

    fn build(token: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, token })
    }

    fn headers(&self, accept: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(accept));

        if let Some(ref token) = self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    /// Fetch games for a user
    pub async fn get_user_games(&self, username: &str, params: &GameExportParams) -> Result<Vec<LichessGame>> {
        let url = format!("{}/games/user/{}", LICHESS_API_BASE, username);

        let mut request = self
            .client
            .get(&url)
            .headers(self.headers("application/x-ndjson"))
            .query(&[("pgnInJson", "true"), ("clocks", "true"), ("moves", "true")]);

        if let Some(max) = params.max {
            request = request.query(&[("max", max.to_string())]);
        }
        if let Some(until) = params.until {
            request = request.query(&[("until", until.to_string())]);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(Error::Lichess(format!(
                "API error: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let text = response.text().await?;
        Ok(parse_ndjson_games(&text))
    }

    /// Fetch one page of a player's archive.
    ///
    /// `cursor` is the value returned as `next_cursor` by the previous page,
    /// `None` for the newest games.
    pub async fn fetch_game_archive(
        &self,
        username: &str,
        cursor: Option<u64>,
        page_size: u32,
    ) -> Result<ArchivePage> {
        let mut params = GameExportParams::new().max(page_size);
        if let Some(until) = cursor {
            params = params.until(until);
        }

        let raw = self.get_user_games(username, &params).await?;
        let page = archive_page(&raw, page_size);
        debug!(
            username,
            fetched = raw.len(),
            usable = page.games.len(),
            has_more = page.has_more,
            "fetched archive page"
        );
        Ok(page)
    }

    /// Rating points per game mode
    pub async fn rating_history(&self, username: &str) -> Result<BTreeMap<GameMode, Vec<(DateTime<Utc>, u16)>>> {
        let url = format!("{}/user/{}/rating-history", LICHESS_API_BASE, username);

        let response = self
            .client
            .get(&url)
            .headers(self.headers("application/json"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Lichess(format!(
                "Rating history error for {}: {}",
                username,
                response.status()
            )));
        }

        let entries: Vec<RatingHistoryEntry> = response.json().await?;
        let mut history: BTreeMap<GameMode, Vec<(DateTime<Utc>, u16)>> = BTreeMap::new();
        for entry in &entries {
            if let Some(mode) = entry.mode() {
                history.entry(mode).or_default().extend(entry.series());
            }
        }
        for points in history.values_mut() {
            points.sort_by_key(|(time, _)| *time);
        }
        Ok(history)
    }

    /// Get cloud evaluation for a FEN position
    pub async fn cloud_eval(&self, fen: &str, multi_pv: u8) -> Result<CloudEval> {
        let url = format!("{}/cloud-eval", LICHESS_API_BASE);

        let response = self
            .client
            .get(&url)
            .headers(self.headers("application/json"))
            .query(&[("fen", fen), ("multiPv", &multi_pv.to_string())])
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(Error::Lichess(
                "No cloud evaluation for this position".to_string(),
            )),
            status => Err(Error::Lichess(format!("Cloud eval error: {}", status))),
        }
    }
}

/// The cloud service answers once, at whatever depth it has stored.
impl Evaluator for LichessClient {
    fn evaluate_stream(&self, fen: &str, _depth: u8) -> EvalStream {
        let (tx, stream) = EvalStream::channel();
        let client = self.clone();
        let fen = fen.to_string();

        tokio::spawn(async move {
            let event = match client.cloud_eval(&fen, MAX_ALTERNATE_LINES as u8).await {
                Ok(cloud) => match cloud.to_evaluation() {
                    Some(eval) => StreamEvent::Update(eval),
                    None => StreamEvent::Failed(EngineError::NoResult),
                },
                Err(e) => {
                    warn!(fen = %fen, error = %e, "cloud evaluation failed");
                    StreamEvent::Failed(EngineError::Remote(e.to_string()))
                }
            };
            let succeeded = matches!(event, StreamEvent::Update(_));
            if tx.send(event).await.is_ok() && succeeded {
                let _ = tx.send(StreamEvent::Done).await;
            }
        });

        stream
    }
}

fn archive_page(raw: &[LichessGame], page_size: u32) -> ArchivePage {
    let games = raw.iter().filter_map(LichessGame::to_record).collect();
    let has_more = page_size > 0 && raw.len() >= page_size as usize;
    let next_cursor = if has_more {
        raw.iter()
            .map(|g| g.created_at)
            .min()
            .map(|oldest| oldest.saturating_sub(1))
    } else {
        None
    };
    ArchivePage {
        games,
        has_more,
        next_cursor,
    }
}

fn parse_ndjson_games(text: &str) -> Vec<LichessGame> {
    let mut games = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<LichessGame>(line) {
            Ok(game) => games.push(game),
            Err(e) => {
                warn!(error = %e, "failed to parse game");
                continue;
            }
        }
    }

    games
}
