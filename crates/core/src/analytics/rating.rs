//! Rating change over a trailing window

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::games::{GameMode, GameRecord};

/// Length of the trailing window
pub const RATING_WINDOW_DAYS: i64 = 7;

/// Rating movement in one mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDelta {
    pub mode: GameMode,
    pub current_rating: Option<u16>,
    pub prior_rating: Option<u16>,
    pub delta: i32,
    /// Rated points the delta was computed from
    pub games: usize,
}

impl RatingDelta {
    pub fn empty(mode: GameMode) -> Self {
        Self {
            mode,
            current_rating: None,
            prior_rating: None,
            delta: 0,
            games: 0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.games > 0
    }
}

/// Delta for a time-ordered or unordered series of `(time, rating)` points.
///
/// The baseline is the last point before the window opens (`now - 7 days`);
/// when the whole series lies inside the window, the earliest point is used.
pub fn rating_delta_from_series(
    mode: GameMode,
    points: &[(DateTime<Utc>, u16)],
    now: DateTime<Utc>,
) -> RatingDelta {
    let mut sorted: Vec<(DateTime<Utc>, u16)> = points.iter().copied().filter(|(t, _)| *t <= now).collect();
    sorted.sort_by_key(|(t, _)| *t);

    let Some(&(_, current)) = sorted.last() else {
        return RatingDelta::empty(mode);
    };

    let window_start = now - Duration::days(RATING_WINDOW_DAYS);
    let baseline = sorted
        .iter()
        .rev()
        .find(|(t, _)| *t < window_start)
        .or_else(|| sorted.first())
        .map(|&(_, rating)| rating)
        .unwrap_or(current);

    RatingDelta {
        mode,
        current_rating: Some(current),
        prior_rating: Some(baseline),
        delta: i32::from(current) - i32::from(baseline),
        games: sorted.len(),
    }
}

/// Rating delta per mode for `player`. Every mode is present, with delta 0
/// when there are no games.
pub fn compute_rating_deltas(
    games: &[GameRecord],
    player: &str,
    now: DateTime<Utc>,
) -> BTreeMap<GameMode, RatingDelta> {
    GameMode::ALL
        .iter()
        .map(|&mode| {
            let points: Vec<(DateTime<Utc>, u16)> = games
                .iter()
                .filter(|g| g.mode == mode && g.rated)
                .filter_map(|g| g.rating_of(player).map(|r| (g.end_time, r)))
                .collect();
            (mode, rating_delta_from_series(mode, &points, now))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::fixtures::{at, game};
    use crate::games::GameResult;

    #[test]
    fn test_delta_across_window() {
        let now = at(20);
        let games = vec![
            game("g1", ("me", 1200), ("x", 1300), GameResult::WhiteWins, now - Duration::days(10)),
            game("g2", ("y", 1100), ("me", 1250), GameResult::BlackWins, now - Duration::days(1)),
        ];

        let deltas = compute_rating_deltas(&games, "me", now);
        let blitz = &deltas[&GameMode::Blitz];
        assert_eq!(blitz.delta, 50);
        assert_eq!(blitz.prior_rating, Some(1200));
        assert_eq!(blitz.current_rating, Some(1250));

        let bullet = &deltas[&GameMode::Bullet];
        assert_eq!(bullet.delta, 0);
        assert!(!bullet.has_data());
        assert_eq!(deltas.len(), GameMode::ALL.len());
    }

    #[test]
    fn test_baseline_is_last_point_before_window() {
        let now = at(20);
        let points = vec![
            (now - Duration::days(2), 1530),
            (now - Duration::days(15), 1400),
            (now - Duration::days(9), 1480),
            (now - Duration::days(5), 1500),
        ];
        let delta = rating_delta_from_series(GameMode::Rapid, &points, now);
        assert_eq!(delta.prior_rating, Some(1480));
        assert_eq!(delta.delta, 50);
    }

    #[test]
    fn test_all_points_inside_window() {
        let now = at(20);
        let points = vec![(now - Duration::days(3), 1600), (now - Duration::days(1), 1580)];
        let delta = rating_delta_from_series(GameMode::Blitz, &points, now);
        assert_eq!(delta.delta, -20);
        assert_eq!(delta.games, 2);
    }

    #[test]
    fn test_single_point() {
        let now = at(20);
        let delta = rating_delta_from_series(GameMode::Blitz, &[(now - Duration::days(30), 1700)], now);
        assert_eq!(delta.delta, 0);
        assert_eq!(delta.current_rating, Some(1700));
    }

    #[test]
    fn test_unrated_and_foreign_games_ignored() {
        let now = at(20);
        let mut casual = game("c", ("me", 900), ("x", 1000), GameResult::Draw, now - Duration::days(2));
        casual.rated = false;
        let other = game("o", ("a", 2000), ("b", 2100), GameResult::Draw, now - Duration::days(2));
        let deltas = compute_rating_deltas(&[casual, other], "me", now);
        assert!(!deltas[&GameMode::Blitz].has_data());
    }
}
