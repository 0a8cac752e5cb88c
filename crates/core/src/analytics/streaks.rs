//! Win and loss streaks

use serde::{Deserialize, Serialize};

use crate::games::{GameRecord, Outcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streaks {
    pub best_win_streak: u32,
    pub best_loss_streak: u32,
}

/// Longest runs over a chronological sequence of outcomes.
///
/// A draw ends both runs.
pub fn streaks_from_outcomes<I>(outcomes: I) -> Streaks
where
    I: IntoIterator<Item = Outcome>,
{
    let mut streaks = Streaks::default();
    let (mut wins, mut losses) = (0u32, 0u32);

    for outcome in outcomes {
        match outcome {
            Outcome::Win => {
                wins += 1;
                losses = 0;
            }
            Outcome::Loss => {
                losses += 1;
                wins = 0;
            }
            Outcome::Draw => {
                wins = 0;
                losses = 0;
            }
        }
        streaks.best_win_streak = streaks.best_win_streak.max(wins);
        streaks.best_loss_streak = streaks.best_loss_streak.max(losses);
    }

    streaks
}

/// Streaks for `player`, scanning games by end time. Unfinished games and
/// games the player was not in are skipped.
pub fn compute_streaks(games: &[GameRecord], player: &str) -> Streaks {
    let mut ordered: Vec<&GameRecord> = games.iter().collect();
    ordered.sort_by_key(|g| g.end_time);
    streaks_from_outcomes(ordered.into_iter().filter_map(|g| g.outcome_for(player)))
}
