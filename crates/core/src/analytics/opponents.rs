//! Opponent-based statistics

use serde::{Deserialize, Serialize};

use crate::games::{GameMode, GameRecord, Outcome};

/// Highest-rated opponent the player beat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatenOpponent {
    pub name: String,
    pub rating: u16,
    pub game_id: String,
}

/// Strongest opponent beaten among `games`. On equal ratings the first game
/// in iteration order wins.
pub fn strongest_opponent_beaten<'a, I>(games: I, player: &str) -> Option<BeatenOpponent>
where
    I: IntoIterator<Item = &'a GameRecord>,
{
    let mut best: Option<BeatenOpponent> = None;
    for game in games {
        if game.outcome_for(player) != Some(Outcome::Win) {
            continue;
        }
        let Some(opponent) = game.opponent_of(player) else {
            continue;
        };
        let Some(rating) = opponent.rating else {
            continue;
        };
        if best.as_ref().map_or(true, |b| rating > b.rating) {
            best = Some(BeatenOpponent {
                name: opponent.name.clone(),
                rating,
                game_id: game.id.clone(),
            });
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketStats {
    pub games: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    /// Fraction of games won, 0.0..=1.0
    pub win_rate: f64,
    /// Mean of (opponent rating - own rating)
    pub average_rating_diff: f64,
}

/// One segment of games. Empty segments carry no made-up figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Bucket {
    InsufficientData,
    Stats(BucketStats),
}

impl Bucket {
    pub fn stats(&self) -> Option<&BucketStats> {
        match self {
            Bucket::Stats(stats) => Some(stats),
            Bucket::InsufficientData => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentSegments {
    pub mode: GameMode,
    /// Opponent rated at or above the player
    pub stronger_or_equal: Bucket,
    pub weaker: Bucket,
}

#[derive(Default)]
struct Tally {
    games: u32,
    wins: u32,
    draws: u32,
    losses: u32,
    diff_sum: i64,
}

impl Tally {
    fn add(&mut self, outcome: Outcome, diff: i32) {
        self.games += 1;
        self.diff_sum += i64::from(diff);
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Draw => self.draws += 1,
            Outcome::Loss => self.losses += 1,
        }
    }

    fn into_bucket(self) -> Bucket {
        if self.games == 0 {
            return Bucket::InsufficientData;
        }
        let games = f64::from(self.games);
        Bucket::Stats(BucketStats {
            games: self.games,
            wins: self.wins,
            draws: self.draws,
            losses: self.losses,
            win_rate: f64::from(self.wins) / games,
            average_rating_diff: self.diff_sum as f64 / games,
        })
    }
}

/// Splits the rated, finished games of `mode` by opponent strength.
///
/// Strength is judged on pre-game ratings, the ones the pairing was made at.
pub fn segment_by_opponent_strength(games: &[GameRecord], player: &str, mode: GameMode) -> OpponentSegments {
    let mut stronger = Tally::default();
    let mut weaker = Tally::default();

    for game in games.iter().filter(|g| g.rated && g.mode == mode) {
        let (Some(outcome), Some(own), Some(theirs)) = (
            game.outcome_for(player),
            game.rating_before_of(player),
            game.opponent_of(player).and_then(|o| o.rating_before.or(o.rating)),
        ) else {
            continue;
        };
        let diff = i32::from(theirs) - i32::from(own);
        if theirs >= own {
            stronger.add(outcome, diff);
        } else {
            weaker.add(outcome, diff);
        }
    }

    OpponentSegments {
        mode,
        stronger_or_equal: stronger.into_bucket(),
        weaker: weaker.into_bucket(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::fixtures::{at, game};
    use crate::games::GameResult;

    #[test]
    fn test_strongest_opponent_beaten() {
        let games = vec![
            game("1", ("me", 1500), ("a", 1650), GameResult::WhiteWins, at(1)),
            game("2", ("b", 1800), ("me", 1500), GameResult::WhiteWins, at(2)),
            game("3", ("c", 1700), ("me", 1500), GameResult::BlackWins, at(3)),
            game("4", ("me", 1500), ("d", 1700), GameResult::WhiteWins, at(4)),
        ];
        let best = strongest_opponent_beaten(&games, "me").unwrap();
        assert_eq!(best.name, "c");
        assert_eq!(best.rating, 1700);
        assert_eq!(best.game_id, "3");
    }

    #[test]
    fn test_no_wins() {
        let games = vec![game("1", ("me", 1500), ("a", 1650), GameResult::Draw, at(1))];
        assert!(strongest_opponent_beaten(&games, "me").is_none());
    }

    #[test]
    fn test_segmentation() {
        let games = vec![
            game("1", ("me", 1500), ("a", 1600), GameResult::WhiteWins, at(1)),
            game("2", ("me", 1500), ("b", 1500), GameResult::BlackWins, at(2)),
            game("3", ("c", 1400), ("me", 1500), GameResult::WhiteWins, at(3)),
        ];
        let segments = segment_by_opponent_strength(&games, "me", GameMode::Blitz);

        let stronger = segments.stronger_or_equal.stats().unwrap();
        assert_eq!(stronger.games, 2);
        assert_eq!(stronger.wins, 1);
        assert_eq!(stronger.win_rate, 0.5);
        assert_eq!(stronger.average_rating_diff, 50.0);

        let weaker = segments.weaker.stats().unwrap();
        assert_eq!(weaker.losses, 1);
        assert_eq!(weaker.win_rate, 0.0);
        assert_eq!(weaker.average_rating_diff, -100.0);
    }

    #[test]
    fn test_segmentation_uses_pre_game_ratings() {
        // Paired 5 points below the opponent; the win flips the post-game order.
        let mut upset = game("1", ("me", 1508), ("a", 1497), GameResult::WhiteWins, at(1));
        upset.white.rating_before = Some(1500);
        upset.black.rating_before = Some(1505);
        // No pre-game figure: post-game ratings are used.
        let mut bare = game("2", ("b", 1400), ("me", 1500), GameResult::Draw, at(2));
        bare.white.rating_before = None;
        bare.black.rating_before = None;

        let segments = segment_by_opponent_strength(&[upset, bare], "me", GameMode::Blitz);
        let stronger = segments.stronger_or_equal.stats().unwrap();
        assert_eq!(stronger.games, 1);
        assert_eq!(stronger.wins, 1);
        assert_eq!(stronger.average_rating_diff, 5.0);

        let weaker = segments.weaker.stats().unwrap();
        assert_eq!(weaker.draws, 1);
        assert_eq!(weaker.average_rating_diff, -100.0);
    }

    #[test]
    fn test_empty_bucket_is_insufficient() {
        let games = vec![game("1", ("me", 1500), ("a", 1600), GameResult::WhiteWins, at(1))];
        let segments = segment_by_opponent_strength(&games, "me", GameMode::Blitz);
        assert_eq!(segments.weaker, Bucket::InsufficientData);

        let segments = segment_by_opponent_strength(&games, "me", GameMode::Rapid);
        assert_eq!(segments.stronger_or_equal, Bucket::InsufficientData);
    }
}
