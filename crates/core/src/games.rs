//! Source-neutral game records used by the analytics and the puzzle miner

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shakmaty::Color;

/// Time-control family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Bullet,
    Blitz,
    Rapid,
    Classical,
    Correspondence,
}

impl GameMode {
    pub const ALL: [GameMode; 5] = [
        GameMode::Bullet,
        GameMode::Blitz,
        GameMode::Rapid,
        GameMode::Classical,
        GameMode::Correspondence,
    ];

    /// Maps a speed/perf name as used by game servers
    pub fn from_speed(speed: &str) -> Option<Self> {
        match speed.to_ascii_lowercase().as_str() {
            "ultrabullet" | "bullet" => Some(GameMode::Bullet),
            "blitz" => Some(GameMode::Blitz),
            "rapid" => Some(GameMode::Rapid),
            "classical" => Some(GameMode::Classical),
            "correspondence" | "daily" => Some(GameMode::Correspondence),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Bullet => "bullet",
            GameMode::Blitz => "blitz",
            GameMode::Rapid => "rapid",
            GameMode::Classical => "classical",
            GameMode::Correspondence => "correspondence",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameMode::from_speed(s).ok_or_else(|| format!("unknown game mode: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
    /// Still running, aborted or never started
    Unfinished,
}

impl GameResult {
    pub fn winner(&self) -> Option<Color> {
        match self {
            GameResult::WhiteWins => Some(Color::White),
            GameResult::BlackWins => Some(Color::Black),
            _ => None,
        }
    }
}

/// Result from one player's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    /// Rating after the game
    pub rating: Option<u16>,
    /// Rating the game was paired at
    #[serde(default)]
    pub rating_before: Option<u16>,
}

/// One finished or running game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: String,
    pub mode: GameMode,
    pub rated: bool,
    pub white: PlayerInfo,
    pub black: PlayerInfo,
    pub result: GameResult,
    pub end_time: DateTime<Utc>,
    /// PGN or bare SAN movetext
    pub transcript: String,
}

impl GameRecord {
    /// Color `player` had in this game (case-insensitive)
    pub fn player_color(&self, player: &str) -> Option<Color> {
        if self.white.name.eq_ignore_ascii_case(player) {
            Some(Color::White)
        } else if self.black.name.eq_ignore_ascii_case(player) {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn player(&self, color: Color) -> &PlayerInfo {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    /// `None` when the player did not take part or the game is unfinished
    pub fn outcome_for(&self, player: &str) -> Option<Outcome> {
        let color = self.player_color(player)?;
        match self.result {
            GameResult::Unfinished => None,
            GameResult::Draw => Some(Outcome::Draw),
            result if result.winner() == Some(color) => Some(Outcome::Win),
            _ => Some(Outcome::Loss),
        }
    }

    pub fn rating_of(&self, player: &str) -> Option<u16> {
        self.player_color(player).and_then(|c| self.player(c).rating)
    }

    /// Pre-game rating, falling back to the post-game one when unknown
    pub fn rating_before_of(&self, player: &str) -> Option<u16> {
        self.player_color(player).and_then(|c| {
            let info = self.player(c);
            info.rating_before.or(info.rating)
        })
    }

    pub fn opponent_of(&self, player: &str) -> Option<&PlayerInfo> {
        self.player_color(player).map(|c| self.player(!c))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_mode_from_speed() {
        assert_eq!(GameMode::from_speed("ultraBullet"), Some(GameMode::Bullet));
        assert_eq!(GameMode::from_speed("Blitz"), Some(GameMode::Blitz));
        assert_eq!(GameMode::from_speed("daily"), Some(GameMode::Correspondence));
        assert_eq!(GameMode::from_speed("chess960"), None);
        assert_eq!("rapid".parse::<GameMode>().unwrap(), GameMode::Rapid);
    }

    #[test]
    fn test_player_lookup_ignores_case() {
        let g = game("a", ("Alice", 1500), ("bob", 1400), GameResult::BlackWins, at(1));
        assert_eq!(g.player_color("alice"), Some(Color::White));
        assert_eq!(g.player_color("BOB"), Some(Color::Black));
        assert_eq!(g.player_color("carol"), None);
        assert_eq!(g.rating_of("Bob"), Some(1400));
        assert_eq!(g.opponent_of("bob").unwrap().name, "Alice");
    }

    #[test]
    fn test_outcome() {
        let g = game("a", ("alice", 1500), ("bob", 1400), GameResult::BlackWins, at(1));
        assert_eq!(g.outcome_for("alice"), Some(Outcome::Loss));
        assert_eq!(g.outcome_for("bob"), Some(Outcome::Win));
        assert_eq!(g.outcome_for("carol"), None);

        let g = game("b", ("alice", 1500), ("bob", 1400), GameResult::Unfinished, at(1));
        assert_eq!(g.outcome_for("alice"), None);

        let g = game("c", ("alice", 1500), ("bob", 1400), GameResult::Draw, at(1));
        assert_eq!(g.outcome_for("bob"), Some(Outcome::Draw));
    }
}
