pub mod client;
pub mod espn;
pub mod playlist;
pub mod status;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Domain types: clean model, independent of ESPN wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum League {
    #[serde(alias = "nba")]
    Basketball,
    #[serde(alias = "nfl")]
    Football,
    #[serde(alias = "nhl")]
    Hockey,
    #[serde(alias = "mlb")]
    Baseball,
}

impl League {
    pub const ALL: [League; 4] = [
        League::Basketball,
        League::Football,
        League::Hockey,
        League::Baseball,
    ];

    /// ESPN path segments: (sport, league).
    pub fn espn_path(&self) -> (&'static str, &'static str) {
        match self {
            League::Basketball => ("basketball", "nba"),
            League::Football => ("football", "nfl"),
            League::Hockey => ("hockey", "nhl"),
            League::Baseball => ("baseball", "mlb"),
        }
    }

    /// Short label, also the prefix playlists put in front of channel names.
    pub fn label(&self) -> &'static str {
        match self {
            League::Basketball => "NBA",
            League::Football => "NFL",
            League::Hockey => "NHL",
            League::Baseball => "MLB",
        }
    }

    /// Match a free-text token ("NBA", "hockey", "mlb") against known leagues.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "NBA" | "BASKETBALL" => Some(League::Basketball),
            "NFL" | "FOOTBALL" => Some(League::Football),
            "NHL" | "HOCKEY" => Some(League::Hockey),
            "MLB" | "BASEBALL" => Some(League::Baseball),
            _ => None,
        }
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.espn_path().1)
    }
}

impl FromStr for League {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        League::from_token(s).ok_or_else(|| format!("unknown league: {s}"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    #[default]
    Scheduled,
    Warmup,
    Live,
    Final,
    Delayed,
    Postponed,
}

impl GameState {
    pub fn label(&self) -> &'static str {
        match self {
            GameState::Scheduled => "scheduled",
            GameState::Warmup => "warmup",
            GameState::Live => "live",
            GameState::Final => "final",
            GameState::Delayed => "delayed",
            GameState::Postponed => "postponed",
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One scheduled contest, rebuilt from scratch on every upstream poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub league: League,
    pub start_time: DateTime<Utc>,
    pub state: GameState,
    /// Upstream free text plus any qualifier appended during normalization.
    pub status_detail: String,
    pub home_team: Team,
    pub away_team: Team,
    pub venue: Option<String>,
}

impl Game {
    pub fn matchup(&self) -> String {
        format!("{} at {}", self.away_team.name, self.home_team.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,         // "Boston Celtics"
    pub abbreviation: String, // "BOS"
    pub logo_ref: Option<String>,
}

impl Team {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }
}
