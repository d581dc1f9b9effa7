use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use gamecast_api::{Game, GameState, League, Team};

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub fn day(y: i32, mo: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, mo, d).unwrap()
}

pub fn game(id: &str, league: League, start: DateTime<Utc>, home: &str, away: &str) -> Game {
    Game {
        id: id.to_owned(),
        league,
        start_time: start,
        state: GameState::Scheduled,
        status_detail: String::new(),
        home_team: Team::named(home),
        away_team: Team::named(away),
        venue: None,
    }
}
