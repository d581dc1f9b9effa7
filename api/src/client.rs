use crate::espn::{EspnCompetitor, EspnEvent, EspnStatus, EspnVenue, ScoreboardResponse};
use crate::status::{StateRules, UpstreamSignal, annotate};
use crate::{Game, League, Team};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use std::fmt;
use std::time::Duration;

pub type ApiResult<T> = Result<T, ApiError>;

const ESPN_SITE_V2: &str = "https://site.api.espn.com/apis/site/v2/sports";

/// Schedule feed client backed by ESPN's public scoreboard endpoints.
#[derive(Debug, Clone)]
pub struct FeedApi {
    client: Client,
    timeout: Duration,
    base_url: String,
    rules: StateRules,
}

impl Default for FeedApi {
    fn default() -> Self {
        Self {
            client: Client::builder()
                .user_agent("gamecast/0.1 (schedule poller)")
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_secs(10),
            base_url: ESPN_SITE_V2.to_owned(),
            rules: StateRules::default(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Network(reqwest::Error, String),
    Api(reqwest::Error, String),
    Parsing(reqwest::Error, String),
    NotFound(String),
    Other(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e, url) => write!(f, "Network error for {url}: {e}"),
            ApiError::Api(e, url) => write!(f, "API error for {url}: {e}"),
            ApiError::Parsing(e, url) => write!(f, "Parse error for {url}: {e}"),
            ApiError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ApiError::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl FeedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the client at another scoreboard host (mirrors, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_rules(mut self, rules: StateRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch one league's schedule for a calendar date. An empty slate is a
    /// valid answer, not an error.
    pub async fn fetch_games(&self, league: League, date: NaiveDate) -> ApiResult<Vec<Game>> {
        let (sport, slug) = league.espn_path();
        let url = format!(
            "{}/{sport}/{slug}/scoreboard?dates={}&limit=200",
            self.base_url,
            date.format("%Y%m%d")
        );
        let raw: ScoreboardResponse = self.get(&url).await?;
        Ok(map_scoreboard(raw, league, Utc::now(), &self.rules))
    }

    /// Fetch the raw channel playlist. Unlike the scoreboard, a 4xx here is an
    /// error: an empty playlist must never replace a good directory.
    pub async fn fetch_playlist(&self, url: &str) -> ApiResult<String> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url.to_owned()))?
            .error_for_status()
            .map_err(|e| ApiError::Api(e, url.to_owned()))?;

        response
            .text()
            .await
            .map_err(|e| ApiError::Parsing(e, url.to_owned()))
    }

    async fn get<T: Default + serde::de::DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApiError::Network(e, url.to_owned()))?;

        match response.error_for_status() {
            Ok(res) => res
                .json::<T>()
                .await
                .map_err(|e| ApiError::Parsing(e, url.to_owned())),
            Err(e) => {
                if e.status().map(|s| s.is_client_error()).unwrap_or(false) {
                    Ok(T::default())
                } else {
                    Err(ApiError::Api(e, url.to_owned()))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Mapping: ESPN wire types → clean domain types
// ---------------------------------------------------------------------------

/// Map a scoreboard snapshot, evaluating lifecycle state against `now`.
/// Records without an id or a parseable start time are dropped.
pub fn map_scoreboard(
    raw: ScoreboardResponse,
    league: League,
    now: DateTime<Utc>,
    rules: &StateRules,
) -> Vec<Game> {
    raw.events
        .unwrap_or_default()
        .iter()
        .filter_map(|event| map_event_to_game(event, league, now, rules))
        .collect()
}

fn map_event_to_game(
    event: &EspnEvent,
    league: League,
    now: DateTime<Utc>,
    rules: &StateRules,
) -> Option<Game> {
    let id = event.id.clone().filter(|id| !id.is_empty())?;
    let competition = event.competitions.as_deref().unwrap_or_default().first();

    let start_time = event
        .date
        .as_deref()
        .or_else(|| competition.and_then(|c| c.date.as_deref()))
        .and_then(parse_espn_date)?;

    let status = event
        .status
        .as_ref()
        .or_else(|| competition.and_then(|c| c.status.as_ref()));
    let signal = status.map(status_signal).unwrap_or(UpstreamSignal::None);
    let upstream_detail = status.and_then(status_text).unwrap_or_default();

    let inference = rules.infer(signal, start_time, now);

    let competitors: &[EspnCompetitor] = competition
        .and_then(|c| c.competitors.as_deref())
        .unwrap_or_default();
    let (home, away) = split_competitors(competitors);

    let venue = event
        .venue
        .as_ref()
        .or_else(|| competition.and_then(|c| c.venue.as_ref()))
        .and_then(venue_label);

    Some(Game {
        id,
        league,
        start_time,
        state: inference.state,
        status_detail: annotate(&upstream_detail, inference.qualifier),
        home_team: home.map(map_team).unwrap_or_default(),
        away_team: away.map(map_team).unwrap_or_default(),
        venue,
    })
}

fn status_signal(status: &EspnStatus) -> UpstreamSignal {
    let Some(t) = status.status_type.as_ref() else {
        return UpstreamSignal::None;
    };
    UpstreamSignal::from_espn(t.name.as_deref(), t.state.as_deref(), t.completed)
}

fn status_text(status: &EspnStatus) -> Option<String> {
    let t = status.status_type.as_ref()?;
    t.short_detail
        .clone()
        .or_else(|| t.detail.clone())
        .or_else(|| t.description.clone())
}

/// ESPN mixes full RFC 3339 with minute-precision stamps like `2026-10-16T23:30Z`.
fn parse_espn_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}

fn venue_label(v: &EspnVenue) -> Option<String> {
    if let Some(name) = v.full_name.as_ref().filter(|n| !n.is_empty()) {
        return Some(name.clone());
    }
    let address = v.address.as_ref()?;
    match (&address.city, &address.state) {
        (Some(city), Some(state)) => Some(format!("{city}, {state}")),
        (Some(city), None) => Some(city.clone()),
        _ => None,
    }
}

// Use "home"/"away" flags; fall back to index order (ESPN lists home first).
fn split_competitors(
    competitors: &[EspnCompetitor],
) -> (Option<&EspnCompetitor>, Option<&EspnCompetitor>) {
    let home = competitors
        .iter()
        .find(|c| c.home_away.as_deref() == Some("home"))
        .or_else(|| competitors.first());
    let away = competitors
        .iter()
        .find(|c| c.home_away.as_deref() == Some("away"))
        .or_else(|| competitors.get(1));
    (home, away)
}

fn map_team(c: &EspnCompetitor) -> Team {
    let Some(t) = c.team.as_ref() else {
        return Team::default();
    };
    Team {
        name: t
            .display_name
            .clone()
            .or_else(|| t.short_display_name.clone())
            .unwrap_or_default(),
        abbreviation: t.abbreviation.clone().unwrap_or_default(),
        logo_ref: t.logo.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GameState;
    use chrono::{TimeDelta, TimeZone};

    const SCOREBOARD: &str = r#"{
      "events": [
        {
          "id": "401585001",
          "name": "New York Knicks at Boston Celtics",
          "date": "2026-10-16T23:30Z",
          "status": { "type": { "name": "STATUS_SCHEDULED", "state": "pre", "completed": false,
                                "shortDetail": "10/16 - 7:30 PM EDT" } },
          "competitions": [{
            "venue": { "fullName": "TD Garden", "address": { "city": "Boston", "state": "MA" } },
            "competitors": [
              { "homeAway": "away", "team": { "displayName": "New York Knicks", "abbreviation": "NY" } },
              { "homeAway": "home", "team": { "displayName": "Boston Celtics", "abbreviation": "BOS",
                                              "logo": "https://a.espncdn.com/bos.png" } }
            ]
          }]
        },
        {
          "id": "401585002",
          "date": "2026-10-16T20:00:00Z",
          "status": { "type": { "name": "STATUS_FINAL", "state": "post", "completed": true,
                                "shortDetail": "Final" } },
          "competitions": [{ "competitors": [
              { "team": { "displayName": "Miami Heat" } },
              { "team": { "displayName": "Orlando Magic" } }
          ]}]
        },
        { "name": "missing id", "date": "2026-10-16T20:00Z" },
        { "id": "401585003", "date": "not a date" }
      ]
    }"#;

    fn sample() -> ScoreboardResponse {
        serde_json::from_str(SCOREBOARD).expect("fixture should parse")
    }

    #[test]
    fn maps_teams_venue_and_drops_broken_records() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let games = map_scoreboard(sample(), League::Basketball, now, &StateRules::default());
        assert_eq!(games.len(), 2);

        let g = &games[0];
        assert_eq!(g.id, "401585001");
        assert_eq!(g.league, League::Basketball);
        assert_eq!(g.start_time, Utc.with_ymd_and_hms(2026, 10, 16, 23, 30, 0).unwrap());
        assert_eq!(g.home_team.name, "Boston Celtics");
        assert_eq!(g.home_team.logo_ref.as_deref(), Some("https://a.espncdn.com/bos.png"));
        assert_eq!(g.away_team.abbreviation, "NY");
        assert_eq!(g.venue.as_deref(), Some("TD Garden"));
        assert_eq!(g.state, GameState::Scheduled);
        assert_eq!(g.status_detail, "10/16 - 7:30 PM EDT");

        // No homeAway flags: index order, home first.
        assert_eq!(games[1].home_team.name, "Miami Heat");
        assert_eq!(games[1].away_team.name, "Orlando Magic");
        assert_eq!(games[1].state, GameState::Final);
        assert_eq!(games[1].status_detail, "Final");
    }

    #[test]
    fn scheduled_game_inside_window_is_annotated_warmup() {
        let start = Utc.with_ymd_and_hms(2026, 10, 16, 23, 30, 0).unwrap();
        let now = start - TimeDelta::minutes(10);
        let games = map_scoreboard(sample(), League::Basketball, now, &StateRules::default());
        assert_eq!(games[0].state, GameState::Warmup);
        assert_eq!(games[0].status_detail, "10/16 - 7:30 PM EDT (Warmup)");
    }

    #[test]
    fn parses_both_date_shapes() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 16, 23, 30, 0).unwrap();
        assert_eq!(parse_espn_date("2026-10-16T23:30Z"), Some(expected));
        assert_eq!(parse_espn_date("2026-10-16T23:30:00Z"), Some(expected));
        assert_eq!(parse_espn_date("2026-10-16T19:30:00-04:00"), Some(expected));
        assert_eq!(parse_espn_date("tomorrow"), None);
    }

    #[tokio::test]
    async fn fetch_games_hits_league_scoreboard_for_date() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/basketball/nba/scoreboard")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("dates".into(), "20261016".into()),
                mockito::Matcher::UrlEncoded("limit".into(), "200".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SCOREBOARD)
            .create_async()
            .await;

        let api = FeedApi::new().with_base_url(server.url());
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let games = api.fetch_games(League::Basketball, date).await.expect("fetch should succeed");

        mock.assert_async().await;
        assert_eq!(games.len(), 2);
    }

    #[tokio::test]
    async fn client_error_is_an_empty_slate() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/hockey/nhl/scoreboard")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let api = FeedApi::new().with_base_url(server.url());
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let games = api.fetch_games(League::Hockey, date).await.expect("404 maps to empty");
        assert!(games.is_empty());
    }

    #[tokio::test]
    async fn server_error_surfaces_as_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/football/nfl/scoreboard")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let api = FeedApi::new().with_base_url(server.url());
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let err = api.fetch_games(League::Football, date).await.unwrap_err();
        assert!(matches!(err, ApiError::Api(_, _)));
    }

    #[tokio::test]
    async fn playlist_client_error_is_not_swallowed() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/playlist.m3u").with_status(403).create_async().await;

        let api = FeedApi::new();
        let url = format!("{}/playlist.m3u", server.url());
        assert!(api.fetch_playlist(&url).await.is_err());
    }
}
