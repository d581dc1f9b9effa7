use crate::cache::{CacheStore, TtlPolicy, get_json, keys, set_json};
use crate::clock::Clock;
use crate::store::RecordStore;
use crate::upstream::Upstream;
use chrono::{NaiveDate, TimeDelta};
use gamecast_api::client::ApiResult;
use gamecast_api::status::{StateRules, UpstreamSignal, annotate};
use gamecast_api::{Game, GameState, League, Team};
use log::{debug, warn};
use std::sync::Arc;

pub const DEFAULT_SEARCH_DAYS: u32 = 7;

/// Cache-first access to normalized games. `refresh_games` is the only path
/// that returns upstream errors; everything else degrades to the last good
/// snapshot, or to nothing.
pub struct FeedNormalizer {
    upstream: Arc<dyn Upstream>,
    cache: Arc<dyn CacheStore>,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    ttl: TtlPolicy,
    search_days: u32,
    rules: StateRules,
}

impl FeedNormalizer {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        cache: Arc<dyn CacheStore>,
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            upstream,
            cache,
            store,
            clock,
            ttl: TtlPolicy::default(),
            search_days: DEFAULT_SEARCH_DAYS,
            rules: StateRules::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_search_days(mut self, days: u32) -> Self {
        self.search_days = days;
        self
    }

    pub fn with_rules(mut self, rules: StateRules) -> Self {
        self.rules = rules;
        self
    }

    /// Poll the upstream for one league/date and repopulate the cache.
    pub async fn refresh_games(&self, league: League, date: NaiveDate) -> ApiResult<Vec<Game>> {
        let games = self.upstream.fetch_games(league, date).await?;
        debug!("fetched {} {league} game(s) for {date}", games.len());

        let cache = self.cache.as_ref();
        set_json(cache, &keys::games(league, date), &games, Some(self.ttl.game_list));
        set_json(cache, &keys::games_last_good(league, date), &games, None);
        for game in &games {
            set_json(cache, &keys::game(&game.id), game, Some(self.ttl.game));
        }
        Ok(games)
    }

    /// Cached schedule for a league/date. Upstream failures are logged and
    /// answered with the last good snapshot, else an empty slate.
    pub async fn fetch_games(&self, league: League, date: NaiveDate) -> Vec<Game> {
        if let Some(games) = get_json(self.cache.as_ref(), &keys::games(league, date)) {
            return games;
        }

        match self.refresh_games(league, date).await {
            Ok(games) => games,
            Err(e) => {
                warn!("schedule fetch failed for {league} {date}: {e}");
                get_json(self.cache.as_ref(), &keys::games_last_good(league, date))
                    .unwrap_or_default()
            }
        }
    }

    /// Locate a game by upstream id. The feed is only indexed by date, so this
    /// walks: cache → yesterday, today and tomorrow → forward search → stream
    /// override. Yesterday is included because the feed files games under the
    /// US calendar date, which trails UTC for evening starts.
    pub async fn fetch_game(&self, game_id: &str) -> Option<Game> {
        if let Some(game) = get_json::<Game>(self.cache.as_ref(), &keys::game(game_id)) {
            return Some(game);
        }

        let today = self.clock.now().date_naive();
        let near_days = [today - TimeDelta::days(1), today, today + TimeDelta::days(1)];
        for date in near_days {
            if let Some(game) = self.find_on(date, game_id, |_| true).await {
                return Some(self.remember(game));
            }
        }

        if let Some(game) = self.search_forward(game_id, today).await {
            return Some(self.remember(game));
        }

        let game = self.synthesize_from_override(game_id).await?;
        Some(self.remember(game))
    }

    async fn find_on<F>(&self, date: NaiveDate, game_id: &str, accept: F) -> Option<Game>
    where
        F: Fn(&Game) -> bool,
    {
        for league in League::ALL {
            let games = self.fetch_games(league, date).await;
            if let Some(game) = games.into_iter().find(|g| g.id == game_id && accept(g)) {
                return Some(game);
            }
        }
        None
    }

    /// Nearest future scheduled occurrence within the search window.
    async fn search_forward(&self, game_id: &str, today: NaiveDate) -> Option<Game> {
        for offset in 2..=i64::from(self.search_days) {
            let date = today + TimeDelta::days(offset);
            let found = self
                .find_on(date, game_id, |g| g.state == GameState::Scheduled)
                .await;
            if found.is_some() {
                debug!("found game {game_id} {offset} day(s) ahead");
                return found;
            }
        }
        None
    }

    /// Minimal game built from an admin override that names the game. Needs the
    /// override to carry a league; without one there is nothing to stand on.
    async fn synthesize_from_override(&self, game_id: &str) -> Option<Game> {
        let record = match self.store.get_override(game_id).await {
            Ok(record) => record?,
            Err(e) => {
                warn!("override lookup failed for {game_id}: {e}");
                return None;
            }
        };
        let Some(league) = record.league else {
            debug!("override for {game_id} has no league, not synthesizing a game");
            return None;
        };

        let now = self.clock.now();
        let start_time = record.start_time.unwrap_or(now);
        let inference = self.rules.infer(UpstreamSignal::None, start_time, now);

        Some(Game {
            id: record.game_id,
            league,
            start_time,
            state: inference.state,
            status_detail: annotate("Manual stream", inference.qualifier),
            home_team: Team::named(record.home_team.unwrap_or_default()),
            away_team: Team::named(record.away_team.unwrap_or_default()),
            venue: None,
        })
    }

    fn remember(&self, game: Game) -> Game {
        set_json(self.cache.as_ref(), &keys::game(&game.id), &game, Some(self.ttl.game));
        game
    }
}
