use crate::cache::{CacheStore, MemoryCache, keys};
use crate::clock::{Clock, SystemClock};
use crate::directory::{IdRange, StreamDirectory, TierTable, load_curated};
use crate::error::{ResolveError, ScheduleError};
use crate::normalizer::FeedNormalizer;
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::resolver::{Feed, Resolution, StreamResolver};
use crate::scheduler::{AlertHandle, AlertScheduler, TickReport};
use crate::settings::Settings;
use crate::store::{JsonStore, RecordStore, StoreResult, StreamOverride, User};
use crate::upstream::{HttpUpstream, Upstream};
use anyhow::Context;
use chrono::NaiveDate;
use gamecast_api::client::{ApiResult, FeedApi};
use gamecast_api::{Game, League};
use log::{info, warn};
use std::sync::Arc;

/// Everything wired together. Cheap to share behind an `Arc`.
pub struct App {
    pub settings: Settings,
    upstream: Arc<dyn Upstream>,
    store: Arc<dyn RecordStore>,
    cache: Arc<MemoryCache>,
    clock: Arc<dyn Clock>,
    normalizer: Arc<FeedNormalizer>,
    directory: Arc<StreamDirectory>,
    resolver: StreamResolver,
    scheduler: AlertScheduler,
}

/// The swappable edges of the engine.
pub struct Parts {
    pub upstream: Arc<dyn Upstream>,
    pub store: Arc<dyn RecordStore>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub curated: Option<(TierTable, Vec<IdRange>)>,
}

impl App {
    /// Production wiring from settings: HTTP upstream, JSON store, webhook or
    /// log notifier, curated file if configured.
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let mut api = FeedApi::new().with_rules(settings.rules);
        if let Some(url) = &settings.feed_url {
            api = api.with_base_url(url);
        }
        let upstream = HttpUpstream::new(api, settings.playlist_url.clone());

        let store = match &settings.store_path {
            Some(path) => JsonStore::open(path)
                .await
                .with_context(|| format!("opening record store {}", path.display()))?,
            None => JsonStore::memory(),
        };

        let notifier: Arc<dyn Notifier> = match &settings.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url)),
            None => Arc::new(LogNotifier),
        };

        let curated = match &settings.curated_path {
            Some(path) => Some(
                load_curated(path)
                    .await
                    .with_context(|| format!("loading curated directory {}", path.display()))?,
            ),
            None => None,
        };

        let parts = Parts {
            upstream: Arc::new(upstream),
            store: Arc::new(store),
            notifier,
            clock: Arc::new(SystemClock),
            curated,
        };
        Ok(Self::from_parts(settings, parts))
    }

    pub fn from_parts(settings: Settings, parts: Parts) -> Self {
        let Parts { upstream, store, notifier, clock, curated } = parts;
        let cache = Arc::new(MemoryCache::new());

        let normalizer = Arc::new(
            FeedNormalizer::new(upstream.clone(), cache.clone(), store.clone(), clock.clone())
                .with_ttl(settings.ttl)
                .with_search_days(settings.search_days)
                .with_rules(settings.rules),
        );

        let mut directory =
            StreamDirectory::new(cache.clone(), settings.stream_url_template.clone())
                .with_url_ttl(settings.ttl.stream_url);
        if let Some((table, id_ranges)) = curated {
            info!("curated directory: {} entries", table.len());
            directory = directory.with_curated(table, id_ranges);
        }
        let directory = Arc::new(directory);

        let resolver = StreamResolver::new(normalizer.clone(), directory.clone(), store.clone());
        let scheduler =
            AlertScheduler::new(normalizer.clone(), store.clone(), notifier, clock.clone());

        Self { settings, upstream, store, cache, clock, normalizer, directory, resolver, scheduler }
    }

    /// Build the derived directory and re-arm persisted alerts. Neither
    /// failure is fatal: lookups fall back to curated entries, the tick
    /// covers alerts.
    pub async fn start(&self) -> usize {
        if let Err(e) = self.refresh_directory().await {
            warn!("initial directory refresh failed: {e}");
        }
        let snapshot = self.directory.snapshot();
        info!(
            "directory generation {} built {}: {} curated, {} derived entries",
            snapshot.generation,
            snapshot.built_at.format("%H:%M:%S"),
            snapshot.curated_len(),
            snapshot.derived_len()
        );
        self.scheduler.arm_pending().await
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    // -----------------------------------------------------------------------
    // Exposed operations
    // -----------------------------------------------------------------------

    pub async fn fetch_games(&self, league: League, date: NaiveDate) -> Vec<Game> {
        self.normalizer.fetch_games(league, date).await
    }

    pub async fn fetch_game(&self, game_id: &str) -> Option<Game> {
        self.normalizer.fetch_game(game_id).await
    }

    pub async fn resolve(&self, game_id: &str, feed: Feed) -> Result<Resolution, ResolveError> {
        self.resolver.resolve(game_id, feed).await
    }

    pub async fn schedule(
        &self,
        game_id: &str,
        user_id: &str,
        lead_minutes: u32,
    ) -> Result<AlertHandle, ScheduleError> {
        self.scheduler.schedule(game_id, user_id, lead_minutes).await
    }

    pub async fn cancel(&self, alert_id: &str) -> bool {
        self.scheduler.cancel(alert_id).await
    }

    pub async fn tick(&self) -> TickReport {
        self.scheduler.tick().await
    }

    pub async fn register_user(&self, user: User) -> StoreResult<()> {
        self.store.put_user(user).await
    }

    /// Pin stream URLs for a game. The game's cached copy is dropped so an
    /// override that describes an unlisted game is picked up right away.
    pub async fn put_override(&self, record: StreamOverride) -> StoreResult<()> {
        let game_id = record.game_id.clone();
        self.store.put_override(record).await?;
        self.cache.del(&keys::game(&game_id));
        Ok(())
    }

    pub async fn refresh_directory(&self) -> ApiResult<usize> {
        self.directory.refresh(self.upstream.as_ref()).await
    }

    pub fn directory_generation(&self) -> u64 {
        self.directory.snapshot().generation
    }

    pub fn purge_cache(&self) -> usize {
        self.cache.purge_expired()
    }
}
