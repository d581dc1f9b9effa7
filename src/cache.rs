use dashmap::DashMap;
use gamecast_api::League;
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::Instant;

pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    /// `ttl: None` keeps the entry until it is overwritten or deleted.
    fn set(&self, key: &str, value: String, ttl: Option<Duration>);
    fn del(&self, key: &str) -> bool;
}

/// Freshness per data class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub game_list: Duration,
    pub game: Duration,
    pub stream_url: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            game_list: Duration::from_secs(150),
            game: Duration::from_secs(150),
            stream_url: Duration::from_secs(600),
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process cache. Expired entries are dropped lazily on read and in bulk by
/// `purge_expired`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => {}
        }
        // Shard guard is released above; removing here cannot deadlock.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(key.to_owned(), CacheEntry { value, expires_at });
    }

    fn del(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }
}

// ---------------------------------------------------------------------------
// Typed access
// ---------------------------------------------------------------------------

pub fn get_json<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Option<T> {
    let raw = cache.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("dropping undecodable cache entry {key}: {e}");
            cache.del(key);
            None
        }
    }
}

pub fn set_json<T: Serialize>(cache: &dyn CacheStore, key: &str, value: &T, ttl: Option<Duration>) {
    match serde_json::to_string(value) {
        Ok(raw) => cache.set(key, raw, ttl),
        Err(e) => debug!("not caching {key}: {e}"),
    }
}

pub mod keys {
    use super::League;
    use chrono::NaiveDate;

    pub fn games(league: League, date: NaiveDate) -> String {
        format!("games:{league}:{date}")
    }

    /// Last successful snapshot, served when the upstream is down.
    pub fn games_last_good(league: League, date: NaiveDate) -> String {
        format!("games:last:{league}:{date}")
    }

    pub fn game(id: &str) -> String {
        format!("game:{id}")
    }

    /// Directory generation is part of the key so a refresh invalidates every
    /// URL resolved against the previous snapshot at once.
    pub fn stream(generation: u64, league: Option<League>, key: &str) -> String {
        match league {
            Some(league) => format!("stream:{generation}:{league}:{key}"),
            None => format!("stream:{generation}:any:{key}"),
        }
    }
}
