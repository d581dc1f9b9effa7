use crate::cache::TtlPolicy;
use crate::normalizer::DEFAULT_SEARCH_DAYS;
use chrono::TimeDelta;
use gamecast_api::status::StateRules;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;

const DEFAULT_STREAM_TEMPLATE: &str = "http://127.0.0.1:8080/live/{id}.m3u8";

#[derive(Debug, Clone)]
pub struct Settings {
    pub feed_url: Option<String>,
    pub playlist_url: Option<String>,
    /// `{id}` is replaced with the numeric stream id.
    pub stream_url_template: String,
    pub curated_path: Option<PathBuf>,
    pub store_path: Option<PathBuf>,
    pub webhook_url: Option<String>,
    pub ttl: TtlPolicy,
    pub tick_every: Duration,
    pub directory_refresh_every: Duration,
    pub search_days: u32,
    pub rules: StateRules,
    pub log_level: LevelFilter,
    /// Values that failed to parse; logged once logging is up.
    pub warnings: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feed_url: None,
            playlist_url: None,
            stream_url_template: DEFAULT_STREAM_TEMPLATE.to_owned(),
            curated_path: None,
            store_path: None,
            webhook_url: None,
            ttl: TtlPolicy::default(),
            tick_every: Duration::from_secs(60),
            directory_refresh_every: Duration::from_secs(6 * 60 * 60),
            search_days: DEFAULT_SEARCH_DAYS,
            rules: StateRules::default(),
            log_level: LevelFilter::INFO,
            warnings: Vec::new(),
        }
    }
}

impl Settings {
    /// Environment (after an optional `.env`) over defaults.
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut env = Env { lookup: &lookup, warnings: Vec::new() };
        let mut settings = Self::default();

        settings.feed_url = env.string("GAMECAST_FEED_URL");
        settings.playlist_url = env.string("GAMECAST_PLAYLIST_URL");
        if let Some(template) = env.string("GAMECAST_STREAM_URL_TEMPLATE") {
            if template.contains("{id}") {
                settings.stream_url_template = template;
            } else {
                env.warn("GAMECAST_STREAM_URL_TEMPLATE", &template);
            }
        }
        settings.curated_path = env.string("GAMECAST_CURATED_PATH").map(PathBuf::from);
        settings.store_path = env.string("GAMECAST_STORE_PATH").map(PathBuf::from);
        settings.webhook_url = env.string("GAMECAST_WEBHOOK_URL");

        if let Some(secs) = env.parse::<u64>("GAMECAST_GAMES_TTL_SECS") {
            settings.ttl.game_list = Duration::from_secs(secs);
            settings.ttl.game = Duration::from_secs(secs);
        }
        if let Some(secs) = env.parse::<u64>("GAMECAST_STREAM_TTL_SECS") {
            settings.ttl.stream_url = Duration::from_secs(secs);
        }
        if let Some(secs) = env.parse::<u64>("GAMECAST_TICK_SECS").filter(|s| *s > 0) {
            settings.tick_every = Duration::from_secs(secs);
        }
        if let Some(secs) = env.parse::<u64>("GAMECAST_DIRECTORY_REFRESH_SECS").filter(|s| *s > 0) {
            settings.directory_refresh_every = Duration::from_secs(secs);
        }
        if let Some(days) = env.parse::<u32>("GAMECAST_SEARCH_DAYS") {
            settings.search_days = days;
        }

        if let Some(window) = env.span("GAMECAST_WARMUP_MINUTES", TimeDelta::try_minutes) {
            settings.rules.warmup_window = window;
        }
        if let Some(grace) = env.span("GAMECAST_LIVE_GRACE_MINUTES", TimeDelta::try_minutes) {
            settings.rules.assume_live_grace = grace;
        }
        if let Some(after) = env.span("GAMECAST_POSTPONE_AFTER_HOURS", TimeDelta::try_hours) {
            settings.rules.postpone_after = after;
        }

        if let Some(level) = env.parse::<LevelFilter>("GAMECAST_LOG") {
            settings.log_level = level;
        }

        settings.warnings = env.warnings;
        settings
    }
}

struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
    warnings: Vec<String>,
}

impl Env<'_> {
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&mut self, key: &str) -> Option<T> {
        let raw = self.string(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                self.warn(key, &raw);
                None
            }
        }
    }

    /// A whole number of minutes or hours; out-of-range values are warned about.
    fn span(&mut self, key: &str, unit: fn(i64) -> Option<TimeDelta>) -> Option<TimeDelta> {
        let count = self.parse::<i64>(key)?;
        let span = unit(count);
        if span.is_none() {
            self.warn(key, &count.to_string());
        }
        span
    }

    fn warn(&mut self, key: &str, raw: &str) {
        self.warnings.push(format!("ignoring invalid {key}={raw}, using default"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let settings = from(&[]);
        assert_eq!(settings.ttl, TtlPolicy::default());
        assert_eq!(settings.search_days, 7);
        assert_eq!(settings.log_level, LevelFilter::INFO);
        assert!(settings.playlist_url.is_none());
        assert!(settings.warnings.is_empty());
    }

    #[test]
    fn reads_overrides() {
        let settings = from(&[
            ("GAMECAST_PLAYLIST_URL", " https://iptv.example/get.php "),
            ("GAMECAST_STREAM_URL_TEMPLATE", "https://cdn.example/{id}.ts"),
            ("GAMECAST_GAMES_TTL_SECS", "120"),
            ("GAMECAST_WARMUP_MINUTES", "45"),
            ("GAMECAST_LOG", "debug"),
        ]);
        assert_eq!(settings.playlist_url.as_deref(), Some("https://iptv.example/get.php"));
        assert_eq!(settings.stream_url_template, "https://cdn.example/{id}.ts");
        assert_eq!(settings.ttl.game_list, Duration::from_secs(120));
        assert_eq!(settings.rules.warmup_window, TimeDelta::minutes(45));
        assert_eq!(settings.log_level, LevelFilter::DEBUG);
    }

    #[test]
    fn invalid_values_fall_back_with_warning() {
        let settings = from(&[
            ("GAMECAST_TICK_SECS", "soon"),
            ("GAMECAST_STREAM_URL_TEMPLATE", "https://cdn.example/fixed.m3u8"),
        ]);
        assert_eq!(settings.tick_every, Duration::from_secs(60));
        assert_eq!(settings.stream_url_template, DEFAULT_STREAM_TEMPLATE);
        assert_eq!(settings.warnings.len(), 2);
    }

    #[test]
    fn out_of_range_spans_fall_back_with_warning() {
        let settings = from(&[
            ("GAMECAST_WARMUP_MINUTES", "9223372036854775807"),
            ("GAMECAST_POSTPONE_AFTER_HOURS", "-9000000000000000"),
            ("GAMECAST_LIVE_GRACE_MINUTES", "10"),
        ]);
        assert_eq!(settings.rules.warmup_window, StateRules::default().warmup_window);
        assert_eq!(settings.rules.postpone_after, StateRules::default().postpone_after);
        assert_eq!(settings.rules.assume_live_grace, TimeDelta::minutes(10));
        assert_eq!(settings.warnings.len(), 2);
    }
}
