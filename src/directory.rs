use crate::cache::{CacheStore, get_json, keys, set_json};
use crate::upstream::Upstream;
use chrono::{DateTime, Utc};
use gamecast_api::League;
use gamecast_api::client::{ApiError, ApiResult};
use gamecast_api::playlist::{PlaylistEntry, parse_playlist};
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Keys shorter than this never take part in substring matching.
const MIN_FUZZY_LEN: usize = 4;

const REGION_PREFIXES: &[&str] = &["USA", "US", "UK", "CA"];
const QUALIFIER_PREFIXES: &[&str] = &["VIP"];
const QUALITY_SUFFIXES: &[&str] = &["HD", "FHD", "UHD", "SD", "4K"];
const SEPARATORS: &[char] = &[':', '-', '_', '|', '.', '/', '(', ')', '[', ']', ','];

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// `"USA: VIP NBA Boston Celtics"` → `"BOSTON CELTICS"`.
///
/// Uppercase, separators to spaces, leading region/VIP/league tokens and
/// trailing quality tags stripped. A name made only of such tokens is kept.
pub fn normalize_name(raw: &str) -> String {
    let upper = raw.to_uppercase().replace(SEPARATORS, " ");
    let tokens: Vec<&str> = upper.split_whitespace().collect();

    let mut start = 0;
    while start < tokens.len() && is_prefix_token(tokens[start]) {
        start += 1;
    }
    let mut end = tokens.len();
    while end > start && QUALITY_SUFFIXES.contains(&tokens[end - 1]) {
        end -= 1;
    }

    if start == end {
        return tokens.join(" ");
    }
    tokens[start..end].join(" ")
}

fn is_prefix_token(token: &str) -> bool {
    REGION_PREFIXES.contains(&token)
        || QUALIFIER_PREFIXES.contains(&token)
        || is_league_label(token)
}

fn is_league_label(token: &str) -> bool {
    League::ALL.iter().any(|l| l.label() == token)
}

// ---------------------------------------------------------------------------
// Entries and tiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Override,
    Curated,
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamRef {
    Id(u64),
    /// Only override entries carry a literal URL.
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub key: String,
    pub target: StreamRef,
    pub league: Option<League>,
    pub tier: Tier,
}

impl DirectoryEntry {
    /// An entry with a known league only answers for that league.
    fn accepts(&self, league: Option<League>) -> bool {
        match (self.league, league) {
            (Some(have), Some(want)) => have == want,
            _ => true,
        }
    }
}

/// One lookup strategy. The resolver walks an ordered list of these.
pub trait TierLookup: Send + Sync {
    fn exact(&self, key: &str, league: Option<League>) -> Option<&DirectoryEntry>;
    fn fuzzy(&self, key: &str, league: Option<League>) -> Option<&DirectoryEntry>;
}

#[derive(Debug, Clone)]
pub struct TierTable {
    tier: Tier,
    entries: HashMap<String, Vec<DirectoryEntry>>,
}

impl TierTable {
    pub fn new(tier: Tier) -> Self {
        Self { tier, entries: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Register `name` (normalized here). The first entry for a given
    /// key + league wins; later duplicates are ignored.
    pub fn insert(&mut self, name: &str, target: StreamRef, league: Option<League>) -> bool {
        let key = normalize_name(name);
        if key.is_empty() {
            return false;
        }
        let slot = self.entries.entry(key.clone()).or_default();
        if slot.iter().any(|e| e.league == league) {
            return false;
        }
        slot.push(DirectoryEntry { key, target, league, tier: self.tier });
        true
    }
}

impl TierLookup for TierTable {
    fn exact(&self, key: &str, league: Option<League>) -> Option<&DirectoryEntry> {
        self.entries
            .get(key)?
            .iter()
            .filter(|e| e.accepts(league))
            // Prefer an entry that names the league over a league-less one.
            .min_by_key(|e| e.league.is_none())
    }

    fn fuzzy(&self, key: &str, league: Option<League>) -> Option<&DirectoryEntry> {
        if key.len() < MIN_FUZZY_LEN {
            return None;
        }
        self.entries
            .iter()
            .filter(|(k, _)| {
                k.len() >= MIN_FUZZY_LEN && (k.contains(key) || key.contains(k.as_str()))
            })
            .flat_map(|(_, entries)| entries.iter())
            .filter(|e| e.accepts(league))
            .max_by(|a, b| {
                a.key
                    .len()
                    .cmp(&b.key.len())
                    .then_with(|| a.league.is_some().cmp(&b.league.is_some()))
                    // Deterministic across HashMap iteration order.
                    .then_with(|| b.key.cmp(&a.key))
            })
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Curated and derived tables of one generation. Never mutated once built; a
/// refresh publishes a new one with a single pointer swap.
#[derive(Debug)]
pub struct DirectorySnapshot {
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    curated: Arc<TierTable>,
    derived: Arc<TierTable>,
}

impl DirectorySnapshot {
    fn tiers<'a>(&'a self, context: Option<&'a TierTable>) -> Vec<&'a dyn TierLookup> {
        let mut tiers: Vec<&'a dyn TierLookup> = Vec::with_capacity(3);
        if let Some(context) = context {
            tiers.push(context);
        }
        tiers.push(self.curated.as_ref());
        tiers.push(self.derived.as_ref());
        tiers
    }

    /// Exact match in tier order, then fuzzy match in tier order.
    pub fn lookup<'a>(
        &'a self,
        key: &str,
        league: Option<League>,
        context: Option<&'a TierTable>,
    ) -> Option<&'a DirectoryEntry> {
        let tiers = self.tiers(context);
        tiers
            .iter()
            .find_map(|t| t.exact(key, league))
            .or_else(|| tiers.iter().find_map(|t| t.fuzzy(key, league)))
    }

    pub fn derived_len(&self) -> usize {
        self.derived.len()
    }

    pub fn curated_len(&self) -> usize {
        self.curated.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStream {
    pub url: String,
    pub stream_id: Option<u64>,
    pub tier: Tier,
    pub key: String,
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Advisory id range → league, used only when a playlist entry names no league.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub start: u64,
    pub end: u64,
    pub league: League,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CuratedFile {
    List(Vec<CuratedEntry>),
    Full {
        #[serde(default)]
        entries: Vec<CuratedEntry>,
        #[serde(default)]
        id_ranges: Vec<IdRange>,
    },
}

#[derive(Debug, Deserialize)]
struct CuratedEntry {
    name: String,
    stream_id: u64,
    league: Option<League>,
}

/// Curated table from a JSON file, either a bare `[{"name", "stream_id", "league"?}]`
/// list or `{"entries": [...], "id_ranges": [{"start", "end", "league"}]}`.
pub async fn load_curated(path: &Path) -> anyhow::Result<(TierTable, Vec<IdRange>)> {
    let raw = tokio::fs::read_to_string(path).await?;
    parse_curated(&raw)
}

fn parse_curated(raw: &str) -> anyhow::Result<(TierTable, Vec<IdRange>)> {
    let (entries, id_ranges) = match serde_json::from_str(raw)? {
        CuratedFile::List(entries) => (entries, Vec::new()),
        CuratedFile::Full { entries, id_ranges } => (entries, id_ranges),
    };
    let mut table = TierTable::new(Tier::Curated);
    for entry in &entries {
        table.insert(&entry.name, StreamRef::Id(entry.stream_id), entry.league);
    }
    Ok((table, id_ranges))
}

/// Normalized team/channel name → stream target. Searched in order: the
/// caller's per-game override table, the curated table, the derived table.
pub struct StreamDirectory {
    snapshot: RwLock<Arc<DirectorySnapshot>>,
    id_ranges: Vec<IdRange>,
    cache: Arc<dyn CacheStore>,
    url_ttl: Duration,
    url_template: String,
}

impl StreamDirectory {
    pub fn new(cache: Arc<dyn CacheStore>, url_template: impl Into<String>) -> Self {
        let snapshot = DirectorySnapshot {
            generation: 0,
            built_at: Utc::now(),
            curated: Arc::new(TierTable::new(Tier::Curated)),
            derived: Arc::new(TierTable::new(Tier::Derived)),
        };
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            id_ranges: Vec::new(),
            cache,
            url_ttl: Duration::from_secs(600),
            url_template: url_template.into(),
        }
    }

    pub fn with_curated(self, curated: TierTable, id_ranges: Vec<IdRange>) -> Self {
        let directory = Self { id_ranges, ..self };
        directory.publish(Some(curated), None);
        directory
    }

    pub fn with_url_ttl(mut self, ttl: Duration) -> Self {
        self.url_ttl = ttl;
        self
    }

    /// The current generation. Hold on to it for the length of one lookup.
    pub fn snapshot(&self) -> Arc<DirectorySnapshot> {
        self.snapshot.read().clone()
    }

    /// Replace the derived tier wholesale. Returns the new generation.
    pub fn publish_derived(&self, derived: TierTable) -> u64 {
        self.publish(None, Some(derived))
    }

    fn publish(&self, curated: Option<TierTable>, derived: Option<TierTable>) -> u64 {
        // Tables are fully built by the caller; the write lock covers the swap only.
        let curated = curated.map(Arc::new);
        let derived = derived.map(Arc::new);
        let mut current = self.snapshot.write();
        let next = DirectorySnapshot {
            generation: current.generation + 1,
            built_at: Utc::now(),
            curated: curated.unwrap_or_else(|| current.curated.clone()),
            derived: derived.unwrap_or_else(|| current.derived.clone()),
        };
        *current = Arc::new(next);
        current.generation
    }

    pub fn stream_url(&self, target: &StreamRef) -> String {
        match target {
            StreamRef::Id(id) => self.url_template.replace("{id}", &id.to_string()),
            StreamRef::Url(url) => url.clone(),
        }
    }

    /// Resolve a team or channel name to a playable URL. `context` is the
    /// override tier for one specific game; those results are never cached.
    pub fn resolve_stream_url(
        &self,
        name: &str,
        league: Option<League>,
        context: Option<&TierTable>,
    ) -> Option<ResolvedStream> {
        let key = normalize_name(name);
        if key.is_empty() {
            return None;
        }
        let snapshot = self.snapshot();

        if let Some(context) = context {
            if let Some(entry) = snapshot.lookup(&key, league, Some(context)) {
                if entry.tier == Tier::Override {
                    return Some(self.to_resolved(entry));
                }
            }
        }

        let cache_key = keys::stream(snapshot.generation, league, &key);
        if let Some(hit) = get_json::<ResolvedStream>(self.cache.as_ref(), &cache_key) {
            return Some(hit);
        }

        let resolved = snapshot.lookup(&key, league, None).map(|e| self.to_resolved(e))?;
        set_json(self.cache.as_ref(), &cache_key, &resolved, Some(self.url_ttl));
        Some(resolved)
    }

    fn to_resolved(&self, entry: &DirectoryEntry) -> ResolvedStream {
        ResolvedStream {
            url: self.stream_url(&entry.target),
            stream_id: match entry.target {
                StreamRef::Id(id) => Some(id),
                StreamRef::Url(_) => None,
            },
            tier: entry.tier,
            key: entry.key.clone(),
        }
    }

    /// Fetch and parse the playlist, then publish a new derived tier. On any
    /// failure, or an empty playlist, the previous snapshot stays in place.
    pub async fn refresh(&self, upstream: &dyn Upstream) -> ApiResult<usize> {
        let text = upstream.fetch_playlist().await?;
        let entries = parse_playlist(&text);
        if entries.is_empty() {
            return Err(ApiError::Other("playlist contained no stream entries".into()));
        }

        let derived = build_derived(&entries, &self.id_ranges);
        let size = derived.len();
        let generation = self.publish_derived(derived);
        info!(
            "stream directory generation {generation}: {size} derived entries from {} channels",
            entries.len()
        );
        Ok(size)
    }
}

// ---------------------------------------------------------------------------
// Derived tier
// ---------------------------------------------------------------------------

/// Build the derived tier: direct names first so an alias never shadows a
/// channel's own name, then nickname and league-stripped aliases.
pub fn build_derived(entries: &[PlaylistEntry], id_ranges: &[IdRange]) -> TierTable {
    let mut table = TierTable::new(Tier::Derived);
    let leagues: Vec<Option<League>> = entries
        .iter()
        .map(|e| infer_league(&e.display_name, e.group.as_deref(), e.stream_id, id_ranges))
        .collect();

    for (entry, league) in entries.iter().zip(&leagues) {
        table.insert(&entry.display_name, StreamRef::Id(entry.stream_id), *league);
    }

    for (entry, league) in entries.iter().zip(&leagues) {
        for alias in aliases(&entry.display_name) {
            if table.insert(&alias, StreamRef::Id(entry.stream_id), *league) {
                debug!("alias {alias} -> {}", entry.stream_id);
            }
        }
    }

    table
}

fn aliases(display_name: &str) -> Vec<String> {
    let key = normalize_name(display_name);
    let mut out = Vec::new();

    let without_leagues: Vec<&str> = key.split(' ').filter(|t| !is_league_label(t)).collect();
    let stripped = without_leagues.join(" ");
    if !stripped.is_empty() && stripped != key {
        out.push(stripped);
    }

    if let Some(last) = without_leagues.last()
        && without_leagues.len() > 1
        && last.len() > 3
    {
        out.push((*last).to_owned());
    }

    out
}

fn infer_league(
    display: &str,
    group: Option<&str>,
    stream_id: u64,
    id_ranges: &[IdRange],
) -> Option<League> {
    let from_text = |text: &str| {
        text.to_uppercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .find_map(|token| if is_league_label(token) { League::from_token(token) } else { None })
    };

    from_text(display)
        .or_else(|| group.and_then(from_text))
        .or_else(|| {
            id_ranges
                .iter()
                .find(|r| (r.start..=r.end).contains(&stream_id))
                .map(|r| r.league)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::upstream::FakeUpstream;

    fn entry(name: &str, id: u64, group: Option<&str>) -> PlaylistEntry {
        PlaylistEntry {
            display_name: name.to_owned(),
            group: group.map(str::to_owned),
            stream_id: id,
            url: format!("http://h/live/a/b/{id}.m3u8"),
        }
    }

    fn directory() -> StreamDirectory {
        StreamDirectory::new(Arc::new(MemoryCache::new()), "https://cdn.example/live/{id}.m3u8")
    }

    #[test]
    fn normalization_strips_prefixes_and_separators() {
        assert_eq!(normalize_name("USA: VIP NBA Boston Celtics"), "BOSTON CELTICS");
        assert_eq!(normalize_name("USA: VIP NBA Boston Celtics"), normalize_name("Boston Celtics"));
        assert_eq!(normalize_name("MLB - New York Yankees"), "NEW YORK YANKEES");
        assert_eq!(normalize_name("  St. Louis   Blues HD "), "ST LOUIS BLUES");
        assert_eq!(normalize_name("UK | NHL: Boston_Bruins"), "BOSTON BRUINS");
        assert_eq!(normalize_name("NBA"), "NBA", "a bare league name is kept");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn curated_file_formats() {
        let list = r#"[{"name": "NBA: Boston Celtics", "stream_id": 7, "league": "nba"}]"#;
        let (table, ranges) = parse_curated(list).unwrap();
        assert_eq!(table.exact("BOSTON CELTICS", None).unwrap().target, StreamRef::Id(7));
        assert!(ranges.is_empty());

        let (table, ranges) = parse_curated(
            r#"{"entries": [{"name": "Seattle Kraken", "stream_id": 8}],
                "id_ranges": [{"start": 2000, "end": 2999, "league": "nhl"}]}"#,
        )
        .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(ranges[0].league, League::Hockey);
        assert!(parse_curated("{not json").is_err());
    }

    #[test]
    fn curated_beats_derived() {
        let mut curated = TierTable::new(Tier::Curated);
        curated.insert("Boston Celtics", StreamRef::Id(7), Some(League::Basketball));
        let dir = directory().with_curated(curated, Vec::new());
        dir.publish_derived(build_derived(&[entry("NBA: Boston Celtics", 1001, None)], &[]));

        let hit = dir.resolve_stream_url("Boston Celtics", Some(League::Basketball), None).unwrap();
        assert_eq!(hit.stream_id, Some(7));
        assert_eq!(hit.tier, Tier::Curated);
        assert_eq!(hit.url, "https://cdn.example/live/7.m3u8");
    }

    #[test]
    fn override_context_beats_everything() {
        let mut curated = TierTable::new(Tier::Curated);
        curated.insert("Boston Celtics", StreamRef::Id(7), None);
        let dir = directory().with_curated(curated, Vec::new());

        let mut context = TierTable::new(Tier::Override);
        let pinned = StreamRef::Url("https://pinned.example/bos.m3u8".into());
        context.insert("Boston Celtics", pinned, None);

        let hit = dir.resolve_stream_url("Boston Celtics", None, Some(&context)).unwrap();
        assert_eq!(hit.url, "https://pinned.example/bos.m3u8");
        assert_eq!(hit.tier, Tier::Override);

        // Without the context the curated entry answers again.
        let again = dir.resolve_stream_url("Boston Celtics", None, None).unwrap();
        assert_eq!(again.stream_id, Some(7));
    }

    #[test]
    fn league_disambiguates_shared_nicknames() {
        let table = build_derived(
            &[entry("NHL: New York Rangers", 2001, None), entry("MLB: Texas Rangers", 3001, None)],
            &[],
        );
        let hockey = table.exact("RANGERS", Some(League::Hockey)).unwrap();
        assert_eq!(hockey.target, StreamRef::Id(2001));
        let baseball = table.exact("RANGERS", Some(League::Baseball)).unwrap();
        assert_eq!(baseball.target, StreamRef::Id(3001));
    }

    #[test]
    fn derived_aliases() {
        let table = build_derived(
            &[entry("USA: Miami Heat", 1500, Some("NBA")), entry("Bay FC", 9000, None)],
            &[],
        );
        let heat = table.exact("HEAT", Some(League::Basketball)).expect("nickname alias");
        assert_eq!(heat.target, StreamRef::Id(1500));
        assert_eq!(heat.league, Some(League::Basketball), "league taken from group title");
        assert!(table.exact("FC", None).is_none(), "short nicknames are not registered");
    }

    #[test]
    fn league_stripped_alias_and_id_ranges() {
        let ranges = [IdRange { start: 4000, end: 4999, league: League::Football }];
        let table = build_derived(
            &[entry("Chicago Bears NFL", 4100, None), entry("Green Bay Packers", 4200, None)],
            &ranges,
        );
        assert!(table.exact("CHICAGO BEARS", Some(League::Football)).is_some());
        let packers = table.exact("GREEN BAY PACKERS", None).unwrap();
        assert_eq!(packers.league, Some(League::Football), "league inferred from id range");
    }

    #[test]
    fn direct_name_is_not_shadowed_by_alias() {
        let entries = [entry("Los Angeles Kings", 2100, None), entry("Kings", 2999, None)];
        let table = build_derived(&entries, &[]);
        assert_eq!(table.exact("KINGS", None).unwrap().target, StreamRef::Id(2999));
    }

    #[test]
    fn fuzzy_prefers_longest_key() {
        let mut table = TierTable::new(Tier::Curated);
        table.insert("Celtics", StreamRef::Id(1), None);
        table.insert("Boston Celtics", StreamRef::Id(2), None);
        table.insert("NBC", StreamRef::Id(3), None);

        let hit = table.fuzzy("BOSTON CELTICS ALTERNATE", None).unwrap();
        assert_eq!(hit.target, StreamRef::Id(2));
        let hit = table.fuzzy("CELTICS", None).unwrap();
        assert_eq!(hit.target, StreamRef::Id(2), "query inside a longer key");
        assert!(table.fuzzy("NBC SPORTS", None).is_none(), "short keys stay out of fuzzy matching");
    }

    #[test]
    fn fuzzy_respects_tier_order() {
        let mut curated = TierTable::new(Tier::Curated);
        curated.insert("Celtics", StreamRef::Id(10), None);
        let dir = directory().with_curated(curated, Vec::new());
        dir.publish_derived(build_derived(&[entry("Boston Celtics Network", 11, None)], &[]));

        let hit = dir.resolve_stream_url("Boston Celtics", None, None).unwrap();
        assert_eq!(hit.stream_id, Some(10), "curated fuzzy wins over a longer derived key");
    }

    #[test]
    fn refresh_invalidates_cached_urls() {
        let dir = directory();
        dir.publish_derived(build_derived(&[entry("Boston Celtics", 100, None)], &[]));
        let first = dir.resolve_stream_url("Boston Celtics", None, None).unwrap();
        assert_eq!(first.stream_id, Some(100));

        dir.publish_derived(build_derived(&[entry("Boston Celtics", 200, None)], &[]));
        let second = dir.resolve_stream_url("Boston Celtics", None, None).unwrap();
        assert_eq!(second.stream_id, Some(200));
    }

    #[test]
    fn unknown_name_is_none() {
        let dir = directory();
        assert!(dir.resolve_stream_url("Nobody FC", None, None).is_none());
        assert!(dir.resolve_stream_url("", None, None).is_none());
    }

    #[test]
    fn readers_never_see_a_mixed_snapshot() {
        let dir = Arc::new(directory());
        let scheme = |base: u64| {
            let entries =
                [entry("Boston Celtics", base + 1, None), entry("New York Knicks", base + 2, None)];
            build_derived(&entries, &[])
        };
        dir.publish_derived(scheme(100));

        let writer = {
            let dir = dir.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    dir.publish_derived(scheme(if i % 2 == 0 { 200 } else { 100 }));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let dir = dir.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = dir.snapshot();
                        let a = snapshot.lookup("BOSTON CELTICS", None, None).unwrap();
                        let b = snapshot.lookup("NEW YORK KNICKS", None, None).unwrap();
                        let (StreamRef::Id(a), StreamRef::Id(b)) = (&a.target, &b.target) else {
                            panic!("derived entries carry ids");
                        };
                        assert_eq!(a / 100, b / 100, "both teams resolve from one generation");
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[tokio::test]
    async fn refresh_publishes_or_keeps_previous() {
        let dir = directory();
        let upstream = FakeUpstream::new();
        upstream.set_playlist(concat!(
            "#EXTM3U\n",
            "#EXTINF:-1 group-title=\"NBA\",USA: Boston Celtics\n",
            "http://h/live/a/b/10452.m3u8\n",
        ));

        let size = dir.refresh(&upstream).await.expect("refresh succeeds");
        assert!(size >= 2, "name plus nickname");
        let generation = dir.snapshot().generation;
        assert_eq!(dir.snapshot().derived_len(), size);

        upstream.set_playlist("#EXTM3U\n");
        assert!(dir.refresh(&upstream).await.is_err());
        upstream.set_failing(true);
        assert!(dir.refresh(&upstream).await.is_err());

        assert_eq!(dir.snapshot().generation, generation, "failed refreshes publish nothing");
        assert_eq!(
            dir.resolve_stream_url("Celtics", Some(League::Basketball), None).unwrap().stream_id,
            Some(10452)
        );
    }
}
