use crate::directory::{StreamDirectory, StreamRef, Tier, TierTable};
use crate::error::ResolveError;
use crate::normalizer::FeedNormalizer;
use crate::store::{RecordStore, StreamOverride};
use gamecast_api::Game;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    Home,
    Away,
}

impl Feed {
    pub fn other(self) -> Self {
        match self {
            Feed::Home => Feed::Away,
            Feed::Away => Feed::Home,
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Feed::Home => "home",
            Feed::Away => "away",
        })
    }
}

impl FromStr for Feed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" => Ok(Feed::Home),
            "away" => Ok(Feed::Away),
            other => Err(format!("unknown feed: {other} (expected home or away)")),
        }
    }
}

/// What the playback client gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub url: String,
    /// The side actually served; differs from the request after a fallback.
    pub current_feed: Feed,
    pub has_home_feed: bool,
    pub has_away_feed: bool,
    /// The other side's URL when both resolved, for a client-side retry.
    pub fallback_url: Option<String>,
}

pub struct StreamResolver {
    normalizer: Arc<FeedNormalizer>,
    directory: Arc<StreamDirectory>,
    store: Arc<dyn RecordStore>,
}

impl StreamResolver {
    pub fn new(
        normalizer: Arc<FeedNormalizer>,
        directory: Arc<StreamDirectory>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self { normalizer, directory, store }
    }

    pub async fn resolve(&self, game_id: &str, feed: Feed) -> Result<Resolution, ResolveError> {
        let record = match self.store.get_override(game_id).await {
            Ok(record) => record,
            Err(e) => {
                warn!("override lookup failed for {game_id}: {e}");
                None
            }
        };

        // An admin-pinned URL for the requested side needs no game lookup at all.
        if let Some(record) = &record
            && let Some(url) = override_url(record, feed)
        {
            debug!("game {game_id} {feed}: serving override");
            return Ok(Resolution {
                url: url.to_owned(),
                current_feed: feed,
                has_home_feed: override_url(record, Feed::Home).is_some(),
                has_away_feed: override_url(record, Feed::Away).is_some(),
                fallback_url: override_url(record, feed.other()).map(str::to_owned),
            });
        }

        let game = self
            .normalizer
            .fetch_game(game_id)
            .await
            .ok_or_else(|| ResolveError::GameNotFound(game_id.to_owned()))?;

        let context = record.as_ref().map(|r| override_context(r, &game));
        let side = |name: &str| {
            self.directory
                .resolve_stream_url(name, Some(game.league), context.as_ref())
                .map(|hit| hit.url)
        };
        let home = side(&game.home_team.name);
        let away = side(&game.away_team.name);

        let resolution = choose(feed, home, away)
            .ok_or_else(|| ResolveError::NoStream(game_id.to_owned()))?;
        if resolution.current_feed != feed {
            info!("game {game_id}: no {feed} stream, falling back to {}", resolution.current_feed);
        }
        Ok(resolution)
    }
}

fn override_url(record: &StreamOverride, feed: Feed) -> Option<&str> {
    let url = match feed {
        Feed::Home => record.home_stream_url.as_deref(),
        Feed::Away => record.away_stream_url.as_deref(),
    };
    url.filter(|u| !u.trim().is_empty())
}

/// Game-scoped override tier: whichever sides the record pins, keyed by the
/// game's own team names.
fn override_context(record: &StreamOverride, game: &Game) -> TierTable {
    let mut table = TierTable::new(Tier::Override);
    for (feed, team) in [(Feed::Home, &game.home_team), (Feed::Away, &game.away_team)] {
        if let Some(url) = override_url(record, feed) {
            table.insert(&team.name, StreamRef::Url(url.to_owned()), Some(game.league));
        }
    }
    table
}

fn choose(requested: Feed, home: Option<String>, away: Option<String>) -> Option<Resolution> {
    let has_home_feed = home.is_some();
    let has_away_feed = away.is_some();
    let (wanted, other) = match requested {
        Feed::Home => (home, away),
        Feed::Away => (away, home),
    };

    let (url, current_feed, fallback_url) = match (wanted, other) {
        (Some(url), other) => (url, requested, other),
        (None, Some(url)) => (url, requested.other(), None),
        (None, None) => return None,
    };

    Some(Resolution { url, current_feed, has_home_feed, has_away_feed, fallback_url })
}
