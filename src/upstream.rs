use async_trait::async_trait;
use chrono::NaiveDate;
use gamecast_api::client::{ApiError, ApiResult, FeedApi};
use gamecast_api::{Game, League};

/// The two upstream documents the engine consumes.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch_games(&self, league: League, date: NaiveDate) -> ApiResult<Vec<Game>>;
    async fn fetch_playlist(&self) -> ApiResult<String>;
}

/// Production upstream: ESPN scoreboard plus a configured playlist URL.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    api: FeedApi,
    playlist_url: Option<String>,
}

impl HttpUpstream {
    pub fn new(api: FeedApi, playlist_url: Option<String>) -> Self {
        Self { api, playlist_url }
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch_games(&self, league: League, date: NaiveDate) -> ApiResult<Vec<Game>> {
        self.api.fetch_games(league, date).await
    }

    async fn fetch_playlist(&self) -> ApiResult<String> {
        let Some(url) = self.playlist_url.as_deref() else {
            return Err(ApiError::NotFound("no playlist url configured".into()));
        };
        self.api.fetch_playlist(url).await
    }
}

#[cfg(test)]
pub use fake::FakeUpstream;
