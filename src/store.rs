use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use gamecast_api::League;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

pub type StoreResult<T> = Result<T, StoreError>;

/// Admin-pinned stream URLs for one game. Beats every directory lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamOverride {
    pub game_id: String,
    pub home_stream_url: Option<String>,
    pub away_stream_url: Option<String>,
    // Descriptive fields, enough to stand in for a game the feed no longer lists.
    #[serde(default)]
    pub league: Option<League>,
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl StreamOverride {
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            home_stream_url: None,
            away_stream_url: None,
            league: None,
            home_team: None,
            away_team: None,
            start_time: None,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub user_id: String,
    pub game_id: String,
    pub lead_minutes: u32,
    /// Game start as known when the alert was accepted. Used to expire the
    /// alert once the feed no longer lists the game.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Terminal once true: set on delivery or on expiry, never reset.
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(user_id: impl Into<String>, game_id: impl Into<String>, lead_minutes: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            game_id: game_id.into(),
            lead_minutes,
            start_time: None,
            notified: false,
            created_at: Utc::now(),
        }
    }

    pub fn fire_time(&self, start_time: DateTime<Utc>) -> DateTime<Utc> {
        start_time - TimeDelta::minutes(i64::from(self.lead_minutes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_override(&self, game_id: &str) -> StoreResult<Option<StreamOverride>>;
    async fn put_override(&self, record: StreamOverride) -> StoreResult<()>;

    async fn insert_alert(&self, alert: Alert) -> StoreResult<()>;
    async fn get_alert(&self, id: &str) -> StoreResult<Option<Alert>>;
    async fn pending_alerts(&self) -> StoreResult<Vec<Alert>>;
    /// Flip `notified` false → true. `Ok(true)` only for the caller that flipped it.
    async fn mark_notified(&self, id: &str) -> StoreResult<bool>;
    async fn delete_alert(&self, id: &str) -> StoreResult<bool>;

    async fn find_user(&self, user_id: &str) -> StoreResult<Option<User>>;
    async fn put_user(&self, user: User) -> StoreResult<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Records {
    #[serde(default)]
    overrides: HashMap<String, StreamOverride>,
    #[serde(default)]
    alerts: HashMap<String, Alert>,
    #[serde(default)]
    users: HashMap<String, User>,
}

/// In-memory records, rewritten to one JSON file on every mutation when given
/// a path (temp file, then rename).
#[derive(Debug, Default)]
pub struct JsonStore {
    path: Option<PathBuf>,
    records: Mutex<Records>,
}

impl JsonStore {
    pub fn memory() -> Self {
        Self::default()
    }

    /// Load `path` if it exists; a missing file starts an empty store there.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => Records::default(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no record file at {}, starting empty", path.display());
                Records::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path: Some(path), records: Mutex::new(records) })
    }

    async fn persist(&self, records: &Records) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = serde_json::to_vec_pretty(records)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonStore {
    async fn get_override(&self, game_id: &str) -> StoreResult<Option<StreamOverride>> {
        Ok(self.records.lock().await.overrides.get(game_id).cloned())
    }

    async fn put_override(&self, mut record: StreamOverride) -> StoreResult<()> {
        record.updated_at = Utc::now();
        let mut records = self.records.lock().await;
        records.overrides.insert(record.game_id.clone(), record);
        self.persist(&records).await
    }

    async fn insert_alert(&self, alert: Alert) -> StoreResult<()> {
        let mut records = self.records.lock().await;
        records.alerts.insert(alert.id.clone(), alert);
        self.persist(&records).await
    }

    async fn get_alert(&self, id: &str) -> StoreResult<Option<Alert>> {
        Ok(self.records.lock().await.alerts.get(id).cloned())
    }

    async fn pending_alerts(&self) -> StoreResult<Vec<Alert>> {
        let records = self.records.lock().await;
        let mut pending: Vec<Alert> =
            records.alerts.values().filter(|a| !a.notified).cloned().collect();
        pending.sort_by_key(|a| a.created_at);
        Ok(pending)
    }

    async fn mark_notified(&self, id: &str) -> StoreResult<bool> {
        let mut records = self.records.lock().await;
        let flipped = match records.alerts.get_mut(id) {
            Some(alert) if !alert.notified => {
                alert.notified = true;
                true
            }
            _ => false,
        };
        if flipped {
            self.persist(&records).await?;
        }
        Ok(flipped)
    }

    async fn delete_alert(&self, id: &str) -> StoreResult<bool> {
        let mut records = self.records.lock().await;
        let removed = records.alerts.remove(id).is_some();
        if removed {
            self.persist(&records).await?;
        }
        Ok(removed)
    }

    async fn find_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.records.lock().await.users.get(user_id).cloned())
    }

    async fn put_user(&self, user: User) -> StoreResult<()> {
        let mut records = self.records.lock().await;
        records.users.insert(user.id.clone(), user);
        self.persist(&records).await
    }
}
