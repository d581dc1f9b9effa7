use crate::clock::Clock;
use crate::error::ScheduleError;
use crate::normalizer::FeedNormalizer;
use crate::notify::{AlertPayload, Notifier};
use crate::store::{Alert, RecordStore, User};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::{DashMap, DashSet};
use gamecast_api::{Game, GameState};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::task::AbortHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct AlertHandle {
    pub alert: Alert,
    pub fire_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub checked: usize,
    pub delivered: usize,
    pub expired: usize,
    pub orphaned: usize,
    pub failed: usize,
    /// Still pending: not yet due, game unknown, or claimed elsewhere.
    pub deferred: usize,
    /// Another tick was still running; nothing was checked.
    pub skipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    Failed,
    /// Claimed by a concurrent deliverer, already notified, or gone.
    Skipped,
}

/// Every accepted alert gets a single-shot timer. `tick` delivers anything due
/// that a timer missed, expires alerts whose game already started and drops
/// alerts whose user no longer exists. An in-process claim plus the store's
/// compare-and-set on `notified` keep it to one send per alert.
#[derive(Clone)]
pub struct AlertScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    normalizer: Arc<FeedNormalizer>,
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    timers: DashMap<String, (u64, AbortHandle)>,
    next_timer: AtomicU64,
    claims: DashSet<String>,
    ticking: AtomicBool,
}

impl AlertScheduler {
    pub fn new(
        normalizer: Arc<FeedNormalizer>,
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                normalizer,
                store,
                notifier,
                clock,
                timers: DashMap::new(),
                next_timer: AtomicU64::new(0),
                claims: DashSet::new(),
                ticking: AtomicBool::new(false),
            }),
        }
    }

    /// Validate, persist and arm an alert `lead_minutes` before the game starts.
    pub async fn schedule(
        &self,
        game_id: &str,
        user_id: &str,
        lead_minutes: u32,
    ) -> Result<AlertHandle, ScheduleError> {
        if lead_minutes == 0 {
            return Err(ScheduleError::InvalidLead);
        }
        let game = self
            .inner
            .normalizer
            .fetch_game(game_id)
            .await
            .ok_or_else(|| ScheduleError::GameNotFound(game_id.to_owned()))?;

        let now = self.inner.clock.now();
        let mut alert = Alert::new(user_id, game_id, lead_minutes);
        alert.created_at = now;
        alert.start_time = Some(game.start_time);
        let fire_at = alert.fire_time(game.start_time);
        if fire_at <= now {
            return Err(ScheduleError::InvalidSchedule {
                minutes_remaining: (game.start_time - now).num_minutes(),
                lead_minutes,
            });
        }

        self.inner.store.insert_alert(alert.clone()).await?;
        self.arm(&alert.id, fire_at);
        info!(
            "alert {} armed for {} at {fire_at} ({lead_minutes} min lead)",
            alert.id,
            game.matchup()
        );
        Ok(AlertHandle { alert, fire_at })
    }

    /// Remove a pending alert and its timer. `false` if there was nothing
    /// pending under that id.
    pub async fn cancel(&self, alert_id: &str) -> bool {
        self.disarm(alert_id);
        let store = &self.inner.store;
        match store.get_alert(alert_id).await {
            Ok(Some(alert)) if !alert.notified => match store.delete_alert(alert_id).await {
                Ok(removed) => removed,
                Err(e) => {
                    warn!("cancel of alert {alert_id} failed: {e}");
                    false
                }
            },
            Ok(_) => false,
            Err(e) => {
                warn!("cancel of alert {alert_id} failed: {e}");
                false
            }
        }
    }

    /// Re-arm timers for alerts persisted by a previous run. Returns how many
    /// were armed; the rest are left to `tick`.
    pub async fn arm_pending(&self) -> usize {
        let pending = match self.inner.store.pending_alerts().await {
            Ok(pending) => pending,
            Err(e) => {
                error!("could not load pending alerts: {e}");
                return 0;
            }
        };

        let mut armed = 0;
        for alert in pending {
            if let Some(game) = self.inner.normalizer.fetch_game(&alert.game_id).await {
                self.arm(&alert.id, alert.fire_time(game.start_time));
                armed += 1;
            }
        }
        info!("re-armed {armed} pending alert(s)");
        armed
    }

    pub async fn tick(&self) -> TickReport {
        let Some(_running) = RunningFlag::acquire(&self.inner.ticking) else {
            debug!("previous tick still running, skipping");
            return TickReport { skipped: true, ..TickReport::default() };
        };

        let mut report = TickReport::default();
        let pending = match self.inner.store.pending_alerts().await {
            Ok(pending) => pending,
            Err(e) => {
                error!("tick could not load pending alerts: {e}");
                return report;
            }
        };

        for alert in pending {
            report.checked += 1;
            self.check(&alert, &mut report).await;
        }

        if report.delivered + report.expired + report.orphaned + report.failed > 0 {
            info!(
                "tick: {} checked, {} delivered, {} expired, {} orphaned, {} failed",
                report.checked, report.delivered, report.expired, report.orphaned, report.failed
            );
        }
        report
    }

    async fn check(&self, alert: &Alert, report: &mut TickReport) {
        let store = &self.inner.store;
        let user = match store.find_user(&alert.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.disarm(&alert.id);
                match store.delete_alert(&alert.id).await {
                    Ok(_) => {
                        debug!("dropped alert {} for missing user {}", alert.id, alert.user_id);
                        report.orphaned += 1;
                    }
                    Err(e) => {
                        warn!("could not drop orphaned alert {}: {e}", alert.id);
                        report.deferred += 1;
                    }
                }
                return;
            }
            Err(e) => {
                warn!("user lookup failed for alert {}: {e}", alert.id);
                report.deferred += 1;
                return;
            }
        };

        let now = self.inner.clock.now();
        let Some(game) = self.inner.normalizer.fetch_game(&alert.game_id).await else {
            // The feed dropped the game; fall back to the start known at scheduling.
            match alert.start_time {
                Some(start) if start <= now => self.expire(alert, report).await,
                _ => report.deferred += 1,
            }
            return;
        };

        let until_start = game.start_time - now;
        if until_start <= TimeDelta::zero() {
            self.expire(alert, report).await;
            return;
        }

        if until_start > TimeDelta::minutes(i64::from(alert.lead_minutes)) {
            report.deferred += 1;
            return;
        }

        match self.deliver(alert, &game, &user).await {
            Delivery::Sent => report.delivered += 1,
            Delivery::Failed => report.failed += 1,
            Delivery::Skipped => report.deferred += 1,
        }
    }

    async fn expire(&self, alert: &Alert, report: &mut TickReport) {
        self.disarm(&alert.id);
        match self.inner.store.mark_notified(&alert.id).await {
            Ok(true) => {
                debug!("alert {} expired, game {} already started", alert.id, alert.game_id);
                report.expired += 1;
            }
            Ok(false) => report.deferred += 1,
            Err(e) => {
                warn!("could not expire alert {}: {e}", alert.id);
                report.deferred += 1;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    fn arm(&self, alert_id: &str, fire_at: DateTime<Utc>) {
        let delay = (fire_at - self.inner.clock.now()).to_std().unwrap_or_default();
        let token = self.inner.next_timer.fetch_add(1, Ordering::Relaxed);
        let scheduler = self.clone();
        let id = alert_id.to_owned();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.fire(&id, fire_at, token).await;
        });

        let registration = (token, task.abort_handle());
        if let Some((_, previous)) = self.inner.timers.insert(alert_id.to_owned(), registration) {
            previous.abort();
        }
    }

    fn disarm(&self, alert_id: &str) {
        if let Some((_, (_, handle))) = self.inner.timers.remove(alert_id) {
            handle.abort();
        }
    }

    /// Drop this timer's registration unless a newer timer replaced it.
    fn release(&self, alert_id: &str, token: u64) {
        self.inner.timers.remove_if(alert_id, |_, (t, _)| *t == token);
    }

    async fn fire(&self, alert_id: &str, armed_for: DateTime<Utc>, token: u64) {
        self.release(alert_id, token);
        let store = &self.inner.store;

        let alert = match store.get_alert(alert_id).await {
            Ok(Some(alert)) if !alert.notified => alert,
            Ok(_) => return,
            Err(e) => {
                warn!("timer for alert {alert_id} could not load it: {e}");
                return;
            }
        };
        let Some(game) = self.inner.normalizer.fetch_game(&alert.game_id).await else {
            debug!("timer for alert {alert_id}: game {} not listed", alert.game_id);
            return;
        };

        if matches!(game.state, GameState::Postponed | GameState::Final) {
            debug!("timer for alert {alert_id}: game is {}, leaving for tick", game.state);
            return;
        }

        let fire_at = alert.fire_time(game.start_time);
        if fire_at > armed_for {
            info!("game {} moved to {}, re-arming alert {alert_id}", game.id, game.start_time);
            self.arm(alert_id, fire_at);
            return;
        }

        if game.start_time <= self.inner.clock.now() {
            return;
        }

        let user = match store.find_user(&alert.user_id).await {
            Ok(Some(user)) => user,
            _ => return,
        };
        if self.deliver(&alert, &game, &user).await == Delivery::Failed {
            debug!("timer delivery of alert {alert_id} failed, tick will retry");
        }
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    async fn deliver(&self, alert: &Alert, game: &Game, user: &User) -> Delivery {
        let Some(_claim) = Claim::acquire(&self.inner.claims, &alert.id) else {
            return Delivery::Skipped;
        };

        let store = &self.inner.store;
        match store.get_alert(&alert.id).await {
            Ok(Some(current)) if !current.notified => {}
            Ok(_) => return Delivery::Skipped,
            Err(e) => {
                warn!("could not re-read alert {}: {e}", alert.id);
                return Delivery::Failed;
            }
        }

        let payload = AlertPayload::new(alert, game, self.inner.clock.now());
        if !self.inner.notifier.send(user, &payload).await {
            warn!("delivery of alert {} to {} failed", alert.id, user.id);
            return Delivery::Failed;
        }

        self.disarm(&alert.id);
        match store.mark_notified(&alert.id).await {
            Ok(true) => {
                info!("alert {} delivered to {}", alert.id, user.id);
                Delivery::Sent
            }
            // Cancelled mid-send.
            Ok(false) => Delivery::Skipped,
            Err(e) => {
                error!("alert {} sent but not marked notified: {e}", alert.id);
                Delivery::Sent
            }
        }
    }
}

/// Held for the duration of one tick.
struct RunningFlag<'a>(&'a AtomicBool);

impl<'a> RunningFlag<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Exclusive right to deliver one alert.
struct Claim<'a> {
    claims: &'a DashSet<String>,
    id: String,
}

impl<'a> Claim<'a> {
    fn acquire(claims: &'a DashSet<String>, id: &str) -> Option<Self> {
        claims.insert(id.to_owned()).then(|| Self { claims, id: id.to_owned() })
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.claims.remove(&self.id);
    }
}
