use crate::app::App;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

const CACHE_PURGE_EVERY: Duration = Duration::from_secs(5 * 60);

/// Background loops for `serve`: the alert tick, the playlist-driven
/// directory rebuild and expired-cache cleanup.
pub struct PeriodicRefresher {
    app: Arc<App>,
    tick_every: Duration,
    directory_every: Duration,
}

impl PeriodicRefresher {
    pub fn new(app: Arc<App>) -> Self {
        let tick_every = app.settings.tick_every;
        let directory_every = app.settings.directory_refresh_every;
        Self { app, tick_every, directory_every }
    }

    pub async fn run(self) {
        let mut ticks = every(self.tick_every);
        let mut refreshes = every(self.directory_every);
        let mut purges = every(CACHE_PURGE_EVERY);

        // Skip the immediate first ticks; `App::start` already did this work.
        ticks.tick().await;
        refreshes.tick().await;
        purges.tick().await;

        // Tick and refresh are spawned so neither holds up the other.
        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    // A tick still running when the next one starts is skipped.
                    let app = self.app.clone();
                    tokio::spawn(async move {
                        app.tick().await;
                    });
                }
                _ = refreshes.tick() => {
                    let app = self.app.clone();
                    tokio::spawn(async move {
                        if let Err(e) = app.refresh_directory().await {
                            warn!("directory refresh failed, keeping previous snapshot: {e}");
                        }
                    });
                }
                _ = purges.tick() => {
                    let purged = self.app.purge_cache();
                    if purged > 0 {
                        debug!("purged {purged} expired cache entries");
                    }
                }
            }
        }
    }
}

fn every(period: Duration) -> Interval {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}
