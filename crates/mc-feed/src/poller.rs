use crate::aggregator::Aggregator;
use crate::cache::SnapshotCache;
use mc_core::Snapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::info;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub struct Poller {
    aggregator: Arc<Aggregator>,
    cache: Arc<SnapshotCache>,
    interval: Duration,
}

impl Poller {
    pub fn new(aggregator: Arc<Aggregator>, cache: Arc<SnapshotCache>, interval: Duration) -> Self {
        Self {
            aggregator,
            cache,
            interval: interval.max(Duration::from_millis(100)),
        }
    }

    /// Refreshes immediately, then on every interval tick until `shutdown`
    /// turns true. A tick in flight always runs to completion.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(event = "poller_start", interval_ms = self.interval.as_millis() as u64);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
            self.tick().await;
        }
        info!(event = "poller_stop");
    }

    pub async fn tick(&self) -> Arc<Snapshot> {
        self.cache.begin_refresh();
        let fresh = self.aggregator.refresh().await;
        let published = self.cache.publish_refresh(fresh);
        info!(
            event = "poll_tick",
            state = published.state.as_str(),
            stale = published.stale,
            missions = published.missions.len(),
            activities = published.activities.len(),
            failed_sources = published.source_errors.count()
        );
        published
    }
}
