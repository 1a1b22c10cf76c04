use chrono::Utc;
use mc_core::{FeedState, PushChannelState, PushEvent, Snapshot};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePhase {
    Idle,
    Fetching,
    Ready,
}

impl CachePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CachePhase::Idle => "idle",
            CachePhase::Fetching => "fetching",
            CachePhase::Ready => "ready",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => CachePhase::Fetching,
            2 => CachePhase::Ready,
            _ => CachePhase::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            CachePhase::Idle => 0,
            CachePhase::Fetching => 1,
            CachePhase::Ready => 2,
        }
    }
}

impl fmt::Display for CachePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner of the current snapshot. Writers swap in a new `Arc<Snapshot>`;
/// readers clone the `Arc` and never observe a half-built value.
pub struct SnapshotCache {
    tx: watch::Sender<Arc<Snapshot>>,
    phase: AtomicU8,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    /// Starts with the loading placeholder.
    pub fn new() -> Self {
        Self::with_snapshot(Snapshot::loading(Utc::now()))
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(snapshot));
        Self {
            tx,
            phase: AtomicU8::new(CachePhase::Idle.as_u8()),
        }
    }

    pub fn latest(&self) -> Arc<Snapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn phase(&self) -> CachePhase {
        CachePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn begin_refresh(&self) {
        self.phase
            .store(CachePhase::Fetching.as_u8(), Ordering::Release);
    }

    /// Publishes the outcome of a poll. A total outage after live data keeps
    /// the last good collections and marks them stale.
    pub fn publish_refresh(&self, fresh: Snapshot) -> Arc<Snapshot> {
        let published = self.swap(|current| merge_refresh(current, fresh.clone()));
        self.phase.store(CachePhase::Ready.as_u8(), Ordering::Release);
        published
    }

    pub fn apply_push(&self, event: PushEvent) {
        self.swap(|current| {
            let mut next = current.clone();
            apply_event(&mut next, event.clone());
            next
        });
    }

    pub fn set_push_state(&self, state: PushChannelState) {
        if self.latest().push_channel == state {
            return;
        }
        self.swap(|current| {
            let mut next = current.clone();
            next.push_channel = state;
            next
        });
    }

    /// Builds the next snapshot outside the channel lock, then installs it
    /// only if no other writer got there first. The lock is held for a
    /// pointer compare and an `Arc` store.
    fn swap(&self, mut build: impl FnMut(&Snapshot) -> Snapshot) -> Arc<Snapshot> {
        loop {
            let base = self.latest();
            let next = Arc::new(build(&base));
            let installed = self.tx.send_if_modified(|current| {
                if !Arc::ptr_eq(current, &base) {
                    return false;
                }
                *current = next.clone();
                true
            });
            if installed {
                return next;
            }
        }
    }
}

fn apply_event(snapshot: &mut Snapshot, event: PushEvent) {
    match event {
        PushEvent::MissionsUpdate(mut missions) => {
            for mission in &mut missions {
                mission.enforce_progress_invariant();
            }
            snapshot.missions = missions;
        }
        PushEvent::SideHustlesUpdate(hustles) => snapshot.side_hustles = hustles,
        PushEvent::SystemStatusUpdate(status) => {
            snapshot.status.uptime_seconds = status.uptime;
            if let Some(model) = status.primary_model() {
                snapshot.status.model = model.to_string();
            }
            if let Some(response_time) = status.response_time_ms() {
                snapshot.status.response_time_ms = response_time;
            }
        }
        PushEvent::AgentStatusUpdate(agents) => snapshot.agent_statuses = agents,
    }
}

fn merge_refresh(previous: &Snapshot, mut fresh: Snapshot) -> Snapshot {
    fresh.side_hustles = previous.side_hustles.clone();
    fresh.agent_statuses = previous.agent_statuses.clone();
    fresh.push_channel = previous.push_channel;

    let holding = previous.has_live_data() || previous.stale;
    if fresh.state != FeedState::Offline || !holding {
        return fresh;
    }

    let mut status = previous.status.clone();
    status.online = false;
    Snapshot {
        missions: previous.missions.clone(),
        activities: previous.activities.clone(),
        status,
        jobs: previous.jobs.clone(),
        schedule_activities: previous.schedule_activities.clone(),
        fetched_at: fresh.fetched_at,
        source_errors: fresh.source_errors,
        state: FeedState::Offline,
        stale: true,
        side_hustles: fresh.side_hustles,
        agent_statuses: fresh.agent_statuses,
        push_channel: fresh.push_channel,
    }
}

/// A consumer's handle on the cache. Dropping it, or calling `unsubscribe`,
/// releases the slot.
pub struct Subscription {
    rx: watch::Receiver<Arc<Snapshot>>,
}

impl Subscription {
    pub fn latest(&self) -> Arc<Snapshot> {
        self.rx.borrow().clone()
    }

    /// Waits for the next published snapshot. `None` once the cache is gone.
    pub async fn changed(&mut self) -> Option<Arc<Snapshot>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use mc_core::push::{PushSystemStatus, SideHustle, SideHustleStatus};
    use mc_core::{Mission, MissionStatus};

    fn live_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::loading(Utc::now());
        snapshot.state = FeedState::Online;
        snapshot.status.online = true;
        snapshot.missions[0].id = "agent:main:main".to_string();
        snapshot
    }

    fn offline_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::loading(Utc::now());
        snapshot.state = FeedState::Offline;
        snapshot.missions[0].id = "fallback-1".to_string();
        snapshot.source_errors.health = Some("unavailable: down".to_string());
        snapshot
    }

    #[test]
    fn starts_idle_with_loading_placeholder() {
        let cache = SnapshotCache::new();
        assert_eq!(cache.phase(), CachePhase::Idle);
        assert_eq!(cache.latest().state, FeedState::Loading);
        assert_eq!(cache.latest().missions.len(), 1);
    }

    #[test]
    fn phase_moves_through_fetching_to_ready() {
        let cache = SnapshotCache::new();
        cache.begin_refresh();
        assert_eq!(cache.phase(), CachePhase::Fetching);
        cache.publish_refresh(live_snapshot());
        assert_eq!(cache.phase(), CachePhase::Ready);
    }

    #[test]
    fn offline_refresh_keeps_last_good_data() {
        let cache = SnapshotCache::new();
        cache.publish_refresh(live_snapshot());
        let held = cache.publish_refresh(offline_snapshot());

        assert!(held.stale);
        assert_eq!(held.state, FeedState::Offline);
        assert!(!held.status.online);
        assert_eq!(held.missions[0].id, "agent:main:main");
        assert_eq!(held.source_errors.health.as_deref(), Some("unavailable: down"));

        let still_held = cache.publish_refresh(offline_snapshot());
        assert!(still_held.stale);
        assert_eq!(still_held.missions[0].id, "agent:main:main");

        let recovered = cache.publish_refresh(live_snapshot());
        assert!(!recovered.stale);
        assert_eq!(recovered.state, FeedState::Online);
    }

    #[test]
    fn offline_without_prior_data_passes_through() {
        let cache = SnapshotCache::new();
        let published = cache.publish_refresh(offline_snapshot());
        assert!(!published.stale);
        assert_eq!(published.missions[0].id, "fallback-1");
    }

    #[test]
    fn push_groups_survive_refresh() {
        let cache = SnapshotCache::new();
        cache.set_push_state(PushChannelState::Connected);
        cache.apply_push(PushEvent::AgentStatusUpdate(Vec::new()));
        cache.publish_refresh(live_snapshot());
        assert_eq!(cache.latest().push_channel, PushChannelState::Connected);
    }

    #[test]
    fn push_status_updates_selected_fields() {
        let cache = SnapshotCache::with_snapshot(live_snapshot());
        cache.apply_push(PushEvent::SystemStatusUpdate(PushSystemStatus {
            uptime: 99,
            model_usage: Vec::new(),
            api_status: Vec::new(),
            last_updated: None,
        }));
        let latest = cache.latest();
        assert_eq!(latest.status.uptime_seconds, 99);
        assert_eq!(latest.status.model, "unknown");
        assert!(latest.status.online);
    }

    #[test]
    fn push_missions_reenforce_progress() {
        let cache = SnapshotCache::new();
        let mut mission: Mission = live_snapshot().missions[0].clone();
        mission.status = MissionStatus::Completed;
        mission.progress = None;
        cache.apply_push(PushEvent::MissionsUpdate(vec![mission]));
        assert_eq!(cache.latest().missions[0].progress, Some(100));
    }

    #[test]
    fn published_snapshot_is_the_installed_one() {
        let cache = SnapshotCache::new();
        let published = cache.publish_refresh(live_snapshot());
        assert!(Arc::ptr_eq(&published, &cache.latest()));
    }

    #[test]
    fn concurrent_writers_do_not_lose_updates() {
        let cache = SnapshotCache::new();
        let hustle = SideHustle {
            id: "h1".to_string(),
            name: "Newsletter".to_string(),
            description: String::new(),
            status: SideHustleStatus::Running,
            revenue: Some(3.5),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            metrics: None,
        };

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..200 {
                    cache.publish_refresh(live_snapshot());
                }
            });
            scope.spawn(|| {
                for _ in 0..200 {
                    let _reader = cache.latest();
                }
            });
            scope.spawn(|| {
                for attempt in 1..=200 {
                    cache.set_push_state(PushChannelState::Reconnecting { attempt });
                }
                cache.set_push_state(PushChannelState::Connected);
                cache.apply_push(PushEvent::SideHustlesUpdate(vec![hustle.clone()]));
            });
        });

        let latest = cache.latest();
        assert_eq!(latest.push_channel, PushChannelState::Connected);
        assert_eq!(latest.side_hustles.len(), 1);
        assert_eq!(latest.state, FeedState::Online);
    }

    #[tokio::test]
    async fn subscribers_see_changes_and_release() {
        let cache = SnapshotCache::new();
        let mut sub = cache.subscribe();
        assert_eq!(cache.subscriber_count(), 1);

        cache.publish_refresh(live_snapshot());
        let next = sub.changed().await.expect("changed");
        assert_eq!(next.state, FeedState::Online);
        assert_eq!(sub.latest().state, FeedState::Online);

        sub.unsubscribe();
        assert_eq!(cache.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn changed_ends_when_cache_dropped() {
        let cache = SnapshotCache::new();
        let mut sub = cache.subscribe();
        drop(cache);
        assert!(sub.changed().await.is_none());
    }
}
