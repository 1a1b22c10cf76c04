use crate::normalize::{build_snapshot, NormalizeContext, ProgressEstimator, RandomProgress, SourceResults};
use chrono::{DateTime, Utc};
use mc_core::raw::{RawHealthRecord, RawScheduleEntry, SessionListing};
use mc_core::{FetchError, Snapshot, SourceKind, UNKNOWN};
use mc_gateway::config_file::read_model_hint;
use mc_gateway::uptime::DEFAULT_UPTIME_TIMEOUT;
use mc_gateway::{
    CommandRunner, GatewayCli, HealthAdapter, ProcessTableUptime, ScheduleAdapter, SessionAdapter,
    SourceAdapter, UptimeProbe, DEFAULT_ADAPTER_TIMEOUT,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub type ScheduleSource = Arc<dyn SourceAdapter<Record = Vec<RawScheduleEntry>>>;
pub type SessionSource = Arc<dyn SourceAdapter<Record = SessionListing>>;
pub type HealthSource = Arc<dyn SourceAdapter<Record = RawHealthRecord>>;

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub adapter_timeout: Duration,
    pub uptime_timeout: Duration,
    pub model_config_path: Option<PathBuf>,
    pub default_version: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            adapter_timeout: DEFAULT_ADAPTER_TIMEOUT,
            uptime_timeout: DEFAULT_UPTIME_TIMEOUT,
            model_config_path: None,
            default_version: UNKNOWN.to_string(),
        }
    }
}

/// Runs one refresh cycle: all sources concurrently, then a pure merge.
pub struct Aggregator {
    schedule: ScheduleSource,
    sessions: SessionSource,
    health: HealthSource,
    uptime: Arc<dyn UptimeProbe>,
    estimator: Arc<dyn ProgressEstimator>,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn new(
        schedule: ScheduleSource,
        sessions: SessionSource,
        health: HealthSource,
        uptime: Arc<dyn UptimeProbe>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            schedule,
            sessions,
            health,
            uptime,
            estimator: Arc::new(RandomProgress),
            config,
        }
    }

    /// Wires the three CLI adapters and the process-table probe to one runner.
    pub fn for_gateway(
        runner: Arc<dyn CommandRunner>,
        program: &str,
        config: AggregatorConfig,
    ) -> Self {
        let cli = GatewayCli::new(runner.clone(), program, config.adapter_timeout);
        let uptime = ProcessTableUptime::new(runner).with_timeout(config.uptime_timeout);
        Self::new(
            Arc::new(ScheduleAdapter::new(cli.clone())),
            Arc::new(SessionAdapter::new(cli.clone())),
            Arc::new(HealthAdapter::new(cli)),
            Arc::new(uptime),
            config,
        )
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn ProgressEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub async fn refresh(&self) -> Snapshot {
        let results = self.collect().await;
        self.normalize(results, Utc::now())
    }

    /// Same as `refresh` with a fixed clock for the merge step.
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> Snapshot {
        let results = self.collect().await;
        self.normalize(results, now)
    }

    async fn collect(&self) -> SourceResults {
        let limit = self.config.adapter_timeout;
        let started = Instant::now();
        let (schedule, sessions, health, uptime, model_hint) = tokio::join!(
            bounded(SourceKind::Schedule.as_str(), limit, self.schedule.fetch()),
            bounded(SourceKind::Session.as_str(), limit, self.sessions.fetch()),
            bounded(SourceKind::Health.as_str(), limit, self.health.fetch()),
            bounded("uptime", self.config.uptime_timeout, self.uptime.backend_uptime()),
            self.model_hint(),
        );

        log_failure(SourceKind::Schedule, &schedule);
        log_failure(SourceKind::Session, &sessions);
        log_failure(SourceKind::Health, &health);
        let uptime_seconds = uptime.unwrap_or_else(|err| {
            debug!(event = "uptime_unavailable", error = %err);
            0
        });
        debug!(
            event = "refresh_collected",
            elapsed_ms = started.elapsed().as_millis() as u64
        );

        SourceResults {
            schedule,
            sessions,
            health,
            uptime_seconds,
            model_hint,
        }
    }

    async fn model_hint(&self) -> Option<String> {
        match &self.config.model_config_path {
            Some(path) => read_model_hint(path).await,
            None => None,
        }
    }

    fn normalize(&self, results: SourceResults, now: DateTime<Utc>) -> Snapshot {
        let ctx = NormalizeContext {
            now,
            estimator: self.estimator.as_ref(),
            default_version: &self.config.default_version,
        };
        build_snapshot(results, &ctx)
    }
}

async fn bounded<T>(
    what: &str,
    limit: Duration,
    fetch: impl Future<Output = Result<T, FetchError>>,
) -> Result<T, FetchError> {
    match tokio::time::timeout(limit, fetch).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::timed_out(what, limit)),
    }
}

fn log_failure<T>(source: SourceKind, result: &Result<T, FetchError>) {
    if let Err(err) = result {
        warn!(
            event = "adapter_failed",
            source = source.as_str(),
            kind = err.kind.as_str(),
            error = %err
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Slow;

    #[async_trait]
    impl SourceAdapter for Slow {
        type Record = Vec<RawScheduleEntry>;

        fn source(&self) -> SourceKind {
            SourceKind::Schedule
        }

        async fn fetch(&self) -> Result<Self::Record, FetchError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    struct Failing;

    #[async_trait]
    impl SourceAdapter for Failing {
        type Record = SessionListing;

        fn source(&self) -> SourceKind {
            SourceKind::Session
        }

        async fn fetch(&self) -> Result<Self::Record, FetchError> {
            Err(FetchError::unavailable("exit 1"))
        }
    }

    struct Healthy;

    #[async_trait]
    impl SourceAdapter for Healthy {
        type Record = RawHealthRecord;

        fn source(&self) -> SourceKind {
            SourceKind::Health
        }

        async fn fetch(&self) -> Result<Self::Record, FetchError> {
            Ok(RawHealthRecord {
                ok: true,
                duration_ms: 5,
                version: Some("2026.2.13".to_string()),
                ..RawHealthRecord::default()
            })
        }
    }

    struct NoUptime;

    #[async_trait]
    impl UptimeProbe for NoUptime {
        async fn backend_uptime(&self) -> Result<u64, FetchError> {
            Err(FetchError::unavailable("ps missing"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_adapter_times_out_without_blocking_others() {
        let aggregator = Aggregator::new(
            Arc::new(Slow),
            Arc::new(Failing),
            Arc::new(Healthy),
            Arc::new(NoUptime),
            AggregatorConfig {
                adapter_timeout: Duration::from_secs(10),
                ..AggregatorConfig::default()
            },
        );

        let snapshot = aggregator.refresh().await;
        let schedule_error = snapshot.source_errors.schedule.as_deref().unwrap_or_default();
        assert!(schedule_error.contains("timed out after 10000ms"), "{schedule_error}");
        assert!(snapshot.source_errors.session.is_some());
        assert!(snapshot.source_errors.health.is_none());
        assert_eq!(snapshot.state, mc_core::FeedState::Degraded);
        assert_eq!(snapshot.status.version, "2026.2.13");
        assert_eq!(snapshot.status.uptime_seconds, 0);
        assert!(snapshot.status.online);
    }
}
