use crate::{GatewayCli, SourceAdapter};
use async_trait::async_trait;
use mc_core::raw::{RawHealthRecord, RawScheduleEntry, ScheduleListing, SessionListing};
use mc_core::{FetchError, SourceKind};
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

pub const CRON_LIST_ARGS: &[&str] = &["cron", "list", "--json"];
pub const HEALTH_ARGS: &[&str] = &["health", "--json"];

/// Strips any banner the CLI prints before its JSON document.
fn json_payload(stdout: &str) -> Result<&str, FetchError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(FetchError::malformed("empty output"));
    }
    match trimmed.find('{') {
        Some(start) => Ok(&trimmed[start..]),
        None => Err(FetchError::malformed("output contains no JSON object")),
    }
}

pub fn parse_schedule_listing(stdout: &str) -> Result<Vec<RawScheduleEntry>, FetchError> {
    let listing: ScheduleListing = serde_json::from_str(json_payload(stdout)?)?;
    Ok(listing.jobs)
}

pub fn parse_health_record(stdout: &str) -> Result<RawHealthRecord, FetchError> {
    let value: Value = serde_json::from_str(json_payload(stdout)?)?;
    if !value.is_object() {
        return Err(FetchError::malformed("health payload is not an object"));
    }
    Ok(serde_json::from_value(value)?)
}

pub fn parse_session_listing(stdout: &str) -> Result<SessionListing, FetchError> {
    Ok(parse_health_record(stdout)?.sessions.into())
}

async fn run_logged(
    cli: &GatewayCli,
    source: SourceKind,
    args: &[&str],
) -> Result<String, FetchError> {
    let started = Instant::now();
    let result = cli.run(args).await;
    debug!(
        event = "adapter_fetch",
        source = source.as_str(),
        ok = result.is_ok(),
        elapsed_ms = started.elapsed().as_millis() as u64
    );
    result
}

/// `<gateway> cron list --json`
#[derive(Debug, Clone)]
pub struct ScheduleAdapter {
    cli: GatewayCli,
}

impl ScheduleAdapter {
    pub fn new(cli: GatewayCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl SourceAdapter for ScheduleAdapter {
    type Record = Vec<RawScheduleEntry>;

    fn source(&self) -> SourceKind {
        SourceKind::Schedule
    }

    async fn fetch(&self) -> Result<Self::Record, FetchError> {
        let stdout = run_logged(&self.cli, self.source(), CRON_LIST_ARGS).await?;
        parse_schedule_listing(&stdout)
    }
}

/// Sessions are read from the `sessions` block of `<gateway> health --json`.
#[derive(Debug, Clone)]
pub struct SessionAdapter {
    cli: GatewayCli,
}

impl SessionAdapter {
    pub fn new(cli: GatewayCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl SourceAdapter for SessionAdapter {
    type Record = SessionListing;

    fn source(&self) -> SourceKind {
        SourceKind::Session
    }

    async fn fetch(&self) -> Result<Self::Record, FetchError> {
        let stdout = run_logged(&self.cli, self.source(), HEALTH_ARGS).await?;
        parse_session_listing(&stdout)
    }
}

#[derive(Debug, Clone)]
pub struct HealthAdapter {
    cli: GatewayCli,
}

impl HealthAdapter {
    pub fn new(cli: GatewayCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl SourceAdapter for HealthAdapter {
    type Record = RawHealthRecord;

    fn source(&self) -> SourceKind {
        SourceKind::Health
    }

    async fn fetch(&self) -> Result<Self::Record, FetchError> {
        let stdout = run_logged(&self.cli, self.source(), HEALTH_ARGS).await?;
        parse_health_record(&stdout)
    }
}
