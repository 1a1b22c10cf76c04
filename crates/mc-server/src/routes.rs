//! HTTP surface. Every handler answers 200 and reports source failures in
//! an `error` field.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use mc_classify::format_uptime;
use mc_core::{
    Activity, AgentSummary, ChannelSummary, FeedState, Mission, RawScheduleEntry, RawSessionEntry,
    Snapshot, SourceKind, UNKNOWN,
};
use mc_feed::normalize::connection_issue_mission;
use mc_feed::{SnapshotCache, GATEWAY_UNAVAILABLE};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

pub fn router(cache: Arc<SnapshotCache>) -> Router {
    Router::new()
        .route("/api/cron", get(cron_handler))
        .route("/api/sessions", get(sessions_handler))
        .route("/api/status", get(status_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(cache)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronResponse {
    pub jobs: Vec<RawScheduleEntry>,
    pub activities: Vec<Activity>,
    pub count: usize,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsResponse {
    pub missions: Vec<Mission>,
    pub total_count: u64,
    pub timestamp: i64,
    pub gateway_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub total: u64,
    pub active: u64,
    pub recent: Vec<RawSessionEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: String,
    pub uptime: u64,
    pub uptime_formatted: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<ChannelSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<SessionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<AgentSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A failed source serves the held data when the snapshot is stale and
/// nothing otherwise.
fn source_failed(snapshot: &Snapshot, source: SourceKind) -> bool {
    snapshot.source_errors.get(source).is_some()
}

fn error_field(snapshot: &Snapshot, source: SourceKind) -> Option<String> {
    source_failed(snapshot, source).then(|| GATEWAY_UNAVAILABLE.to_string())
}

pub fn cron_response(snapshot: &Snapshot, timestamp: i64) -> CronResponse {
    let failed = source_failed(snapshot, SourceKind::Schedule);
    let (jobs, activities) = if failed && !snapshot.stale {
        (Vec::new(), Vec::new())
    } else {
        (snapshot.jobs.clone(), snapshot.schedule_activities.clone())
    };
    CronResponse {
        count: jobs.len(),
        jobs,
        activities,
        timestamp,
        error: error_field(snapshot, SourceKind::Schedule),
    }
}

pub fn sessions_response(snapshot: &Snapshot, timestamp: i64) -> SessionsResponse {
    let failed = source_failed(snapshot, SourceKind::Session);
    let gateway_status = if failed {
        "offline"
    } else if snapshot.state == FeedState::Loading {
        "loading"
    } else {
        "online"
    };
    let (missions, total_count) = if failed && !snapshot.stale {
        (vec![connection_issue_mission(snapshot.fetched_at)], 0)
    } else {
        (
            snapshot.missions.clone(),
            snapshot.status.session_counts.total,
        )
    };
    SessionsResponse {
        missions,
        total_count,
        timestamp,
        gateway_status,
        error: error_field(snapshot, SourceKind::Session),
    }
}

pub fn status_response(snapshot: &Snapshot, timestamp: i64) -> StatusResponse {
    let failed = source_failed(snapshot, SourceKind::Health);
    if failed && !snapshot.stale {
        return StatusResponse {
            status: "offline",
            version: UNKNOWN.to_string(),
            uptime: 0,
            uptime_formatted: format_uptime(0),
            timestamp,
            gateway_time: None,
            response_time: None,
            model: None,
            channels: None,
            sessions: None,
            agents: None,
            heartbeat_interval: None,
            default_agent: None,
            error: Some(GATEWAY_UNAVAILABLE.to_string()),
        };
    }

    let status = &snapshot.status;
    let label = if failed || !status.online {
        "offline"
    } else {
        "online"
    };
    StatusResponse {
        status: label,
        version: status.version.clone(),
        uptime: status.uptime_seconds,
        uptime_formatted: format_uptime(status.uptime_seconds),
        timestamp,
        gateway_time: status.gateway_time.map(|time| time.timestamp_millis()),
        response_time: Some(status.response_time_ms),
        model: Some(status.model.clone()),
        channels: Some(status.channels.clone()),
        sessions: Some(SessionSummary {
            total: status.session_counts.total,
            active: status.session_counts.active,
            recent: status.recent_sessions.clone(),
        }),
        agents: Some(status.agents.clone()),
        heartbeat_interval: Some(status.heartbeat_interval_secs),
        default_agent: Some(status.default_agent.clone()),
        error: error_field(snapshot, SourceKind::Health),
    }
}

async fn cron_handler(State(cache): State<Arc<SnapshotCache>>) -> Json<CronResponse> {
    let snapshot = cache.latest();
    debug!(event = "http_request", route = "/api/cron", state = %snapshot.state);
    Json(cron_response(&snapshot, Utc::now().timestamp_millis()))
}

async fn sessions_handler(State(cache): State<Arc<SnapshotCache>>) -> Json<SessionsResponse> {
    let snapshot = cache.latest();
    debug!(event = "http_request", route = "/api/sessions", state = %snapshot.state);
    Json(sessions_response(&snapshot, Utc::now().timestamp_millis()))
}

async fn status_handler(State(cache): State<Arc<SnapshotCache>>) -> Json<StatusResponse> {
    let snapshot = cache.latest();
    debug!(event = "http_request", route = "/api/status", state = %snapshot.state);
    Json(status_response(&snapshot, Utc::now().timestamp_millis()))
}

async fn snapshot_handler(State(cache): State<Arc<SnapshotCache>>) -> Json<Snapshot> {
    Json(cache.latest().as_ref().clone())
}
