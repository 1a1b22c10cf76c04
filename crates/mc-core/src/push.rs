//! Frame contract of the gateway push channel.
//!
//! Inbound frames are JSON text messages `{"type": ..., "data": ...}`.

use crate::Mission;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PushEvent {
    MissionsUpdate(Vec<Mission>),
    SideHustlesUpdate(Vec<SideHustle>),
    SystemStatusUpdate(PushSystemStatus),
    AgentStatusUpdate(Vec<AgentStatus>),
}

impl PushEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            PushEvent::MissionsUpdate(_) => "missions_update",
            PushEvent::SideHustlesUpdate(_) => "side_hustles_update",
            PushEvent::SystemStatusUpdate(_) => "system_status_update",
            PushEvent::AgentStatusUpdate(_) => "agent_status_update",
        }
    }
}

/// Outbound requests sent by the client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushRequest {
    GetMissions,
    GetSideHustles,
    GetAgentStatus,
    GetSystemStatus,
}

impl PushRequest {
    /// Sent once after every successful open.
    pub const ON_CONNECT: [PushRequest; 4] = [
        PushRequest::GetMissions,
        PushRequest::GetSideHustles,
        PushRequest::GetAgentStatus,
        PushRequest::GetSystemStatus,
    ];
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SideHustleStatus {
    Researching,
    Building,
    Launching,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SideHustleMetrics {
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub users: u64,
    #[serde(default)]
    pub conversions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SideHustle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub status: SideHustleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<SideHustleMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    pub model: String,
    #[serde(default)]
    pub tokens_used: u64,
    #[serde(default)]
    pub requests: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApiHealth {
    Online,
    Offline,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    pub service: String,
    pub status: ApiHealth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PushSystemStatus {
    pub uptime: u64,
    #[serde(default)]
    pub model_usage: Vec<ModelUsage>,
    #[serde(default)]
    pub api_status: Vec<ApiStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl PushSystemStatus {
    /// Model with the most requests, if any usage was reported.
    pub fn primary_model(&self) -> Option<&str> {
        self.model_usage
            .iter()
            .max_by_key(|usage| usage.requests)
            .map(|usage| usage.model.as_str())
    }

    /// First reported response time among the listed services.
    pub fn response_time_ms(&self) -> Option<u64> {
        self.api_status.iter().find_map(|api| api.response_time)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentPresence {
    Online,
    Working,
    Idle,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub id: String,
    pub name: String,
    pub status: AgentPresence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    pub last_active: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },
    #[error("frame encode failed: {0}")]
    Encode(String),
    #[error("frame decode failed: {0}")]
    Decode(String),
}

pub fn encode_frame<T: Serialize>(value: &T, max_frame_bytes: usize) -> Result<String, FrameError> {
    let encoded =
        serde_json::to_string(value).map_err(|err| FrameError::Encode(err.to_string()))?;
    if encoded.len() > max_frame_bytes {
        return Err(FrameError::OversizedFrame {
            size: encoded.len(),
            max: max_frame_bytes,
        });
    }
    Ok(encoded)
}

pub fn decode_frame(text: &str, max_frame_bytes: usize) -> Result<PushEvent, FrameError> {
    let raw = text.trim_end_matches(['\r', '\n']);
    if raw.len() > max_frame_bytes {
        return Err(FrameError::OversizedFrame {
            size: raw.len(),
            max: max_frame_bytes,
        });
    }
    serde_json::from_str(raw).map_err(|err| FrameError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AgentType, MissionStatus};

    #[test]
    fn decodes_missions_update_with_sparse_missions() {
        let frame = r#"{"type":"missions_update","data":[
            {"id":"m-1","title":"Ship it","status":"active","priority":"high","progress":40,
             "createdAt":"2026-01-01T00:00:00Z","updatedAt":"2026-01-01T00:05:00Z",
             "assignedAgent":"Coder-abc123","agentRole":"Code Minion","agentType":"coder"},
            {"id":"m-2","title":"Later"}
        ]}"#;

        let event = decode_frame(frame, DEFAULT_MAX_FRAME_BYTES).expect("decode");
        let missions = match event {
            PushEvent::MissionsUpdate(missions) => missions,
            other => panic!("unexpected event: {other:?}"),
        };
        assert_eq!(missions.len(), 2);
        assert_eq!(missions[0].status, MissionStatus::Active);
        assert_eq!(missions[0].agent_type, AgentType::Coder);
        assert_eq!(missions[0].progress, Some(40));
        assert_eq!(missions[1].status, MissionStatus::Queued);
        assert_eq!(missions[1].agent_type, AgentType::Chief);
    }

    #[test]
    fn decodes_system_status_update() {
        let frame = r#"{"type":"system_status_update","data":{
            "uptime":3723,
            "modelUsage":[{"model":"claude-sonnet","tokensUsed":1200,"requests":3},
                          {"model":"claude-opus","tokensUsed":900,"requests":9}],
            "apiStatus":[{"service":"gateway","status":"online","responseTime":87}],
            "lastUpdated":"2026-01-01T00:00:00Z"
        }}"#;

        let event = decode_frame(frame, DEFAULT_MAX_FRAME_BYTES).expect("decode");
        assert_eq!(event.kind(), "system_status_update");
        let PushEvent::SystemStatusUpdate(status) = event else {
            panic!("expected system status update");
        };
        assert_eq!(status.uptime, 3723);
        assert_eq!(status.primary_model(), Some("claude-opus"));
        assert_eq!(status.response_time_ms(), Some(87));
    }

    #[test]
    fn decodes_side_hustles_and_agent_statuses() {
        let hustles = r#"{"type":"side_hustles_update","data":[{"id":"h1","name":"Newsletter",
            "status":"running","revenue":12.5,"createdAt":"2026-01-01T00:00:00Z",
            "updatedAt":"2026-01-02T00:00:00Z","metrics":{"views":10,"users":2,"conversions":1}}]}"#;
        let agents = r#"{"type":"agent_status_update","data":[{"id":"a1","name":"Caleb",
            "status":"working","currentTask":"triage","lastActive":"2026-01-01T00:00:00Z"}]}"#;

        match decode_frame(hustles, DEFAULT_MAX_FRAME_BYTES).expect("decode hustles") {
            PushEvent::SideHustlesUpdate(items) => {
                assert_eq!(items[0].status, SideHustleStatus::Running);
                assert_eq!(items[0].metrics.map(|m| m.users), Some(2));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match decode_frame(agents, DEFAULT_MAX_FRAME_BYTES).expect("decode agents") {
            PushEvent::AgentStatusUpdate(items) => {
                assert_eq!(items[0].status, AgentPresence::Working);
                assert_eq!(items[0].current_task.as_deref(), Some("triage"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_and_bad_json_are_decode_errors() {
        let unknown = decode_frame(r#"{"type":"weather_update","data":{}}"#, 1024);
        assert!(matches!(unknown, Err(FrameError::Decode(_))));

        let broken = decode_frame("{not json", 1024);
        assert!(matches!(broken, Err(FrameError::Decode(_))));
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let frame = format!(
            r#"{{"type":"agent_status_update","data":[],"pad":"{}"}}"#,
            "x".repeat(128)
        );
        let result = decode_frame(&frame, 64);
        assert!(matches!(result, Err(FrameError::OversizedFrame { max: 64, .. })));
    }

    #[test]
    fn request_encodes_as_tagged_type() {
        let frame = encode_frame(&PushRequest::GetSystemStatus, DEFAULT_MAX_FRAME_BYTES)
            .expect("encode");
        assert_eq!(frame, r#"{"type":"get_system_status"}"#);
        assert!(matches!(
            encode_frame(&PushRequest::GetSystemStatus, 4),
            Err(FrameError::OversizedFrame { .. })
        ));

        let frames: Vec<String> = PushRequest::ON_CONNECT
            .iter()
            .map(|request| encode_frame(request, DEFAULT_MAX_FRAME_BYTES).expect("encode"))
            .collect();
        assert_eq!(
            frames,
            [
                r#"{"type":"get_missions"}"#,
                r#"{"type":"get_side_hustles"}"#,
                r#"{"type":"get_agent_status"}"#,
                r#"{"type":"get_system_status"}"#,
            ]
        );
    }
}
