use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod error;
pub mod push;
pub mod raw;

pub use error::{FetchError, FetchErrorKind};
pub use push::{AgentStatus, PushEvent, PushSystemStatus, SideHustle};
pub use raw::{RawHealthRecord, RawScheduleEntry, RawSessionEntry, SessionListing};

/// Upper bound on the combined activity list of one refresh.
pub const MAX_ACTIVITIES: usize = 10;
/// Number of recent sessions surfaced in the status block.
pub const MAX_RECENT_SESSIONS: usize = 5;
/// Sessions younger than this count toward `sessionCounts.active`.
pub const ACTIVE_SESSION_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_HEARTBEAT_SECS: u64 = 3600;
pub const DEFAULT_AGENT_ID: &str = "main";
pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Active,
    Queued,
    Blocked,
    Completed,
}

impl Default for MissionStatus {
    fn default() -> Self {
        Self::Queued
    }
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Active => "active",
            MissionStatus::Queued => "queued",
            MissionStatus::Blocked => "blocked",
            MissionStatus::Completed => "completed",
        }
    }

    /// Statuses that must carry a progress value.
    pub fn has_progress(&self) -> bool {
        matches!(self, MissionStatus::Active | MissionStatus::Completed)
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissionStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "active" => Ok(MissionStatus::Active),
            "queued" => Ok(MissionStatus::Queued),
            "blocked" => Ok(MissionStatus::Blocked),
            "completed" | "done" => Ok(MissionStatus::Completed),
            other => Err(format!("Unknown mission status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MissionPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl Default for MissionPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl MissionPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionPriority::Critical => "critical",
            MissionPriority::High => "high",
            MissionPriority::Medium => "medium",
            MissionPriority::Low => "low",
        }
    }

    /// Sort rank, lowest first.
    pub fn rank(&self) -> u8 {
        match self {
            MissionPriority::Critical => 0,
            MissionPriority::High => 1,
            MissionPriority::Medium => 2,
            MissionPriority::Low => 3,
        }
    }
}

impl fmt::Display for MissionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissionPriority {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "critical" => Ok(MissionPriority::Critical),
            "high" => Ok(MissionPriority::High),
            "medium" => Ok(MissionPriority::Medium),
            "low" => Ok(MissionPriority::Low),
            other => Err(format!("Unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    /// The chief-of-staff identity, serialized as `caleb`.
    #[serde(rename = "caleb")]
    Chief,
    Coder,
    Researcher,
    Writer,
    Analyst,
}

impl Default for AgentType {
    fn default() -> Self {
        Self::Chief
    }
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Chief => "caleb",
            AgentType::Coder => "coder",
            AgentType::Researcher => "researcher",
            AgentType::Writer => "writer",
            AgentType::Analyst => "analyst",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "caleb" | "chief" => Ok(AgentType::Chief),
            "coder" => Ok(AgentType::Coder),
            "researcher" => Ok(AgentType::Researcher),
            "writer" => Ok(AgentType::Writer),
            "analyst" => Ok(AgentType::Analyst),
            other => Err(format!("Unknown agent type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityStatus {
    Completed,
    InProgress,
    Failed,
}

impl Default for ActivityStatus {
    fn default() -> Self {
        Self::Completed
    }
}

impl ActivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Completed => "completed",
            ActivityStatus::InProgress => "in-progress",
            ActivityStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall health of a snapshot as surfaced to consumers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FeedState {
    Loading,
    Online,
    Degraded,
    Offline,
}

impl Default for FeedState {
    fn default() -> Self {
        Self::Loading
    }
}

impl FeedState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedState::Loading => "loading",
            FeedState::Online => "online",
            FeedState::Degraded => "degraded",
            FeedState::Offline => "offline",
        }
    }
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Schedule,
    Session,
    Health,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Schedule, SourceKind::Session, SourceKind::Health];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Schedule => "schedule",
            SourceKind::Session => "session",
            SourceKind::Health => "health",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PushChannelState {
    Disabled,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Offline,
}

impl Default for PushChannelState {
    fn default() -> Self {
        Self::Disabled
    }
}

impl PushChannelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushChannelState::Disabled => "disabled",
            PushChannelState::Connecting => "connecting",
            PushChannelState::Connected => "connected",
            PushChannelState::Reconnecting { .. } => "reconnecting",
            PushChannelState::Offline => "offline",
        }
    }
}

impl fmt::Display for PushChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushChannelState::Reconnecting { attempt } => write!(f, "reconnecting ({attempt})"),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: MissionStatus,
    #[serde(default)]
    pub priority: MissionPriority,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub assigned_agent: String,
    #[serde(default)]
    pub agent_role: String,
    #[serde(default)]
    pub agent_type: AgentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, rename = "sessionAge", skip_serializing_if = "Option::is_none")]
    pub session_age_ms: Option<u64>,
}

impl Mission {
    /// Clamps progress into 0..=100 and makes it present iff the status
    /// carries progress. Completed missions without a value get 100; active
    /// missions without one get 0.
    pub fn enforce_progress_invariant(&mut self) {
        self.progress = match self.status {
            MissionStatus::Completed => Some(self.progress.unwrap_or(100).min(100)),
            MissionStatus::Active => Some(self.progress.unwrap_or(0).min(100)),
            MissionStatus::Queued | MissionStatus::Blocked => None,
        };
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub agent_type: AgentType,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub status: ActivityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionCounts {
    pub total: u64,
    pub active: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDetail {
    pub configured: bool,
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelSummary {
    pub active: usize,
    pub configured: usize,
    pub details: BTreeMap<String, ChannelDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub id: String,
    pub is_default: bool,
    pub session_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub online: bool,
    pub uptime_seconds: u64,
    pub version: String,
    pub model: String,
    pub response_time_ms: u64,
    pub session_counts: SessionCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channels: ChannelSummary,
    #[serde(default)]
    pub agents: Vec<AgentSummary>,
    #[serde(default)]
    pub recent_sessions: Vec<RawSessionEntry>,
    pub heartbeat_interval_secs: u64,
    pub default_agent: String,
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self {
            online: false,
            uptime_seconds: 0,
            version: UNKNOWN.to_string(),
            model: UNKNOWN.to_string(),
            response_time_ms: 0,
            session_counts: SessionCounts::default(),
            gateway_time: None,
            channels: ChannelSummary::default(),
            agents: Vec::new(),
            recent_sessions: Vec::new(),
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_SECS,
            default_agent: DEFAULT_AGENT_ID.to_string(),
        }
    }
}

/// Per-source failure messages of one refresh. Absent means the source succeeded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceErrors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
}

impl SourceErrors {
    pub fn set(&mut self, source: SourceKind, message: impl Into<String>) {
        let slot = match source {
            SourceKind::Schedule => &mut self.schedule,
            SourceKind::Session => &mut self.session,
            SourceKind::Health => &mut self.health,
        };
        *slot = Some(message.into());
    }

    pub fn get(&self, source: SourceKind) -> Option<&str> {
        match source {
            SourceKind::Schedule => self.schedule.as_deref(),
            SourceKind::Session => self.session.as_deref(),
            SourceKind::Health => self.health.as_deref(),
        }
    }

    pub fn count(&self) -> usize {
        SourceKind::ALL
            .iter()
            .filter(|source| self.get(**source).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub missions: Vec<Mission>,
    pub activities: Vec<Activity>,
    pub status: SystemStatus,
    #[serde(default)]
    pub jobs: Vec<RawScheduleEntry>,
    #[serde(default)]
    pub schedule_activities: Vec<Activity>,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub source_errors: SourceErrors,
    pub state: FeedState,
    #[serde(default)]
    pub stale: bool,
    #[serde(default)]
    pub side_hustles: Vec<SideHustle>,
    #[serde(default)]
    pub agent_statuses: Vec<AgentStatus>,
    #[serde(default)]
    pub push_channel: PushChannelState,
}

pub const LOADING_MISSION_ID: &str = "loading-1";

impl Snapshot {
    /// Placeholder served before the first refresh completes.
    pub fn loading(now: DateTime<Utc>) -> Self {
        let mission = Mission {
            id: LOADING_MISSION_ID.to_string(),
            title: "⏳ Connecting to gateway".to_string(),
            description: "Waiting for the first refresh from the OpenClaw gateway.".to_string(),
            status: MissionStatus::Queued,
            priority: MissionPriority::Low,
            created_at: now,
            updated_at: now,
            assigned_agent: "SYSTEM".to_string(),
            agent_role: "System Monitor".to_string(),
            agent_type: AgentType::Analyst,
            progress: None,
            session_age_ms: None,
        };
        Self {
            missions: vec![mission],
            activities: Vec::new(),
            status: SystemStatus::default(),
            jobs: Vec::new(),
            schedule_activities: Vec::new(),
            fetched_at: now,
            source_errors: SourceErrors::default(),
            state: FeedState::Loading,
            stale: false,
            side_hustles: Vec::new(),
            agent_statuses: Vec::new(),
            push_channel: PushChannelState::default(),
        }
    }

    /// True when the snapshot carries data from at least one live source.
    pub fn has_live_data(&self) -> bool {
        matches!(self.state, FeedState::Online | FeedState::Degraded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mission(status: MissionStatus, progress: Option<u8>) -> Mission {
        Mission {
            id: "agent:main:main".to_string(),
            title: "t".to_string(),
            description: String::new(),
            status,
            priority: MissionPriority::Medium,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            assigned_agent: "Caleb".to_string(),
            agent_role: "Chief of Staff".to_string(),
            agent_type: AgentType::Chief,
            progress,
            session_age_ms: None,
        }
    }

    #[test]
    fn enums_serialize_to_wire_names() {
        assert_eq!(
            serde_json::to_string(&AgentType::Chief).expect("serialize"),
            "\"caleb\""
        );
        assert_eq!(
            serde_json::to_string(&ActivityStatus::InProgress).expect("serialize"),
            "\"in-progress\""
        );
        assert_eq!(
            serde_json::to_string(&PushChannelState::Reconnecting { attempt: 2 })
                .expect("serialize"),
            r#"{"state":"reconnecting","attempt":2}"#
        );
    }

    #[test]
    fn from_str_normalizes_input() {
        assert_eq!(" High ".parse::<MissionPriority>(), Ok(MissionPriority::High));
        assert_eq!("CALEB".parse::<AgentType>(), Ok(AgentType::Chief));
        assert_eq!("done".parse::<MissionStatus>(), Ok(MissionStatus::Completed));
        assert!("urgent".parse::<MissionPriority>().is_err());
    }

    #[test]
    fn priority_rank_orders_critical_first() {
        let mut priorities = vec![
            MissionPriority::Low,
            MissionPriority::Critical,
            MissionPriority::Medium,
            MissionPriority::High,
        ];
        priorities.sort_by_key(|p| p.rank());
        assert_eq!(
            priorities,
            vec![
                MissionPriority::Critical,
                MissionPriority::High,
                MissionPriority::Medium,
                MissionPriority::Low
            ]
        );
    }

    #[test]
    fn progress_invariant_follows_status() {
        let mut queued = mission(MissionStatus::Queued, Some(40));
        queued.enforce_progress_invariant();
        assert_eq!(queued.progress, None);

        let mut completed = mission(MissionStatus::Completed, None);
        completed.enforce_progress_invariant();
        assert_eq!(completed.progress, Some(100));

        let mut active = mission(MissionStatus::Active, Some(250));
        active.enforce_progress_invariant();
        assert_eq!(active.progress, Some(100));
    }

    #[test]
    fn mission_serializes_camel_case_and_skips_absent_progress() {
        let value = serde_json::to_value(mission(MissionStatus::Queued, None)).expect("serialize");
        assert!(value.get("assignedAgent").is_some());
        assert!(value.get("agentType").is_some());
        assert!(value.get("progress").is_none());
        assert!(value.get("sessionAge").is_none());
    }

    #[test]
    fn source_errors_track_each_source() {
        let mut errors = SourceErrors::default();
        assert!(errors.is_empty());
        errors.set(SourceKind::Health, "unavailable: exit 1");
        assert_eq!(errors.count(), 1);
        assert_eq!(errors.get(SourceKind::Health), Some("unavailable: exit 1"));
        assert_eq!(errors.get(SourceKind::Schedule), None);
    }

    #[test]
    fn loading_snapshot_has_one_queued_mission() {
        let snapshot = Snapshot::loading(Utc::now());
        assert_eq!(snapshot.state, FeedState::Loading);
        assert_eq!(snapshot.missions.len(), 1);
        assert_eq!(snapshot.missions[0].status, MissionStatus::Queued);
        assert!(snapshot.missions[0].progress.is_none());
        assert!(!snapshot.status.online);
        assert!(!snapshot.has_live_data());
    }

    #[test]
    fn snapshot_with_side_hustle_revenue_survives_json() {
        let now = Utc::now();
        let mut snapshot = Snapshot::loading(now);
        snapshot.side_hustles.push(push::SideHustle {
            id: "h1".to_string(),
            name: "Newsletter".to_string(),
            description: String::new(),
            status: push::SideHustleStatus::Running,
            revenue: Some(12.5),
            created_at: now,
            updated_at: now,
            metrics: None,
        });

        let encoded = serde_json::to_string(&snapshot).expect("serialize");
        let decoded: Snapshot = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.side_hustles[0].revenue, Some(12.5));
    }
}
