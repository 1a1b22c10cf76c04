//! Pure merge of adapter results into one `Snapshot`.

use chrono::{DateTime, TimeZone, Utc};
use mc_classify::{
    classify_agent_from_key, classify_mission_status, classify_schedule_name,
    classify_session_key, expand_cron_expression, time_until,
};
use mc_core::raw::{RawHealthRecord, RawScheduleEntry, RawSessionEntry, SessionListing};
use mc_core::{
    Activity, ActivityStatus, AgentSummary, AgentType, ChannelDetail, ChannelSummary, FeedState,
    FetchError, Mission, MissionPriority, MissionStatus, SessionCounts, Snapshot, SourceErrors,
    SourceKind, SystemStatus, ACTIVE_SESSION_WINDOW_MS, DEFAULT_AGENT_ID, DEFAULT_HEARTBEAT_SECS,
    MAX_ACTIVITIES, MAX_RECENT_SESSIONS, UNKNOWN,
};
use rand::Rng;
use std::collections::HashSet;

/// Number of leading key segments that identify one logical session.
pub const BASE_KEY_SEGMENTS: usize = 4;
pub const CONNECTION_ISSUE_MISSION_ID: &str = "fallback-1";
pub const CONNECTION_ISSUE_ACTIVITY_ID: &str = "fallback-activity-1";
pub const GATEWAY_UNAVAILABLE: &str = "Gateway unavailable";

/// Placeholder progress for active missions. The gateway reports no real
/// progress signal, so values are only meaningful as a range.
pub trait ProgressEstimator: Send + Sync {
    /// Returns a value in `50..90`.
    fn estimate(&self, mission: &Mission) -> u8;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomProgress;

impl ProgressEstimator for RandomProgress {
    fn estimate(&self, _mission: &Mission) -> u8 {
        rand::thread_rng().gen_range(50..90)
    }
}

/// Everything one refresh collected, successful or not.
#[derive(Debug)]
pub struct SourceResults {
    pub schedule: Result<Vec<RawScheduleEntry>, FetchError>,
    pub sessions: Result<SessionListing, FetchError>,
    pub health: Result<RawHealthRecord, FetchError>,
    pub uptime_seconds: u64,
    pub model_hint: Option<String>,
}

pub struct NormalizeContext<'a> {
    pub now: DateTime<Utc>,
    pub estimator: &'a dyn ProgressEstimator,
    pub default_version: &'a str,
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

pub fn base_session_key(key: &str) -> String {
    key.split(':')
        .take(BASE_KEY_SEGMENTS)
        .collect::<Vec<_>>()
        .join(":")
}

/// Keeps the first entry per base key, in source order.
pub fn dedup_sessions(entries: Vec<RawSessionEntry>) -> Vec<RawSessionEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(base_session_key(&entry.key)))
        .collect()
}

pub fn mission_from_session(
    entry: &RawSessionEntry,
    now: DateTime<Utc>,
    estimator: &dyn ProgressEstimator,
) -> Mission {
    let class = classify_session_key(&entry.key);
    let agent = classify_agent_from_key(&entry.key);
    let status = classify_mission_status(entry.age);
    let updated_at = millis_to_datetime(entry.updated_at).unwrap_or(now);
    let age = i64::try_from(entry.age).unwrap_or(i64::MAX);
    let created_at = millis_to_datetime(entry.updated_at.saturating_sub(age)).unwrap_or(updated_at);

    let mut mission = Mission {
        id: entry.key.clone(),
        title: class.title.to_string(),
        description: class.description.to_string(),
        status,
        priority: class.priority,
        created_at,
        updated_at,
        assigned_agent: agent.name,
        agent_role: agent.role.to_string(),
        agent_type: agent.agent_type,
        progress: None,
        session_age_ms: Some(entry.age),
    };
    mission.progress = match status {
        MissionStatus::Active => Some(estimator.estimate(&mission).clamp(50, 89)),
        MissionStatus::Completed => Some(100),
        MissionStatus::Queued | MissionStatus::Blocked => None,
    };
    mission
}

/// Active first, then by priority rank. Stable for equal keys.
pub fn sort_missions(missions: &mut [Mission]) {
    missions.sort_by_key(|mission| {
        (
            mission.status != MissionStatus::Active,
            mission.priority.rank(),
        )
    });
}

pub fn schedule_activity(job: &RawScheduleEntry, now_ms: i64) -> Activity {
    let class = classify_schedule_name(&job.name);
    let next_run = job.next_run_at_ms().filter(|ms| *ms > 0);
    let when = match next_run {
        Some(ms) => time_until(ms, now_ms),
        None => "Not scheduled".to_string(),
    };
    let cron = expand_cron_expression(&job.schedule.expr);
    let (action, status) = if job.enabled {
        (
            format!("scheduled {}", class.category.to_lowercase()),
            ActivityStatus::InProgress,
        )
    } else {
        ("disabled job".to_string(), ActivityStatus::Completed)
    };

    Activity {
        id: job.id.clone(),
        timestamp: millis_to_datetime(job.updated_at_ms)
            .or_else(|| millis_to_datetime(job.created_at_ms))
            .or_else(|| millis_to_datetime(now_ms))
            .unwrap_or_default(),
        agent: job.name.clone(),
        agent_type: class.agent_type,
        action,
        target: Some(format!("{cron} • {when}")),
        status,
        next_run: next_run.and_then(millis_to_datetime),
        delivery_mode: Some(job.delivery.mode.clone()).filter(|mode| !mode.is_empty()),
        icon: Some(class.icon.to_string()),
        category: Some(class.category.to_string()),
    }
}

/// Soonest next run first; jobs without one go last.
pub fn sort_schedule_activities(activities: &mut [Activity]) {
    activities.sort_by_key(|activity| (activity.next_run.is_none(), activity.next_run));
}

pub fn mission_activity(mission: &Mission) -> Activity {
    Activity {
        id: format!("mission-{}", mission.id),
        timestamp: mission.updated_at,
        agent: mission.assigned_agent.clone(),
        agent_type: mission.agent_type,
        action: "executing mission".to_string(),
        target: Some(mission.title.clone()),
        status: ActivityStatus::InProgress,
        next_run: None,
        delivery_mode: None,
        icon: None,
        category: None,
    }
}

/// Mission activities (most recent first) followed by schedule activities,
/// capped at `MAX_ACTIVITIES`.
pub fn combine_activities(missions: &[Mission], schedule_activities: &[Activity]) -> Vec<Activity> {
    let mut from_missions: Vec<Activity> = missions
        .iter()
        .filter(|mission| mission.status == MissionStatus::Active)
        .map(mission_activity)
        .collect();
    from_missions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    from_missions
        .into_iter()
        .chain(schedule_activities.iter().cloned())
        .take(MAX_ACTIVITIES)
        .collect()
}

fn channel_summary(health: &RawHealthRecord) -> ChannelSummary {
    let details = health
        .channels
        .iter()
        .map(|(name, channel)| {
            let detail = ChannelDetail {
                configured: channel.configured,
                running: channel.running,
                probe_ok: channel.probe.as_ref().map(|probe| probe.ok),
                bot: channel
                    .probe
                    .as_ref()
                    .and_then(|probe| probe.bot.as_ref())
                    .map(|bot| bot.username.clone())
                    .filter(|name| !name.is_empty()),
            };
            (name.clone(), detail)
        })
        .collect();
    ChannelSummary {
        active: health.channels.values().filter(|c| c.running).count(),
        configured: health.channels.values().filter(|c| c.configured).count(),
        details,
    }
}

/// Builds the status block. Session counts prefer the session listing and
/// fall back to the health record's own sample.
pub fn build_status(
    health: Option<&RawHealthRecord>,
    sessions: Option<&SessionListing>,
    online: bool,
    uptime_seconds: u64,
    model_hint: Option<&str>,
    default_version: &str,
) -> SystemStatus {
    let fallback_listing = health.map(|h| SessionListing::from(h.sessions.clone()));
    let listing = sessions.or(fallback_listing.as_ref());

    let (session_counts, recent_sessions) = match listing {
        Some(listing) => (
            SessionCounts {
                total: listing.total,
                active: listing
                    .entries
                    .iter()
                    .filter(|entry| entry.age < ACTIVE_SESSION_WINDOW_MS)
                    .count() as u64,
            },
            listing
                .entries
                .iter()
                .take(MAX_RECENT_SESSIONS)
                .cloned()
                .collect(),
        ),
        None => (SessionCounts::default(), Vec::new()),
    };

    let version = health
        .and_then(|h| h.version.clone())
        .unwrap_or_else(|| default_version.to_string());

    SystemStatus {
        online,
        uptime_seconds,
        version,
        model: model_hint.unwrap_or(UNKNOWN).to_string(),
        response_time_ms: health.map(|h| h.duration_ms).unwrap_or(0),
        session_counts,
        gateway_time: health.and_then(|h| millis_to_datetime(h.ts)),
        channels: health.map(channel_summary).unwrap_or_default(),
        agents: health
            .map(|h| {
                h.agents
                    .iter()
                    .map(|agent| AgentSummary {
                        id: agent.agent_id.clone(),
                        is_default: agent.is_default,
                        session_count: agent.sessions.as_ref().map(|s| s.count).unwrap_or(0),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        recent_sessions,
        heartbeat_interval_secs: health
            .and_then(|h| h.heartbeat_seconds)
            .unwrap_or(DEFAULT_HEARTBEAT_SECS),
        default_agent: health
            .and_then(|h| h.default_agent_id.clone())
            .unwrap_or_else(|| DEFAULT_AGENT_ID.to_string()),
    }
}

pub fn connection_issue_mission(now: DateTime<Utc>) -> Mission {
    Mission {
        id: CONNECTION_ISSUE_MISSION_ID.to_string(),
        title: "⚠️ Gateway Connection Issue".to_string(),
        description: "Unable to connect to OpenClaw gateway. Check service status.".to_string(),
        status: MissionStatus::Blocked,
        priority: MissionPriority::Critical,
        created_at: now,
        updated_at: now,
        assigned_agent: "SYSTEM".to_string(),
        agent_role: "System Monitor".to_string(),
        agent_type: AgentType::Analyst,
        progress: None,
        session_age_ms: None,
    }
}

pub fn connection_issue_activity(now: DateTime<Utc>) -> Activity {
    Activity {
        id: CONNECTION_ISSUE_ACTIVITY_ID.to_string(),
        timestamp: now,
        agent: "SYSTEM".to_string(),
        agent_type: AgentType::Analyst,
        action: "lost connection to gateway".to_string(),
        target: Some(GATEWAY_UNAVAILABLE.to_string()),
        status: ActivityStatus::Failed,
        next_run: None,
        delivery_mode: None,
        icon: Some("⚠️".to_string()),
        category: None,
    }
}

pub fn build_snapshot(results: SourceResults, ctx: &NormalizeContext<'_>) -> Snapshot {
    let now = ctx.now;
    let mut source_errors = SourceErrors::default();
    let SourceResults {
        schedule,
        sessions,
        health,
        uptime_seconds,
        model_hint,
    } = results;

    let jobs = match schedule {
        Ok(jobs) => Some(jobs),
        Err(err) => {
            source_errors.set(SourceKind::Schedule, err.to_string());
            None
        }
    };
    let sessions = match sessions {
        Ok(listing) => Some(listing),
        Err(err) => {
            source_errors.set(SourceKind::Session, err.to_string());
            None
        }
    };
    let health = match health {
        Ok(record) => Some(record),
        Err(err) => {
            source_errors.set(SourceKind::Health, err.to_string());
            None
        }
    };

    let failed = source_errors.count();
    let state = match failed {
        0 => FeedState::Online,
        n if n == SourceKind::ALL.len() => FeedState::Offline,
        _ => FeedState::Degraded,
    };
    let online = match &health {
        Some(record) => record.ok,
        None => state != FeedState::Offline,
    };
    let status = build_status(
        health.as_ref(),
        sessions.as_ref(),
        online,
        uptime_seconds,
        model_hint.as_deref(),
        ctx.default_version,
    );

    if state == FeedState::Offline {
        return Snapshot {
            missions: vec![connection_issue_mission(now)],
            activities: vec![connection_issue_activity(now)],
            status,
            jobs: Vec::new(),
            schedule_activities: Vec::new(),
            fetched_at: now,
            source_errors,
            state,
            stale: false,
            side_hustles: Vec::new(),
            agent_statuses: Vec::new(),
            push_channel: Default::default(),
        };
    }

    // Status counts use the raw listing; only missions are deduplicated.
    let mut missions: Vec<Mission> = sessions
        .map(|listing| {
            dedup_sessions(listing.entries)
                .iter()
                .map(|entry| mission_from_session(entry, now, ctx.estimator))
                .collect()
        })
        .unwrap_or_default();
    sort_missions(&mut missions);

    let jobs = jobs.unwrap_or_default();
    let now_ms = now.timestamp_millis();
    let mut schedule_activities: Vec<Activity> =
        jobs.iter().map(|job| schedule_activity(job, now_ms)).collect();
    sort_schedule_activities(&mut schedule_activities);
    let activities = combine_activities(&missions, &schedule_activities);

    Snapshot {
        missions,
        activities,
        status,
        jobs,
        schedule_activities,
        fetched_at: now,
        source_errors,
        state,
        stale: false,
        side_hustles: Vec::new(),
        agent_statuses: Vec::new(),
        push_channel: Default::default(),
    }
}
