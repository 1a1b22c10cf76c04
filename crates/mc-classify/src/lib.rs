//! Pure classification and formatting helpers.
//!
//! Every classifier is an ordered table of `(needles, result)` rules evaluated
//! top to bottom against a lower-cased haystack. A rule matches when any of its
//! needles is a substring; the first match wins and a fixed fallback covers the
//! rest. Reordering a table changes results, so tests pin each rule.

use mc_core::{AgentType, MissionPriority, MissionStatus, UNKNOWN};

/// One ordered rule: matches when the haystack contains any needle.
pub type Rule<T> = (&'static [&'static str], T);

fn first_match<'a, T>(rules: &'a [Rule<T>], haystack: &str) -> Option<&'a T> {
    rules
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| haystack.contains(needle)))
        .map(|(_, result)| result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleClass {
    pub icon: &'static str,
    pub agent_type: AgentType,
    pub category: &'static str,
}

pub const SCHEDULE_RULES: &[Rule<ScheduleClass>] = &[
    (
        &["night", "content"],
        ScheduleClass {
            icon: "🌙",
            agent_type: AgentType::Writer,
            category: "Content",
        },
    ),
    (
        &["morning", "brief"],
        ScheduleClass {
            icon: "🌅",
            agent_type: AgentType::Analyst,
            category: "Briefing",
        },
    ),
    (
        &["heartbeat", "health"],
        ScheduleClass {
            icon: "💓",
            agent_type: AgentType::Analyst,
            category: "Monitoring",
        },
    ),
    (
        &["report", "stats"],
        ScheduleClass {
            icon: "📊",
            agent_type: AgentType::Analyst,
            category: "Reporting",
        },
    ),
    (
        &["backup", "sync"],
        ScheduleClass {
            icon: "💾",
            agent_type: AgentType::Coder,
            category: "Maintenance",
        },
    ),
    (
        &["research", "scout"],
        ScheduleClass {
            icon: "🔍",
            agent_type: AgentType::Researcher,
            category: "Research",
        },
    ),
    (
        &["write", "draft"],
        ScheduleClass {
            icon: "✍️",
            agent_type: AgentType::Writer,
            category: "Writing",
        },
    ),
    (
        &["code", "deploy"],
        ScheduleClass {
            icon: "💻",
            agent_type: AgentType::Coder,
            category: "Development",
        },
    ),
];

pub const SCHEDULE_FALLBACK: ScheduleClass = ScheduleClass {
    icon: "⏰",
    agent_type: AgentType::Chief,
    category: "Scheduled",
};

pub fn classify_schedule_name(name: &str) -> ScheduleClass {
    let lowered = name.to_lowercase();
    first_match(SCHEDULE_RULES, &lowered)
        .copied()
        .unwrap_or(SCHEDULE_FALLBACK)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClass {
    pub title: &'static str,
    pub description: &'static str,
    pub priority: MissionPriority,
}

pub const SESSION_RULES: &[Rule<SessionClass>] = &[
    (
        &["nightcap"],
        SessionClass {
            title: "🌙 Nightcap Content Discovery",
            description: "Finding and sharing curated content for evening relaxation",
            priority: MissionPriority::Medium,
        },
    ),
    (
        &["morning", "briefing"],
        SessionClass {
            title: "🌅 Morning Briefing",
            description: "Daily briefing and task planning session",
            priority: MissionPriority::High,
        },
    ),
    (
        &["heartbeat"],
        SessionClass {
            title: "💓 System Heartbeat",
            description: "Periodic system health check and monitoring",
            priority: MissionPriority::Low,
        },
    ),
    (
        &["subagent"],
        SessionClass {
            title: "🔧 Subagent Task Execution",
            description: "Delegated task processing by subagent",
            priority: MissionPriority::High,
        },
    ),
    (
        &["mission", "control"],
        SessionClass {
            title: "🎯 Mission Control Update",
            description: "Dashboard and mission control operations",
            priority: MissionPriority::Critical,
        },
    ),
    (
        &["research"],
        SessionClass {
            title: "🔍 Research Task",
            description: "Information gathering and analysis",
            priority: MissionPriority::Medium,
        },
    ),
    (
        &["write", "content"],
        SessionClass {
            title: "✍️ Content Creation",
            description: "Writing and content generation task",
            priority: MissionPriority::High,
        },
    ),
];

pub const SESSION_FALLBACK: SessionClass = SessionClass {
    title: "🤖 AI Session",
    description: "Active AI agent session",
    priority: MissionPriority::Medium,
};

pub fn classify_session_key(key: &str) -> SessionClass {
    let lowered = key.to_lowercase();
    first_match(SESSION_RULES, &lowered)
        .copied()
        .unwrap_or(SESSION_FALLBACK)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub name: String,
    pub role: &'static str,
    pub agent_type: AgentType,
}

/// Subagent identities keyed by a substring of the instance id. The name
/// prefix is followed by the first six characters of the id.
const SUBAGENT_RULES: &[Rule<(&str, &str, AgentType)>] = &[
    (
        &["research"],
        ("Research", "Research Assistant", AgentType::Researcher),
    ),
    (&["code", "dev"], ("Coder", "Code Minion", AgentType::Coder)),
    (&["write"], ("Writer", "Content Minion", AgentType::Writer)),
];

const SUBAGENT_FALLBACK: (&str, &str, AgentType) = ("Minion", "Task Minion", AgentType::Coder);

fn key_segment(parts: &[&str], index: usize) -> String {
    parts
        .get(index)
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

/// Splits a session key on `:`; segment 2 names the agent kind and segment 3
/// the instance id.
pub fn classify_agent_from_key(key: &str) -> AgentIdentity {
    let parts: Vec<&str> = key.split(':').collect();
    let kind = key_segment(&parts, 2).to_lowercase();
    let id = key_segment(&parts, 3);

    match kind.as_str() {
        "subagent" => {
            let lowered = id.to_lowercase();
            let (prefix, role, agent_type) = first_match(SUBAGENT_RULES, &lowered)
                .copied()
                .unwrap_or(SUBAGENT_FALLBACK);
            let short: String = id.chars().take(6).collect();
            AgentIdentity {
                name: format!("{prefix}-{short}"),
                role,
                agent_type,
            }
        }
        "discord" => AgentIdentity {
            name: "Discord Bot".to_string(),
            role: "Channel Manager",
            agent_type: AgentType::Analyst,
        },
        _ => AgentIdentity {
            name: "Caleb".to_string(),
            role: "Chief of Staff",
            agent_type: AgentType::Chief,
        },
    }
}

const CRON_TABLE: &[(&str, &str)] = &[
    ("0 22 * * *", "Daily at 10:00 PM"),
    ("0 7 * * 1-5", "Weekdays at 7:00 AM"),
    ("0 */6 * * *", "Every 6 hours"),
    ("0 * * * *", "Hourly"),
    ("*/15 * * * *", "Every 15 minutes"),
];

/// Human text for a handful of known cron strings; anything else is returned
/// unchanged.
pub fn expand_cron_expression(expr: &str) -> String {
    let trimmed = expr.trim();
    CRON_TABLE
        .iter()
        .find(|(pattern, _)| *pattern == trimmed)
        .map(|(_, text)| (*text).to_string())
        .unwrap_or_else(|| expr.to_string())
}

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 86_400_000;

pub fn time_until(target_ms: i64, now_ms: i64) -> String {
    let diff = target_ms.saturating_sub(now_ms);
    if diff < 0 {
        "Overdue".to_string()
    } else if diff < MINUTE_MS {
        "In < 1 min".to_string()
    } else if diff < HOUR_MS {
        format!("In {} min", diff / MINUTE_MS)
    } else if diff < DAY_MS {
        format!("In {}h {}m", diff / HOUR_MS, (diff % HOUR_MS) / MINUTE_MS)
    } else {
        format!("In {}d", diff / DAY_MS)
    }
}

pub const ACTIVE_AGE_MS: u64 = 60_000;
pub const COMPLETED_AGE_MS: u64 = 300_000;

/// Session age to mission status. There is no liveness signal from the
/// gateway; age is the only proxy.
pub fn classify_mission_status(age_ms: u64) -> MissionStatus {
    if age_ms < ACTIVE_AGE_MS {
        MissionStatus::Active
    } else if age_ms < COMPLETED_AGE_MS {
        MissionStatus::Completed
    } else {
        MissionStatus::Queued
    }
}

fn parse_clock_part(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Parses `ps` elapsed time (`D-HH:MM:SS`, `HH:MM:SS` or `MM:SS`) into seconds.
pub fn parse_elapsed(text: &str) -> Option<u64> {
    let text = text.trim();
    let (days, clock) = match text.split_once('-') {
        Some((days, clock)) => (parse_clock_part(days)?, clock),
        None => (0, text),
    };

    let fields = clock
        .split(':')
        .map(parse_clock_part)
        .collect::<Option<Vec<u64>>>()?;
    let (hours, minutes, seconds) = match fields.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] if days == 0 => (0, *m, *s),
        _ => return None,
    };
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    days.checked_mul(86_400)?
        .checked_add(hours.checked_mul(3_600)?)?
        .checked_add(minutes * 60 + seconds)
}

pub fn format_uptime(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;
    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}
