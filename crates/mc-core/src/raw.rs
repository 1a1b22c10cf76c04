//! Raw records as reported by the gateway CLI.
//!
//! Every field is optional on the wire. Missing or mistyped values fall back to
//! defaults so that schema drift in one field never rejects a whole listing;
//! only a missing top-level container counts as malformed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleListing {
    #[serde(deserialize_with = "lenient::required_vec")]
    pub jobs: Vec<RawScheduleEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RawScheduleEntry {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub agent_id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub enabled: bool,
    #[serde(deserialize_with = "lenient::i64")]
    pub created_at_ms: i64,
    #[serde(deserialize_with = "lenient::i64")]
    pub updated_at_ms: i64,
    #[serde(deserialize_with = "lenient::object")]
    pub schedule: RawSchedule,
    #[serde(deserialize_with = "lenient::string")]
    pub session_target: String,
    #[serde(deserialize_with = "lenient::string")]
    pub wake_mode: String,
    #[serde(deserialize_with = "lenient::object")]
    pub payload: RawJobPayload,
    #[serde(deserialize_with = "lenient::object")]
    pub delivery: RawDelivery,
    #[serde(deserialize_with = "lenient::object")]
    pub state: RawJobState,
}

impl RawScheduleEntry {
    pub fn next_run_at_ms(&self) -> Option<i64> {
        self.state.next_run_at_ms
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RawSchedule {
    #[serde(deserialize_with = "lenient::string")]
    pub kind: String,
    #[serde(deserialize_with = "lenient::string")]
    pub expr: String,
    #[serde(deserialize_with = "lenient::string")]
    pub tz: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RawJobPayload {
    #[serde(deserialize_with = "lenient::string")]
    pub kind: String,
    #[serde(deserialize_with = "lenient::string")]
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RawDelivery {
    #[serde(deserialize_with = "lenient::string")]
    pub mode: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RawJobState {
    #[serde(
        deserialize_with = "lenient::opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_run_at_ms: Option<i64>,
}

/// One entry of the gateway's recent-session sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSessionEntry {
    #[serde(deserialize_with = "lenient::string")]
    pub key: String,
    #[serde(deserialize_with = "lenient::i64")]
    pub updated_at: i64,
    #[serde(deserialize_with = "lenient::u64")]
    pub age: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RawSessionSummary {
    #[serde(deserialize_with = "lenient::u64")]
    pub count: u64,
    #[serde(deserialize_with = "lenient::vec")]
    pub recent: Vec<RawSessionEntry>,
}

/// Session portion of the health probe, as consumed by the session adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionListing {
    pub total: u64,
    pub entries: Vec<RawSessionEntry>,
}

impl From<RawSessionSummary> for SessionListing {
    fn from(summary: RawSessionSummary) -> Self {
        Self {
            total: summary.count,
            entries: summary.recent,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RawHealthRecord {
    #[serde(deserialize_with = "lenient::boolean")]
    pub ok: bool,
    #[serde(deserialize_with = "lenient::i64")]
    pub ts: i64,
    #[serde(deserialize_with = "lenient::u64")]
    pub duration_ms: u64,
    #[serde(deserialize_with = "lenient::map")]
    pub channels: BTreeMap<String, RawChannelState>,
    #[serde(deserialize_with = "lenient::vec")]
    pub agents: Vec<RawAgentEntry>,
    #[serde(deserialize_with = "lenient::object")]
    pub sessions: RawSessionSummary,
    #[serde(
        deserialize_with = "lenient::opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub heartbeat_seconds: Option<u64>,
    #[serde(
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_agent_id: Option<String>,
    #[serde(
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RawChannelState {
    #[serde(deserialize_with = "lenient::boolean")]
    pub configured: bool,
    #[serde(deserialize_with = "lenient::boolean")]
    pub running: bool,
    #[serde(
        deserialize_with = "lenient::opt_object",
        skip_serializing_if = "Option::is_none"
    )]
    pub probe: Option<RawChannelProbe>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RawChannelProbe {
    #[serde(deserialize_with = "lenient::boolean")]
    pub ok: bool,
    #[serde(
        deserialize_with = "lenient::opt_object",
        skip_serializing_if = "Option::is_none"
    )]
    pub bot: Option<RawBotIdentity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RawBotIdentity {
    #[serde(deserialize_with = "lenient::string")]
    pub username: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RawAgentEntry {
    #[serde(deserialize_with = "lenient::string")]
    pub agent_id: String,
    #[serde(deserialize_with = "lenient::boolean")]
    pub is_default: bool,
    #[serde(
        deserialize_with = "lenient::opt_object",
        skip_serializing_if = "Option::is_none"
    )]
    pub sessions: Option<RawSessionSummary>,
}

mod lenient {
    use serde::de::{DeserializeOwned, Error as _};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::BTreeMap;

    fn number_of(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        })
    }

    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn boolean<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Value::String(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
            _ => false,
        })
    }

    pub fn i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(number_of(&Value::deserialize(deserializer)?).unwrap_or(0))
    }

    pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(number_of(&Value::deserialize(deserializer)?))
    }

    pub fn u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(opt_u64(deserializer)?.unwrap_or(0))
    }

    pub fn opt_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(number_of(&Value::deserialize(deserializer)?).map(|v| v.max(0) as u64))
    }

    pub fn object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(serde_json::from_value(Value::deserialize(deserializer)?).unwrap_or_default())
    }

    pub fn opt_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(serde_json::from_value(Value::Object(map)).ok()),
            _ => Ok(None),
        }
    }

    /// Drops elements that do not parse instead of rejecting the whole list.
    pub fn vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(deserializer)? {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    pub fn required_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(deserializer)? {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect()),
            other => Err(D::Error::custom(format!(
                "expected an array, found {}",
                kind_name(&other)
            ))),
        }
    }

    pub fn map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        match Value::deserialize(deserializer)? {
            Value::Object(entries) => Ok(entries
                .into_iter()
                .filter_map(|(key, value)| serde_json::from_value(value).ok().map(|v| (key, v)))
                .collect()),
            _ => Ok(BTreeMap::new()),
        }
    }

    fn kind_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_listing_parses_full_job() {
        let listing: ScheduleListing = serde_json::from_str(
            r#"{"jobs":[{
                "id":"job-1","agentId":"main","name":"Nightcap Content Run","enabled":true,
                "createdAtMs":1700000000000,"updatedAtMs":1700000100000,
                "schedule":{"kind":"cron","expr":"0 22 * * *","tz":"America/New_York"},
                "sessionTarget":"isolated","wakeMode":"now",
                "payload":{"kind":"agentTurn","message":"find content"},
                "delivery":{"mode":"announce"},
                "state":{"nextRunAtMs":1700003600000}
            }]}"#,
        )
        .expect("parse listing");

        assert_eq!(listing.jobs.len(), 1);
        let job = &listing.jobs[0];
        assert_eq!(job.name, "Nightcap Content Run");
        assert!(job.enabled);
        assert_eq!(job.schedule.expr, "0 22 * * *");
        assert_eq!(job.schedule.tz, "America/New_York");
        assert_eq!(job.delivery.mode, "announce");
        assert_eq!(job.next_run_at_ms(), Some(1_700_003_600_000));
    }

    #[test]
    fn schedule_entry_defaults_missing_and_mistyped_fields() {
        let listing: ScheduleListing = serde_json::from_str(
            r#"{"jobs":[{"id":7,"name":"Backup","enabled":"true","schedule":{"expr":"0 * * * *"},"delivery":null,"state":"soon"}]}"#,
        )
        .expect("parse listing");

        let job = &listing.jobs[0];
        assert_eq!(job.id, "7");
        assert!(job.enabled);
        assert_eq!(job.schedule.tz, "");
        assert_eq!(job.delivery.mode, "");
        assert_eq!(job.next_run_at_ms(), None);
    }

    #[test]
    fn schedule_listing_skips_non_object_jobs() {
        let listing: ScheduleListing =
            serde_json::from_str(r#"{"jobs":["garbage",{"id":"a","name":"Sync"}]}"#)
                .expect("parse listing");
        assert_eq!(listing.jobs.len(), 1);
        assert_eq!(listing.jobs[0].name, "Sync");
    }

    #[test]
    fn schedule_listing_requires_jobs_array() {
        assert!(serde_json::from_str::<ScheduleListing>(r#"{"count":0}"#).is_err());
        assert!(serde_json::from_str::<ScheduleListing>(r#"{"jobs":null}"#).is_err());
    }

    #[test]
    fn health_record_tolerates_partial_payload() {
        let health: RawHealthRecord = serde_json::from_str(
            r#"{
                "ok": true, "ts": 1700000000000, "durationMs": 42,
                "channels": {
                    "discord": {"configured": true, "running": true, "probe": {"ok": true, "bot": {"username": "caleb"}}},
                    "telegram": {"configured": true, "running": false},
                    "broken": "nope"
                },
                "sessions": {"count": 3, "recent": [
                    {"key": "agent:main:main", "updatedAt": 1700000000000, "age": 1200},
                    {"key": 5}
                ]}
            }"#,
        )
        .expect("parse health");

        assert!(health.ok);
        assert_eq!(health.duration_ms, 42);
        assert_eq!(health.channels.len(), 2);
        let probe = health.channels["discord"].probe.as_ref().expect("probe");
        assert_eq!(probe.bot.as_ref().map(|b| b.username.as_str()), Some("caleb"));
        assert_eq!(health.sessions.count, 3);
        assert_eq!(health.sessions.recent.len(), 2);
        assert_eq!(health.sessions.recent[1].key, "5");
        assert!(health.agents.is_empty());
        assert_eq!(health.heartbeat_seconds, None);
        assert_eq!(health.default_agent_id, None);
    }

    #[test]
    fn negative_age_clamps_to_zero() {
        let entry: RawSessionEntry =
            serde_json::from_str(r#"{"key":"a:b","updatedAt":10,"age":-5}"#).expect("parse");
        assert_eq!(entry.age, 0);
    }
}
