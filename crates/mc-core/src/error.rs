use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorKind {
    /// Source could not be reached, exited non-zero, or timed out.
    Unavailable,
    /// Source answered but the payload failed to parse or validate.
    Malformed,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Unavailable => "unavailable",
            FetchErrorKind::Malformed => "malformed",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Unavailable, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Malformed, message)
    }

    pub fn timed_out(what: &str, limit: Duration) -> Self {
        Self::unavailable(format!("{what} timed out after {}ms", limit.as_millis()))
    }

    pub fn is_unavailable(&self) -> bool {
        self.kind == FetchErrorKind::Unavailable
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        Self::unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_message() {
        let err = FetchError::malformed("missing jobs array");
        assert_eq!(err.to_string(), "malformed: missing jobs array");
    }

    #[test]
    fn conversions_pick_expected_kind() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(FetchError::from(json_err).kind, FetchErrorKind::Malformed);

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such binary");
        let fetch_err = FetchError::from(io_err);
        assert!(fetch_err.is_unavailable());
        assert!(fetch_err.message.contains("no such binary"));
    }

    #[test]
    fn timed_out_reports_limit() {
        let err = FetchError::timed_out("cron list", Duration::from_secs(10));
        assert!(err.is_unavailable());
        assert_eq!(err.message, "cron list timed out after 10000ms");
    }
}
