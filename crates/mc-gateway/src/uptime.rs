use crate::runner::CommandRunner;
use async_trait::async_trait;
use mc_classify::parse_elapsed;
use mc_core::FetchError;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_UPTIME_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PROCESS_PATTERNS: &[&str] = &["openclaw", "gateway"];

/// Reports how long the backend process has been running, in seconds.
#[async_trait]
pub trait UptimeProbe: Send + Sync {
    async fn backend_uptime(&self) -> Result<u64, FetchError>;
}

/// Scrapes `ps -eo pid,etime,comm` for the first process whose line mentions
/// one of the patterns.
pub struct ProcessTableUptime {
    runner: Arc<dyn CommandRunner>,
    patterns: Vec<String>,
    timeout: Duration,
}

impl ProcessTableUptime {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            patterns: DEFAULT_PROCESS_PATTERNS
                .iter()
                .map(|pattern| pattern.to_string())
                .collect(),
            timeout: DEFAULT_UPTIME_TIMEOUT,
        }
    }

    pub fn with_patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl UptimeProbe for ProcessTableUptime {
    async fn backend_uptime(&self) -> Result<u64, FetchError> {
        let table = self
            .runner
            .run("ps", &["-eo", "pid,etime,comm"], self.timeout)
            .await?;
        let line = find_process_line(&table, &self.patterns)
            .ok_or_else(|| FetchError::unavailable("gateway process not found"))?;
        let etime = line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| FetchError::malformed(format!("no elapsed column in {line:?}")))?;
        parse_elapsed(etime)
            .ok_or_else(|| FetchError::malformed(format!("unparseable elapsed time {etime:?}")))
    }
}

fn find_process_line<'a>(table: &'a str, patterns: &[String]) -> Option<&'a str> {
    table.lines().skip(1).find(|line| {
        let lowered = line.to_lowercase();
        patterns.iter().any(|pattern| lowered.contains(pattern.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTable(Result<String, FetchError>);

    #[async_trait]
    impl CommandRunner for FixedTable {
        async fn run(
            &self,
            _program: &str,
            _args: &[&str],
            _timeout: Duration,
        ) -> Result<String, FetchError> {
            self.0.clone()
        }
    }

    fn probe(table: &str) -> ProcessTableUptime {
        ProcessTableUptime::new(Arc::new(FixedTable(Ok(table.to_string()))))
    }

    #[tokio::test]
    async fn finds_first_matching_process() {
        let table = "  PID     ELAPSED COMMAND\n    1  9-01:00:00 init\n  812    01:02:03 openclaw-gateway\n  900       00:05 gateway\n";
        assert_eq!(probe(table).backend_uptime().await.expect("uptime"), 3723);
    }

    #[tokio::test]
    async fn header_line_never_matches() {
        let table = "  PID ELAPSED COMMAND gateway\n    1  00:10 init\n";
        let err = probe(table).backend_uptime().await.expect_err("missing");
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn bad_elapsed_text_is_malformed() {
        let table = "PID ELAPSED COMMAND\n 44 soon openclaw\n";
        let err = probe(table).backend_uptime().await.expect_err("bad etime");
        assert_eq!(err.kind, mc_core::FetchErrorKind::Malformed);
    }

    #[tokio::test]
    async fn runner_failure_propagates() {
        let probe = ProcessTableUptime::new(Arc::new(FixedTable(Err(FetchError::unavailable(
            "ps missing",
        )))));
        let err = probe.backend_uptime().await.expect_err("runner error");
        assert_eq!(err.message, "ps missing");
    }
}
