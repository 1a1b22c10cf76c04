//! Source adapters for the OpenClaw gateway CLI.

use async_trait::async_trait;
use mc_core::{FetchError, SourceKind};
use std::sync::Arc;
use std::time::Duration;

pub mod adapters;
pub mod config_file;
pub mod runner;
pub mod uptime;

pub use adapters::{HealthAdapter, ScheduleAdapter, SessionAdapter};
pub use runner::{CommandRunner, TokioCommandRunner};
pub use uptime::{ProcessTableUptime, UptimeProbe};

pub const DEFAULT_GATEWAY_BIN: &str = "openclaw";
pub const DEFAULT_ADAPTER_TIMEOUT: Duration = Duration::from_secs(10);

/// One external data source. Implementations keep no state between calls and
/// report every failure as a `FetchError`.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    type Record: Send;

    fn source(&self) -> SourceKind;

    async fn fetch(&self) -> Result<Self::Record, FetchError>;
}

/// How to reach the gateway CLI.
#[derive(Clone)]
pub struct GatewayCli {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
}

impl GatewayCli {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run(&self, args: &[&str]) -> Result<String, FetchError> {
        self.runner.run(&self.program, args, self.timeout).await
    }
}

impl std::fmt::Debug for GatewayCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayCli")
            .field("program", &self.program)
            .field("timeout", &self.timeout)
            .finish()
    }
}
