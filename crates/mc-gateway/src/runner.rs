use async_trait::async_trait;
use mc_core::FetchError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const STDERR_EXCERPT_CHARS: usize = 400;

/// Runs an external program and returns its stdout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str], timeout: Duration)
        -> Result<String, FetchError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<String, FetchError> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let label = format!("{program} {}", args.join(" "));
        let output = match tokio::time::timeout(timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(FetchError::unavailable(format!("spawn {label}: {err}")));
            }
            Err(_) => return Err(FetchError::timed_out(&label, timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT_CHARS).collect();
            return Err(FetchError::unavailable(format!(
                "{label} exited with {}: {excerpt}",
                output
                    .status
                    .code()
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "signal".to_string())
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|err| FetchError::malformed(format!("{label} wrote non-UTF-8 output: {err}")))
    }
}
