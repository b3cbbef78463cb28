//! Real scheduler runner using `tokio::process::Command`.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use super::{CommandOutput, SchedulerRunner};
use crate::errors::SchedulerError;

/// Subprocess execution backed by `tokio::process::Command`.
///
/// Arguments are passed directly to the program; no shell is involved.
pub struct TokioSchedulerRunner;

#[async_trait]
impl SchedulerRunner for TokioSchedulerRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, SchedulerError> {
        let start = Instant::now();
        debug!(program, ?args, "spawning scheduler query");

        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| SchedulerError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(program, exit_code, duration_ms, "scheduler query completed");

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        })
    }
}
