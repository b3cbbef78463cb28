//! Shared helpers for tests that drive the pipeline without a scheduler.
//!
//! - [`FakeScheduler`]: canned [`SchedulerRunner`] responses keyed by program
//! - [`sealed_name_row`]: a squeue output line carrying a real encrypted payload

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::SchedulerError;
use crate::payload::{self, keys::KeyMaterial};
use crate::scheduler::{CommandOutput, SchedulerRunner};

/// In-memory [`SchedulerRunner`].
///
/// Programs without a registered response fail as if the binary were missing.
/// Every invocation is recorded for later assertions.
#[derive(Default)]
pub struct FakeScheduler {
    responses: Mutex<HashMap<String, CommandOutput>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeScheduler {
    /// Empty fake; every program is "missing".
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: `program` succeeds with `stdout`.
    pub fn respond(self, program: impl Into<String>, stdout: impl Into<String>) -> Self {
        let _ = self
            .responses
            .lock()
            .insert(program.into(), CommandOutput::success(stdout));
        self
    }

    /// Builder: `program` exits with `code` and `stderr`.
    pub fn fail(self, program: impl Into<String>, code: i32, stderr: impl Into<String>) -> Self {
        let _ = self.responses.lock().insert(
            program.into(),
            CommandOutput {
                stdout: String::new(),
                stderr: stderr.into(),
                exit_code: code,
            },
        );
        self
    }

    /// Recorded `(program, args)` pairs, in call order.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().clone()
    }

    /// Recorded calls to `program`.
    pub fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .iter()
            .filter(|(p, _)| p == program)
            .map(|(_, args)| args.clone())
            .collect()
    }
}

#[async_trait]
impl SchedulerRunner for FakeScheduler {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, SchedulerError> {
        self.calls.lock().push((program.to_string(), args.to_vec()));
        self.responses
            .lock()
            .get(program)
            .cloned()
            .ok_or_else(|| SchedulerError::Spawn {
                program: program.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            })
    }
}

/// A `job_id|legacy|group|message` line whose message is `accounting` and
/// `connection` sealed with the key material for `job_id`/`submitter`.
pub fn sealed_name_row(
    job_id: &str,
    submitter: &str,
    group: &str,
    accounting: &str,
    connection: &str,
) -> std::io::Result<String> {
    let material = KeyMaterial::derive(job_id, submitter);
    let message = payload::encode(&material, accounting, connection)?;
    Ok(format!(
        "{job_id}|{}",
        payload::job_name("sys/dashboard/sys/multitenant", group, &message)
    ))
}
