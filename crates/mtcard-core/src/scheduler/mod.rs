//! Read-only scheduler queries.
//!
//! Two queries feed the pipeline:
//!
//! - **allocations** (`sacct`): running jobs tagged with the workload key,
//!   across all users, as `job_id|submitter|cluster`
//! - **job names** (`squeue`): live names for exactly the discovered ids, as
//!   `job_id|legacy_name|permitted_group|message`
//!
//! Process execution sits behind [`SchedulerRunner`] so tests can substitute
//! canned output.

pub mod process;

use std::sync::Arc;

use async_trait::async_trait;
use mtcard_settings::{CommandFailurePolicy, SchedulerSettings};
use tracing::{debug, warn};

use crate::errors::SchedulerError;

pub use process::TokioSchedulerRunner;

/// Captured output of a finished scheduler command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code (`-1` when killed by a signal).
    pub exit_code: i32,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }
}

/// Runs a scheduler binary with arguments, without a shell.
#[async_trait]
pub trait SchedulerRunner: Send + Sync {
    /// Run `program` with `args` and capture its output.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, SchedulerError>;
}

/// One row of the allocations query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationRow {
    /// Scheduler job id.
    pub job_id: String,
    /// Submitting user.
    pub submitter: String,
    /// Cluster name.
    pub cluster: String,
}

/// One row of the job-name query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameRow {
    /// Scheduler job id.
    pub job_id: String,
    /// Name the job had before the payload was attached.
    pub legacy_name: String,
    /// Group whose members may decode the payload.
    pub permitted_group: String,
    /// Base64 payload.
    pub message: String,
}

impl NameRow {
    /// The job name as the scheduler reported it.
    pub fn raw_name(&self) -> String {
        crate::payload::job_name(&self.legacy_name, &self.permitted_group, &self.message)
    }
}

fn split_fields(line: &str) -> Vec<&str> {
    line.split('|').map(str::trim).collect()
}

fn field(fields: &[&str], idx: usize) -> String {
    fields.get(idx).copied().unwrap_or_default().to_string()
}

/// Parse allocations output. Blank lines are skipped; missing fields are empty.
pub fn parse_allocations(stdout: &str) -> Vec<AllocationRow> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let fields = split_fields(line);
            AllocationRow {
                job_id: field(&fields, 0),
                submitter: field(&fields, 1),
                cluster: field(&fields, 2),
            }
        })
        .collect()
}

/// Parse job-name output. Blank lines are skipped; missing fields are empty.
pub fn parse_job_names(stdout: &str) -> Vec<NameRow> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let fields = split_fields(line);
            NameRow {
                job_id: field(&fields, 0),
                legacy_name: field(&fields, 1),
                permitted_group: field(&fields, 2),
                message: field(&fields, 3),
            }
        })
        .collect()
}

/// Issues the two scheduler queries.
pub struct SchedulerClient {
    runner: Arc<dyn SchedulerRunner>,
    settings: SchedulerSettings,
}

impl SchedulerClient {
    /// Create a client.
    pub fn new(runner: Arc<dyn SchedulerRunner>, settings: SchedulerSettings) -> Self {
        Self { runner, settings }
    }

    /// Settings in use.
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Arguments for the allocations query.
    pub fn allocation_args(&self) -> Vec<String> {
        vec![
            "--allocations".into(),
            "--noheader".into(),
            "--parsable2".into(),
            "--state=RUNNING".into(),
            "--format=jobidraw,user,cluster".into(),
            "-a".into(),
            format!("--wckeys={}", self.settings.workload_key),
        ]
    }

    /// Arguments for the job-name query over `job_ids`.
    pub fn job_name_args(&self, job_ids: &[String]) -> Vec<String> {
        vec![
            "--noheader".into(),
            format!("--format=%i|%{}j", self.settings.name_width),
            "-j".into(),
            job_ids.join(","),
        ]
    }

    /// Running jobs carrying the workload key, for all users.
    pub async fn list_running_jobs(&self) -> Result<Vec<AllocationRow>, SchedulerError> {
        let args = self.allocation_args();
        let stdout = self.invoke(&self.settings.sacct_bin, &args).await?;
        let rows = parse_allocations(&stdout);
        debug!(rows = rows.len(), "allocations query returned");
        Ok(rows)
    }

    /// Names for exactly `job_ids`. An empty id list issues no query.
    pub async fn list_job_names(&self, job_ids: &[String]) -> Result<Vec<NameRow>, SchedulerError> {
        if job_ids.is_empty() {
            return Ok(Vec::new());
        }
        let args = self.job_name_args(job_ids);
        let stdout = self.invoke(&self.settings.squeue_bin, &args).await?;
        let rows = parse_job_names(&stdout);
        debug!(rows = rows.len(), requested = job_ids.len(), "job name query returned");
        Ok(rows)
    }

    async fn invoke(&self, program: &str, args: &[String]) -> Result<String, SchedulerError> {
        let output = self.runner.run(program, args).await?;
        if output.exit_code == 0 {
            return Ok(output.stdout);
        }
        let stderr = output.stderr.trim().to_string();
        match self.settings.on_command_failure {
            CommandFailurePolicy::Fatal => Err(SchedulerError::NonZeroExit {
                program: program.to_string(),
                code: output.exit_code,
                stderr,
            }),
            CommandFailurePolicy::Empty => {
                warn!(program, exit_code = output.exit_code, %stderr, "scheduler query failed, treating output as empty");
                Ok(String::new())
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeScheduler;
    use assert_matches::assert_matches;

    fn client(fake: &Arc<FakeScheduler>, settings: SchedulerSettings) -> SchedulerClient {
        SchedulerClient::new(fake.clone(), settings)
    }

    #[test]
    fn parses_allocation_rows() {
        let rows = parse_allocations("123|alice|c1\n\n 456 | bob |c2 \n");
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1],
            AllocationRow {
                job_id: "456".into(),
                submitter: "bob".into(),
                cluster: "c2".into()
            }
        );
    }

    #[test]
    fn short_allocation_rows_have_empty_fields() {
        let rows = parse_allocations("789\n");
        assert_eq!(rows[0].job_id, "789");
        assert_eq!(rows[0].submitter, "");
        assert_eq!(rows[0].cluster, "");
    }

    #[test]
    fn parses_padded_name_rows() {
        let rows = parse_job_names("123|sys/dashboard|grp1|QUJD          \n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].legacy_name, "sys/dashboard");
        assert_eq!(rows[0].permitted_group, "grp1");
        assert_eq!(rows[0].message, "QUJD");
        assert_eq!(rows[0].raw_name(), "sys/dashboard|grp1|QUJD");
    }

    #[test]
    fn allocation_args_carry_workload_key() {
        let fake = Arc::new(FakeScheduler::new());
        let settings = SchedulerSettings {
            workload_key: "shared".into(),
            ..SchedulerSettings::default()
        };
        let args = client(&fake, settings).allocation_args();
        assert_eq!(args.last().unwrap(), "--wckeys=shared");
        assert!(args.contains(&"--state=RUNNING".to_string()));
        assert!(args.contains(&"-a".to_string()));
    }

    #[test]
    fn job_name_args_are_scoped() {
        let fake = Arc::new(FakeScheduler::new());
        let args = client(&fake, SchedulerSettings::default())
            .job_name_args(&["1".into(), "2".into(), "3".into()]);
        assert_eq!(args, vec!["--noheader", "--format=%i|%1024j", "-j", "1,2,3"]);
    }

    #[tokio::test]
    async fn list_running_jobs_calls_sacct() {
        let fake = Arc::new(FakeScheduler::new().respond("/usr/bin/sacct", "123|alice|c1\n"));
        let rows = client(&fake, SchedulerSettings::default())
            .list_running_jobs()
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let calls = fake.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "/usr/bin/sacct");
    }

    #[tokio::test]
    async fn empty_id_list_issues_no_query() {
        let fake = Arc::new(FakeScheduler::new());
        let rows = client(&fake, SchedulerSettings::default())
            .list_job_names(&[])
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn non_zero_exit_is_fatal_by_default() {
        let fake = Arc::new(FakeScheduler::new().fail("/usr/bin/sacct", 1, "connection refused"));
        let err = client(&fake, SchedulerSettings::default())
            .list_running_jobs()
            .await
            .unwrap_err();
        assert_matches!(
            err,
            SchedulerError::NonZeroExit { code: 1, ref stderr, .. } if stderr == "connection refused"
        );
    }

    #[tokio::test]
    async fn non_zero_exit_can_be_softened() {
        let fake = Arc::new(FakeScheduler::new().fail("/usr/bin/squeue", 1, "invalid job id"));
        let settings = SchedulerSettings {
            on_command_failure: CommandFailurePolicy::Empty,
            ..SchedulerSettings::default()
        };
        let rows = client(&fake, settings)
            .list_job_names(&["9".into()])
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn spawn_failure_propagates_regardless_of_policy() {
        let fake = Arc::new(FakeScheduler::new());
        let settings = SchedulerSettings {
            on_command_failure: CommandFailurePolicy::Empty,
            ..SchedulerSettings::default()
        };
        let err = client(&fake, settings).list_running_jobs().await.unwrap_err();
        assert_matches!(err, SchedulerError::Spawn { .. });
    }
}
