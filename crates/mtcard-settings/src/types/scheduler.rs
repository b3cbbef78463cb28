//! Scheduler query settings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SettingsError;

/// How a scheduler command that exits non-zero is treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandFailurePolicy {
    /// Abort the run with an error.
    #[default]
    Fatal,
    /// Log a warning and treat the command output as empty.
    Empty,
}

impl FromStr for CommandFailurePolicy {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fatal" => Ok(Self::Fatal),
            "empty" => Ok(Self::Empty),
            other => Err(SettingsError::InvalidValue(format!(
                "onCommandFailure must be 'fatal' or 'empty', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for CommandFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal => f.write_str("fatal"),
            Self::Empty => f.write_str("empty"),
        }
    }
}

/// Settings for the two scheduler queries.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerSettings {
    /// Workload classifier (`--wckeys`) tagging multitenant jobs.
    pub workload_key: String,
    /// Path to the accounting query binary.
    pub sacct_bin: String,
    /// Path to the live queue query binary.
    pub squeue_bin: String,
    /// Column width requested for the job name field.
    pub name_width: u16,
    /// Treatment of non-zero exits from either binary.
    pub on_command_failure: CommandFailurePolicy,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            workload_key: "multitenant".to_string(),
            sacct_bin: "/usr/bin/sacct".to_string(),
            squeue_bin: "/usr/bin/squeue".to_string(),
            name_width: 1024,
            on_command_failure: CommandFailurePolicy::Fatal,
        }
    }
}
