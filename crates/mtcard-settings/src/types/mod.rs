//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so an admin file may set any subset of fields; missing fields keep their
//! compiled default.

mod scheduler;

pub use scheduler::*;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Dataroot used when none is configured, relative to `$HOME`.
pub const DEFAULT_DATAROOT_SUFFIX: &str = "ondemand/data/sys/dashboard";

/// Root settings type for the multitenant initializer.
///
/// # JSON Format
///
/// ```json
/// {
///   "enabled": true,
///   "dataroot": "/home/bob/ondemand/data/sys/dashboard",
///   "scheduler": { "workloadKey": "multitenant", "onCommandFailure": "empty" },
///   "logging": { "level": "info" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MtSettings {
    /// Master switch. When false the pipeline never runs.
    pub enabled: bool,
    /// Base data root for session artifacts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataroot: Option<String>,
    /// Scheduler query settings.
    pub scheduler: SchedulerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl MtSettings {
    /// Resolve the effective dataroot.
    ///
    /// Falls back to `$HOME/ondemand/data/sys/dashboard`, the dashboard's own
    /// default, when no dataroot is configured.
    pub fn resolve_dataroot(&self) -> PathBuf {
        match self.dataroot.as_deref().filter(|d| !d.is_empty()) {
            Some(root) => PathBuf::from(root),
            None => {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(DEFAULT_DATAROOT_SUFFIX)
            }
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
