//! End-to-end discovery run for one viewer.
//!
//! Query allocations, seed the registry, query job names, decode, then
//! materialize eligible jobs. Only scheduler failures abort a run; bad
//! payloads and unwritable directories are logged and recorded per job.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use mtcard_settings::MtSettings;
use tracing::{debug, info, warn};

use crate::authorize::check_eligibility;
use crate::errors::PipelineError;
use crate::materialize::materialize;
use crate::registry::JobRegistry;
use crate::scheduler::process::TokioSchedulerRunner;
use crate::scheduler::{SchedulerClient, SchedulerRunner};
use crate::types::{JobStatus, Viewer};

/// Discovers shared multitenant jobs and writes their session cards.
pub struct MultiTenant {
    scheduler: SchedulerClient,
    dataroot: PathBuf,
    enabled: bool,
}

impl MultiTenant {
    /// Pipeline over `runner`, configured from `settings`.
    pub fn new(runner: Arc<dyn SchedulerRunner>, settings: &MtSettings) -> Self {
        Self {
            scheduler: SchedulerClient::new(runner, settings.scheduler.clone()),
            dataroot: settings.resolve_dataroot(),
            enabled: settings.enabled,
        }
    }

    /// Pipeline that spawns the real scheduler binaries.
    pub fn from_settings(settings: &MtSettings) -> Self {
        Self::new(Arc::new(TokioSchedulerRunner), settings)
    }

    /// Replace the dataroot.
    #[must_use]
    pub fn with_dataroot(mut self, dataroot: impl Into<PathBuf>) -> Self {
        self.dataroot = dataroot.into();
        self
    }

    /// Effective dataroot.
    pub fn dataroot(&self) -> &Path {
        &self.dataroot
    }

    /// Whether the invocation gate is open.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run only if enabled; `Ok(None)` when the gate is closed.
    pub async fn run_if_enabled(
        &self,
        viewer: &Viewer,
    ) -> Result<Option<JobRegistry>, PipelineError> {
        if !self.enabled {
            debug!("multitenant discovery disabled");
            return Ok(None);
        }
        self.run(viewer).await.map(Some)
    }

    /// Run the full pipeline and return the resulting registry.
    pub async fn run(&self, viewer: &Viewer) -> Result<JobRegistry, PipelineError> {
        let started = Instant::now();
        info!(viewer = %viewer.name, uid = viewer.uid, "multitenant discovery started");

        let mut registry = JobRegistry::new();
        let allocations = self.scheduler.list_running_jobs().await?;
        if allocations.is_empty() {
            info!("no multitenant jobs running");
            return Ok(registry);
        }
        registry.seed(allocations);

        let names = self.scheduler.list_job_names(&registry.job_ids()).await?;
        let summary = registry.enrich(names, viewer, &self.dataroot);

        let now = chrono::Utc::now().timestamp();
        let materialized = materialize_all(&mut registry, viewer, now);

        info!(
            decoded = summary.decoded,
            rejected = summary.rejected,
            failed = summary.failed,
            missing = summary.missing,
            materialized,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "multitenant discovery finished"
        );
        Ok(registry)
    }
}

/// Materialize every eligible record, updating statuses. Returns how many
/// records had at least one artifact created.
pub fn materialize_all(registry: &mut JobRegistry, viewer: &Viewer, created_at: i64) -> usize {
    let mut written = 0;
    for record in registry.records_mut() {
        let status = match check_eligibility(record, viewer) {
            Err(reason) => {
                debug!(job_id = %record.job_id, %reason, "not materializing");
                JobStatus::Ineligible { reason }
            }
            Ok(decoded) => match materialize(record, decoded, created_at) {
                Ok(outcome) => {
                    if outcome.session_written || outcome.connection_written {
                        written += 1;
                    }
                    JobStatus::Materialized {
                        session_written: outcome.session_written,
                        connection_written: outcome.connection_written,
                    }
                }
                Err(e) => {
                    warn!(job_id = %record.job_id, error = %e, "failed to materialize session");
                    JobStatus::MaterializeFailed {
                        error: e.to_string(),
                    }
                }
            },
        };
        record.status = status;
    }
    written
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
