//! Job registry and the two correlation passes.
//!
//! The registry is owned by a single pipeline run. Pass 1 ([`JobRegistry::seed`])
//! creates a record per allocation row. Pass 2 ([`JobRegistry::enrich`]) joins
//! the job-name rows by job id, rejects rows whose permitted group the viewer
//! is not in, and decodes the rest. Records that are rejected, fail to decode,
//! or never appear in pass 2 are removed, so after pass 2 every record holds a
//! decoded payload.

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::materialize::{session_db_path, session_output_path};
use crate::payload::{self, keys::KeyMaterial};
use crate::scheduler::{AllocationRow, NameRow};
use crate::types::{DecodedJob, JobRecord, JobStatus, Viewer};

/// Connection key carrying the job id.
pub const CONNECTION_JOB_ID_KEY: &str = "jobid";
/// Connection key carrying the app name.
pub const CONNECTION_APP_NAME_KEY: &str = "mt_appname";

/// Counts from pass 2.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    /// Rows decoded successfully.
    pub decoded: usize,
    /// Rows dropped because the viewer is not in the permitted group.
    pub rejected: usize,
    /// Rows dropped because the payload failed to decode.
    pub failed: usize,
    /// Rows for job ids the registry does not hold.
    pub unmatched: usize,
    /// Records dropped because no row arrived for them.
    pub missing: usize,
}

/// Records keyed by job id, in discovery order.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct JobRegistry {
    jobs: IndexMap<String, JobRecord>,
}

impl JobRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass 1: one record per allocation row. A repeated id replaces the
    /// earlier record. Rows without a job id are skipped.
    pub fn seed<I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = AllocationRow>,
    {
        for row in rows {
            if row.job_id.is_empty() {
                debug!("skipping allocation row without a job id");
                continue;
            }
            let record = JobRecord::discovered(row.job_id.clone(), row.submitter, row.cluster);
            let _ = self.jobs.insert(row.job_id, record);
        }
    }

    /// Ids currently held, in discovery order.
    pub fn job_ids(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    /// Pass 2: correlate name rows, authorize for decode, and decode.
    pub fn enrich<I>(&mut self, rows: I, viewer: &Viewer, dataroot: &Path) -> EnrichSummary
    where
        I: IntoIterator<Item = NameRow>,
    {
        let mut summary = EnrichSummary::default();

        for row in rows {
            let Some(record) = self.jobs.get_mut(&row.job_id) else {
                debug!(job_id = %row.job_id, "ignoring name row for unknown job");
                summary.unmatched += 1;
                continue;
            };

            if !viewer.in_group(&row.permitted_group) {
                debug!(job_id = %row.job_id, group = %row.permitted_group, "viewer not in permitted group");
                let _ = self.jobs.shift_remove(&row.job_id);
                summary.rejected += 1;
                continue;
            }

            let material = record
                .key_material
                .take()
                .unwrap_or_else(|| KeyMaterial::derive(&record.job_id, &record.submitter));

            match payload::decode(&row.message, &material) {
                Ok(decoded) => {
                    let mut connection = decoded.connection;
                    connection.insert(CONNECTION_JOB_ID_KEY, row.job_id.clone());
                    connection.insert(CONNECTION_APP_NAME_KEY, decoded.accounting.mta.clone());

                    let raw_message = row.raw_name();
                    record.decoded = Some(DecodedJob {
                        db_path: session_db_path(dataroot, &decoded.accounting.mti),
                        output_path: session_output_path(
                            dataroot,
                            &decoded.accounting.mtd,
                            &decoded.accounting.mti,
                        ),
                        accounting: decoded.accounting,
                        connection,
                        message_size: raw_message.len(),
                        raw_message,
                    });
                    record.status = JobStatus::Decoded;
                    summary.decoded += 1;
                }
                Err(e) => {
                    warn!(job_id = %row.job_id, kind = e.kind(), error = %e, "dropping multitenant job: payload failed to decode");
                    let _ = self.jobs.shift_remove(&row.job_id);
                    summary.failed += 1;
                }
            }
        }

        let before = self.jobs.len();
        self.jobs.retain(|job_id, record| {
            let keep = record.decoded.is_some();
            if !keep {
                debug!(%job_id, "dropping job with no name row");
            }
            keep
        });
        summary.missing = before - self.jobs.len();

        summary
    }

    /// Look up a record.
    pub fn get(&self, job_id: &str) -> Option<&JobRecord> {
        self.jobs.get(job_id)
    }

    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut JobRecord> {
        self.jobs.values_mut()
    }

    /// Iterate `(job_id, record)` in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &JobRecord)> {
        self.jobs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether `job_id` is held.
    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
