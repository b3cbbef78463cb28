//! # mtcard-core
//!
//! Discovery of shared multitenant Slurm jobs and materialization of their
//! session cards for other viewers.
//!
//! A run for one viewer:
//!
//! - **Scheduler**: `sacct` lists running jobs tagged with the workload key;
//!   `squeue` returns each job's name, `legacy|group|payload`
//! - **Registry**: correlates both queries by job id, drops jobs whose group
//!   the viewer is not in, decodes the rest
//! - **Payload**: base64, AES-256-CBC keyed from job id and submitter, gzip,
//!   then two loosely quoted JSON segments (accounting and connection)
//! - **Authorization**: card mode, viewer uid listed, viewer is not the submitter
//! - **Materialization**: session descriptor and `connection.yml`, each
//!   created only if absent
//!
//! [`MultiTenant`] drives the whole run and returns the [`JobRegistry`].

#![deny(unsafe_code)]

pub mod authorize;
pub mod errors;
pub mod logging;
pub mod materialize;
pub mod payload;
pub mod pipeline;
pub mod registry;
pub mod scheduler;
pub mod testutil;
pub mod types;

pub use errors::{DecodeError, MaterializeError, PipelineError, SchedulerError, Segment};
pub use pipeline::MultiTenant;
pub use registry::{EnrichSummary, JobRegistry};
pub use scheduler::process::TokioSchedulerRunner;
pub use scheduler::{CommandOutput, SchedulerClient, SchedulerRunner};
pub use types::{
    Accounting, Connection, DecodedJob, IneligibleReason, JobRecord, JobStatus, Viewer,
};
