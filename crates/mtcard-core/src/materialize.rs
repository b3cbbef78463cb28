//! Session descriptor and connection descriptor writes.
//!
//! Both artifacts are created only if absent, using exclusive-create
//! primitives so concurrent runs for different viewers cannot clobber each
//! other. The session descriptor is guarded at file granularity; the
//! connection descriptor at directory granularity: an existing output
//! directory is left alone even if `connection.yml` inside it is missing.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::MaterializeError;
use crate::types::{DecodedJob, JobRecord};

/// File written inside the session output directory.
pub const CONNECTION_FILE: &str = "connection.yml";

/// Session script type recorded in every descriptor.
pub const SCRIPT_TYPE: &str = "basic";

/// `{dataroot}/batch_connect/db/{mti}`.
pub fn session_db_path(dataroot: &Path, mti: &str) -> PathBuf {
    dataroot.join("batch_connect").join("db").join(mti)
}

/// `{dataroot}/batch_connect/{mtd}/output/{mti}`.
pub fn session_output_path(dataroot: &Path, mtd: &str, mti: &str) -> PathBuf {
    dataroot
        .join("batch_connect")
        .join(mtd)
        .join("output")
        .join(mti)
}

/// JSON body of the session descriptor. Field order is the on-disk order.
#[derive(Debug, Serialize)]
pub struct SessionDescriptor<'a> {
    id: &'a str,
    cluster_id: &'a str,
    job_id: &'a str,
    created_at: i64,
    token: &'a str,
    title: String,
    script_type: &'static str,
    cache_completed: Option<bool>,
    completed_at: Option<i64>,
}

impl<'a> SessionDescriptor<'a> {
    /// Descriptor for `record`, stamped with `created_at` epoch seconds.
    pub fn new(record: &'a JobRecord, decoded: &'a DecodedJob, created_at: i64) -> Self {
        let accounting = &decoded.accounting;
        Self {
            id: &accounting.mti,
            cluster_id: &record.cluster,
            job_id: &record.job_id,
            created_at,
            token: &accounting.mtd,
            title: format!("{} from {} ", accounting.mta, record.submitter),
            script_type: SCRIPT_TYPE,
            cache_completed: None,
            completed_at: None,
        }
    }

    /// Single-line JSON, no trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// What a materialization call created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaterializeOutcome {
    /// The session descriptor was created by this call.
    pub session_written: bool,
    /// The output directory and connection descriptor were created by this call.
    pub connection_written: bool,
}

/// Write whichever artifacts for `record` do not yet exist.
///
/// The two writes are independent; an existing session descriptor does not
/// stop the connection descriptor from being written, and vice versa.
pub fn materialize(
    record: &JobRecord,
    decoded: &DecodedJob,
    created_at: i64,
) -> Result<MaterializeOutcome, MaterializeError> {
    let body = SessionDescriptor::new(record, decoded, created_at).to_json()?;
    let session_written = create_file_if_absent(&decoded.db_path, body.as_bytes())?;
    if session_written {
        info!(job_id = %record.job_id, path = %decoded.db_path.display(), "wrote session descriptor");
    } else {
        debug!(job_id = %record.job_id, path = %decoded.db_path.display(), "session descriptor exists");
    }

    let connection_written =
        create_output_dir_if_absent(&decoded.output_path, &decoded.connection.to_key_value_text())?;
    if connection_written {
        info!(job_id = %record.job_id, path = %decoded.output_path.display(), "wrote connection descriptor");
    } else {
        debug!(job_id = %record.job_id, path = %decoded.output_path.display(), "output directory exists");
    }

    Ok(MaterializeOutcome {
        session_written,
        connection_written,
    })
}

fn create_parent(path: &Path) -> Result<(), MaterializeError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| MaterializeError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Exclusively create `path` with `contents`. `Ok(false)` if it already existed.
fn create_file_if_absent(path: &Path, contents: &[u8]) -> Result<bool, MaterializeError> {
    create_parent(path)?;

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(source) => {
            return Err(MaterializeError::Write {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if let Err(source) = file.write_all(contents).and_then(|()| file.sync_all()) {
        drop(file);
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove partial file");
        }
        return Err(MaterializeError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(true)
}

/// Exclusively create `dir` and write the connection descriptor inside it.
/// `Ok(false)` if the directory already existed.
fn create_output_dir_if_absent(dir: &Path, contents: &str) -> Result<bool, MaterializeError> {
    create_parent(dir)?;

    match fs::create_dir(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(source) => {
            return Err(MaterializeError::CreateDir {
                path: dir.to_path_buf(),
                source,
            });
        }
    }

    match create_file_if_absent(&dir.join(CONNECTION_FILE), contents.as_bytes()) {
        Ok(_) => Ok(true),
        Err(e) => {
            // leave no empty directory behind, or the next run would skip it
            if let Err(rm) = fs::remove_dir_all(dir) {
                warn!(path = %dir.display(), error = %rm, "failed to remove partial output directory");
            }
            Err(e)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
