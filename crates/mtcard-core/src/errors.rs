//! Error types for the multitenant pipeline.
//!
//! - [`SchedulerError`]: a scheduler query could not be run or exited badly
//! - [`DecodeError`]: one job's embedded payload could not be recovered
//! - [`MaterializeError`]: one job's artifacts could not be written
//! - [`PipelineError`]: the only error that aborts a whole run
//!
//! Decode and materialize errors are per-job and never escape a run; they are
//! logged and recorded on the affected record instead.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Failure of an external scheduler query.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The binary could not be spawned (missing, not executable, ...).
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The binary ran but exited non-zero.
    #[error("{program} exited with status {code}: {stderr}")]
    NonZeroExit {
        /// Program that failed.
        program: String,
        /// Exit code (`-1` when killed by a signal).
        code: i32,
        /// Trimmed standard error.
        stderr: String,
    },
}

/// Which of the two decoded JSON segments an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    /// First segment: accounting record.
    Accounting,
    /// Second segment: connection parameters.
    Connection,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accounting => f.write_str("accounting"),
            Self::Connection => f.write_str("connection"),
        }
    }
}

/// Tagged reason a job's payload could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The message is not base64.
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decryption failed: wrong key/IV, truncated block, or bad padding.
    #[error("payload failed to decrypt")]
    Cipher,

    /// Plaintext is not a gzip stream.
    #[error("decrypted payload is not gzip data: {0}")]
    Decompress(#[source] std::io::Error),

    /// Decompressed bytes are not UTF-8.
    #[error("decompressed payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The message did not split into exactly two segments.
    #[error("expected 2 pipe-separated segments, found {found}")]
    Segments {
        /// Number of segments present.
        found: usize,
    },

    /// A segment is not valid JSON even after quote sanitizing.
    #[error("{segment} segment is not valid JSON: {source}")]
    Json {
        /// Offending segment.
        segment: Segment,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// A segment parsed, but not to an object.
    #[error("{segment} segment is not a JSON object")]
    NotAnObject {
        /// Offending segment.
        segment: Segment,
    },

    /// A segment is missing required fields or has wrongly typed ones.
    #[error("{segment} segment does not match schema: {source}")]
    Schema {
        /// Offending segment.
        segment: Segment,
        /// Deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// A field is present but cannot be used (e.g. would escape the dataroot).
    #[error("field {field} has unusable value {value:?}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Rejected value.
        value: String,
    },
}

impl DecodeError {
    /// Short stable label for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Base64(_) => "bad_base64",
            Self::Cipher => "cipher_error",
            Self::Decompress(_) => "decompress_error",
            Self::Utf8(_) => "bad_utf8",
            Self::Segments { .. } => "bad_segments",
            Self::Json { .. } | Self::NotAnObject { .. } => "bad_json",
            Self::Schema { .. } => "missing_field",
            Self::InvalidField { .. } => "invalid_field",
        }
    }
}

/// Failure writing one job's artifacts.
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// A directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A file could not be created or written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The session descriptor could not be serialized.
    #[error("failed to serialize session descriptor: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Error that aborts a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A scheduler query failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
