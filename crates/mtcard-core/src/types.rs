//! Typed records for the multitenant pipeline.
//!
//! - [`Viewer`]: identity of the user loading the dashboard
//! - [`Accounting`] / [`Connection`]: the two decoded payload segments
//! - [`JobRecord`]: one scheduler job as it moves through the pipeline
//! - [`JobStatus`]: where a retained record ended up

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::errors::{DecodeError, Segment};
use crate::payload::keys::KeyMaterial;

/// Sharing mode value marking a session as a shareable card.
pub const CARD_MODE: &str = "card";

// ─────────────────────────────────────────────────────────────────────────────
// Viewer
// ─────────────────────────────────────────────────────────────────────────────

/// The user the pipeline runs on behalf of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Viewer {
    /// Numeric user id.
    pub uid: u32,
    /// Login name.
    pub name: String,
    /// POSIX group names the user belongs to.
    pub groups: BTreeSet<String>,
}

impl Viewer {
    /// Create a viewer.
    pub fn new<I, S>(uid: u32, name: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uid,
            name: name.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the viewer belongs to `group`.
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload segments
// ─────────────────────────────────────────────────────────────────────────────

/// Accept a JSON string, number or boolean and keep it as a string.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, number or boolean, got {other}"
        ))),
    }
}

/// Accounting segment of a decoded payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Accounting {
    /// Session instance id.
    #[serde(deserialize_with = "scalar_string")]
    pub mti: String,
    /// Token, i.e. the batch-connect app directory name.
    #[serde(deserialize_with = "scalar_string")]
    pub mtd: String,
    /// Human-readable app name.
    #[serde(deserialize_with = "scalar_string")]
    pub mta: String,
    /// Comma-separated uids allowed to receive the card.
    #[serde(deserialize_with = "scalar_string")]
    pub mtu: String,
    /// Sharing mode.
    #[serde(deserialize_with = "scalar_string")]
    pub mtm: String,
    /// Fields this version does not interpret.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Accounting {
    /// Build from a parsed JSON object, enforcing the schema.
    ///
    /// `mti` and `mtd` become path components under the dataroot, so each must
    /// be a single non-empty component.
    pub fn from_map(map: Map<String, Value>) -> Result<Self, DecodeError> {
        let accounting: Self =
            serde_json::from_value(Value::Object(map)).map_err(|source| DecodeError::Schema {
                segment: Segment::Accounting,
                source,
            })?;
        validate_component("mti", &accounting.mti)?;
        validate_component("mtd", &accounting.mtd)?;
        Ok(accounting)
    }

    /// Whether the sharing mode is card mode.
    pub fn is_card_mode(&self) -> bool {
        self.mtm == CARD_MODE
    }

    /// Uids listed in `mtu`, trimmed, empties skipped.
    pub fn permitted_uids(&self) -> impl Iterator<Item = &str> {
        self.mtu.split(',').map(str::trim).filter(|u| !u.is_empty())
    }

    /// Whether `uid` appears in `mtu`.
    pub fn permits_uid(&self, uid: u32) -> bool {
        let uid = uid.to_string();
        self.permitted_uids().any(|u| u == uid)
    }
}

fn validate_component(field: &'static str, value: &str) -> Result<(), DecodeError> {
    let usable = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '\0']);
    if usable {
        Ok(())
    } else {
        Err(DecodeError::InvalidField {
            field,
            value: value.to_string(),
        })
    }
}

/// Connection segment of a decoded payload: ordered flat key/value pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Connection(IndexMap<String, String>);

impl Connection {
    /// Build from a parsed JSON object, keeping key order.
    ///
    /// Scalars become their plain text, `null` becomes empty, and nested
    /// values are kept as compact JSON.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(
            map.into_iter()
                .map(|(key, value)| {
                    let text = match value {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (key, text)
                })
                .collect(),
        )
    }

    /// Insert or replace an entry. Replacing keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.0.insert(key.into(), value.into());
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as `key: value` lines with a trailing newline.
    pub fn to_key_value_text(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.iter() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
        }
        out.push('\n');
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Job records
// ─────────────────────────────────────────────────────────────────────────────

/// Why a decoded job was not materialized for this viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IneligibleReason {
    /// The job never decoded.
    NotDecoded,
    /// `mtm` is not card mode.
    NotCardMode,
    /// The viewer's uid is not in `mtu`.
    ViewerNotListed,
    /// The viewer submitted the job.
    ViewerIsSubmitter,
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotDecoded => "payload not decoded",
            Self::NotCardMode => "sharing mode is not card",
            Self::ViewerNotListed => "viewer not in permitted users",
            Self::ViewerIsSubmitter => "viewer submitted the job",
        };
        f.write_str(text)
    }
}

/// Where a record stands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum JobStatus {
    /// Seen by the allocations query, not yet decoded.
    Discovered,
    /// Payload decoded; materialization not yet considered.
    Decoded,
    /// Decoded but not for this viewer.
    Ineligible {
        /// Failed condition.
        reason: IneligibleReason,
    },
    /// Materialization ran; each flag says whether that artifact was created now.
    Materialized {
        /// Session descriptor created by this run.
        session_written: bool,
        /// Connection descriptor created by this run.
        connection_written: bool,
    },
    /// Writing artifacts failed.
    MaterializeFailed {
        /// Rendered error.
        error: String,
    },
}

/// Everything recovered from a job's name payload.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedJob {
    /// Accounting segment.
    pub accounting: Accounting,
    /// Connection segment, with `jobid` and `mt_appname` injected.
    pub connection: Connection,
    /// Session descriptor path.
    pub db_path: PathBuf,
    /// Session output directory.
    pub output_path: PathBuf,
    /// `legacy|group|base64` as read from the scheduler.
    pub raw_message: String,
    /// Byte length of `raw_message`.
    pub message_size: usize,
}

/// One scheduler job.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Scheduler job id.
    pub job_id: String,
    /// Submitting user.
    pub submitter: String,
    /// Cluster name.
    pub cluster: String,
    /// Key/IV derived at discovery; cleared once decoding is attempted.
    #[serde(skip)]
    pub(crate) key_material: Option<KeyMaterial>,
    /// Decoded payload, if decoding succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded: Option<DecodedJob>,
    /// Current state.
    pub status: JobStatus,
}

impl JobRecord {
    /// New record from the allocations query, with key material derived.
    pub fn discovered(
        job_id: impl Into<String>,
        submitter: impl Into<String>,
        cluster: impl Into<String>,
    ) -> Self {
        let job_id = job_id.into();
        let submitter = submitter.into();
        let key_material = Some(KeyMaterial::derive(&job_id, &submitter));
        Self {
            job_id,
            submitter,
            cluster: cluster.into(),
            key_material,
            decoded: None,
            status: JobStatus::Discovered,
        }
    }

    /// Whether ephemeral key material is still attached.
    pub fn has_key_material(&self) -> bool {
        self.key_material.is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
