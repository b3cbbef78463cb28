//! Recovery of the metadata payload embedded in a job name.
//!
//! A job name has the form `legacy|group|message`. `message` is produced as:
//!
//! ```text
//! base64( aes-256-cbc( gzip( accounting_json "|" connection_json ) ) )
//! ```
//!
//! with key/IV from [`keys::KeyMaterial::derive`]. [`decode`] reverses every
//! stage and reports the first failing stage as a [`DecodeError`];
//! [`encode`] is the exact inverse and is what producers (and `mtcard seal`)
//! use.

pub mod cipher;
pub mod compress;
pub mod keys;
pub mod sanitize;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::errors::{DecodeError, Segment};
use crate::types::{Accounting, Connection};

use keys::KeyMaterial;

/// Separator between the two JSON segments, and between job-name fields.
pub const SEGMENT_SEPARATOR: char = '|';

/// Standard alphabet; padding optional on decode, always written on encode.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Both segments of a decoded payload.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedPayload {
    /// Accounting segment.
    pub accounting: Accounting,
    /// Connection segment, exactly as sent.
    pub connection: Connection,
}

/// Decode a base64 message with the job's key material.
pub fn decode(message: &str, material: &KeyMaterial) -> Result<DecodedPayload, DecodeError> {
    let compact: String = message.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let ciphertext = BASE64.decode(compact)?;
    let compressed = cipher::decrypt(material, &ciphertext)?;
    let plaintext = compress::gunzip(&compressed).map_err(DecodeError::Decompress)?;
    let text = String::from_utf8(plaintext)?;

    let segments: Vec<&str> = text.trim().split(SEGMENT_SEPARATOR).collect();
    let [accounting, connection] = segments.as_slice() else {
        return Err(DecodeError::Segments {
            found: segments.len(),
        });
    };

    let accounting = Accounting::from_map(sanitize::parse_segment(
        accounting,
        Segment::Accounting,
    )?)?;
    let connection =
        Connection::from_map(sanitize::parse_segment(connection, Segment::Connection)?);

    Ok(DecodedPayload {
        accounting,
        connection,
    })
}

/// Produce the base64 message for the given segments.
///
/// The segments are joined verbatim; they must not themselves contain `|`.
pub fn encode(
    material: &KeyMaterial,
    accounting_json: &str,
    connection_json: &str,
) -> std::io::Result<String> {
    let plaintext = format!("{accounting_json}{SEGMENT_SEPARATOR}{connection_json}");
    let compressed = compress::gzip(plaintext.as_bytes())?;
    Ok(BASE64.encode(cipher::encrypt(material, &compressed)))
}

/// Assemble a full job name from its three fields.
pub fn job_name(legacy_name: &str, permitted_group: &str, message: &str) -> String {
    format!("{legacy_name}{SEGMENT_SEPARATOR}{permitted_group}{SEGMENT_SEPARATOR}{message}")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
