//! Per-job key and IV derivation.
//!
//! The key seed is `job_id + submitter` and the IV seed is `job_id + job_id`.
//! Each seed is hex-encoded and right-padded with `0` nibbles to the cipher's
//! width (64 hex chars for the 256-bit key, 32 for the 128-bit IV). Seeds
//! longer than the width are cut at the width. Zero nibbles after an
//! even-length hex string are zero bytes, so the binary form is simply the
//! seed bytes zero-extended (or cut) to 32/16 bytes.

use std::fmt;

/// Key width in bytes (AES-256).
pub const KEY_LEN: usize = 32;
/// IV width in bytes (one AES block).
pub const IV_LEN: usize = 16;
/// Key width in hex characters.
pub const KEY_HEX_LEN: usize = KEY_LEN * 2;
/// IV width in hex characters.
pub const IV_HEX_LEN: usize = IV_LEN * 2;

fn seed_block<const N: usize>(seed: &str) -> [u8; N] {
    let mut block = [0u8; N];
    let bytes = seed.as_bytes();
    let len = bytes.len().min(N);
    block[..len].copy_from_slice(&bytes[..len]);
    block
}

fn key_seed(job_id: &str, submitter: &str) -> String {
    format!("{job_id}{submitter}")
}

fn iv_seed(job_id: &str) -> String {
    format!("{job_id}{job_id}")
}

/// Padded hex form of the key seed; always [`KEY_HEX_LEN`] characters.
pub fn key_hex(job_id: &str, submitter: &str) -> String {
    hex::encode(seed_block::<KEY_LEN>(&key_seed(job_id, submitter)))
}

/// Padded hex form of the IV seed; always [`IV_HEX_LEN`] characters.
pub fn iv_hex(job_id: &str) -> String {
    hex::encode(seed_block::<IV_LEN>(&iv_seed(job_id)))
}

/// Derived key and IV for one job.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl KeyMaterial {
    /// Derive from the job's public metadata.
    pub fn derive(job_id: &str, submitter: &str) -> Self {
        Self {
            key: seed_block(&key_seed(job_id, submitter)),
            iv: seed_block(&iv_seed(job_id)),
        }
    }

    /// Key bytes.
    pub fn key(&self) -> [u8; KEY_LEN] {
        self.key
    }

    /// IV bytes.
    pub fn iv(&self) -> [u8; IV_LEN] {
        self.iv
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(..)")
    }
}
