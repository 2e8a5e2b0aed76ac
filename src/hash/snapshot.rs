//! Serialized hasher state
//!
//! ```text
//! [magic "HBSS"][u16 version][u32 module fingerprint][u16 digest size]
//! [u8 byte order][u32 state length][state][8 bytes SHA-256 of the above]
//! ```
//!
//! All integers are little-endian. The trailing integrity bytes make any
//! single-byte change detectable, not just changes of length.

use crate::error::{HashError, Result};
use sha2::{Digest, Sha256};

/// Magic bytes opening every snapshot
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"HBSS";
/// Current snapshot format version
pub const SNAPSHOT_VERSION: u16 = 1;

const BYTE_ORDER_LE: u8 = 1;
const HEADER_LEN: usize = 17;
const INTEGRITY_LEN: usize = 8;

/// What a snapshot must describe to be loadable into a given engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SnapshotTarget {
    pub fingerprint: u32,
    pub digest_size: usize,
    pub state_size: usize,
}

fn integrity(prefix: &[u8]) -> [u8; INTEGRITY_LEN] {
    let digest = Sha256::digest(prefix);
    let mut out = [0u8; INTEGRITY_LEN];
    out.copy_from_slice(&digest[..INTEGRITY_LEN]);
    out
}

fn malformed(message: impl Into<String>) -> HashError {
    HashError::format("hasher snapshot", message)
}

/// Serialize `state` for `target`
pub(crate) fn encode(target: &SnapshotTarget, state: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(HEADER_LEN + state.len() + INTEGRITY_LEN);
    blob.extend_from_slice(&SNAPSHOT_MAGIC);
    blob.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    blob.extend_from_slice(&target.fingerprint.to_le_bytes());
    blob.extend_from_slice(&(target.digest_size as u16).to_le_bytes());
    blob.push(BYTE_ORDER_LE);
    blob.extend_from_slice(&(state.len() as u32).to_le_bytes());
    blob.extend_from_slice(state);
    let check = integrity(&blob);
    blob.extend_from_slice(&check);
    blob
}

/// Validate every byte of `blob` against `target` and return the state it carries
pub(crate) fn decode<'a>(blob: &'a [u8], target: &SnapshotTarget) -> Result<&'a [u8]> {
    let expected_len = HEADER_LEN + target.state_size + INTEGRITY_LEN;
    if blob.len() != expected_len {
        return Err(malformed(format!(
            "expected {} bytes, got {}",
            expected_len,
            blob.len()
        )));
    }
    if blob[..4] != SNAPSHOT_MAGIC {
        return Err(malformed("bad magic"));
    }

    let version = u16::from_le_bytes([blob[4], blob[5]]);
    if version != SNAPSHOT_VERSION {
        return Err(malformed(format!("unsupported version {}", version)));
    }

    let (body, check) = blob.split_at(blob.len() - INTEGRITY_LEN);
    if integrity(body).as_slice() != check {
        return Err(malformed("integrity check failed"));
    }

    let fingerprint = u32::from_le_bytes([blob[6], blob[7], blob[8], blob[9]]);
    if fingerprint != target.fingerprint {
        return Err(malformed(format!(
            "saved by module {:#010x}, loading into {:#010x}",
            fingerprint, target.fingerprint
        )));
    }

    let digest_size = u16::from_le_bytes([blob[10], blob[11]]) as usize;
    if digest_size != target.digest_size {
        return Err(malformed(format!(
            "digest size {} does not match {}",
            digest_size, target.digest_size
        )));
    }

    if blob[12] != BYTE_ORDER_LE {
        return Err(malformed(format!("unknown byte order tag {}", blob[12])));
    }

    let state_len = u32::from_le_bytes([blob[13], blob[14], blob[15], blob[16]]) as usize;
    if state_len != target.state_size {
        return Err(malformed(format!(
            "state length {} does not match {}",
            state_len, target.state_size
        )));
    }

    Ok(&body[HEADER_LEN..])
}
