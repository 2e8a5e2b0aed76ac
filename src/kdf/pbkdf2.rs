//! PBKDF2 (RFC 8018) over HMAC of any [`Hasher`]

use super::hmac::Hmac;
use crate::config::HashAlgorithm;
use crate::encoding::to_hex;
use crate::engine::Registry;
use crate::error::{HashError, Result};
use crate::hash::{create_hasher, Hasher};

fn validate(iterations: u32, key_length: usize, digest_size: usize) -> Result<()> {
    if iterations == 0 {
        return Err(HashError::validation("iterations", "must be at least 1"));
    }
    if key_length == 0 {
        return Err(HashError::validation("key_length", "must be at least 1"));
    }
    let max = u64::from(u32::MAX) * digest_size as u64;
    if key_length as u64 > max {
        return Err(HashError::validation(
            "key_length",
            format!("must not exceed {} bytes", max),
        ));
    }
    Ok(())
}

/// Derive `key_length` bytes with HMAC over `hasher`
pub fn pbkdf2_with<H: Hasher>(
    hasher: H,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    key_length: usize,
) -> Result<Vec<u8>> {
    validate(iterations, key_length, hasher.digest_size())?;

    let mut mac = Hmac::new(hasher, password)?;
    let digest_size = mac.digest_size();
    let mut derived = Vec::with_capacity(key_length);
    let mut block_input = Vec::with_capacity(salt.len() + 4);

    for index in 1..=key_length.div_ceil(digest_size) as u32 {
        block_input.clear();
        block_input.extend_from_slice(salt);
        block_input.extend_from_slice(&index.to_be_bytes());

        mac.init()?;
        mac.update(&block_input)?;
        let mut u = mac.digest()?;
        let mut t = u.clone();

        for _ in 1..iterations {
            mac.init()?;
            mac.update(&u)?;
            u = mac.digest()?;
            t.iter_mut().zip(&u).for_each(|(t, u)| *t ^= u);
        }

        let take = (key_length - derived.len()).min(digest_size);
        derived.extend_from_slice(&t[..take]);
    }

    Ok(derived)
}

/// Derive a key with PBKDF2-HMAC-`algorithm` on a fresh hasher
pub async fn pbkdf2_bytes(
    registry: &Registry,
    algorithm: HashAlgorithm,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    key_length: usize,
) -> Result<Vec<u8>> {
    validate(iterations, key_length, algorithm.output_size())?;
    tracing::trace!(
        "PBKDF2-HMAC-{} with {} iterations, {} byte key",
        algorithm.name(),
        iterations,
        key_length
    );

    let hasher = create_hasher(registry, algorithm).await?;
    pbkdf2_with(hasher, password, salt, iterations, key_length)
}

/// PBKDF2-HMAC-`algorithm` as hex, using the global registry
pub async fn pbkdf2(
    algorithm: HashAlgorithm,
    password: impl AsRef<[u8]>,
    salt: impl AsRef<[u8]>,
    iterations: u32,
    key_length: usize,
) -> Result<String> {
    let key = pbkdf2_bytes(
        Registry::global()?,
        algorithm,
        password.as_ref(),
        salt.as_ref(),
        iterations,
        key_length,
    )
    .await?;
    Ok(to_hex(&key))
}
