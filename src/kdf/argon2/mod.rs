//! Argon2d, Argon2i and Argon2id (RFC 9106, version 1.3)
//!
//! The block array lives on the host; every compression `G` runs inside the
//! `argon2` primitive module through [`PrimitiveEngine::invoke`], and the
//! BLAKE2b calls of `H0` and `H'` go through ordinary BLAKE2b hashers.
//!
//! Memory smaller than `8 * parallelism` KiB is raised for the block count
//! only; `H0` and the encoded form keep the requested value.
//!
//! [`PrimitiveEngine::invoke`]: crate::engine::PrimitiveEngine::invoke

mod encoded;
mod memory;
mod params;
mod variable;

pub use encoded::EncodedHash;
pub use params::{
    Argon2Options, Argon2Request, Argon2Variant, OutputType, ARGON2_VERSION, MAX_PARALLELISM,
    MIN_HASH_LEN, MIN_SALT_LEN,
};

use crate::encoding::to_hex;
use crate::engine::Registry;
use crate::error::Result;
use memory::{BlockMatrix, BlockMixer, Geometry, BLOCK_SIZE};
use std::fmt;
use subtle::ConstantTimeEq;
use variable::VariableHash;

/// Result of [`Argon2Engine::hash`], shaped by [`OutputType`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argon2Output {
    /// Lowercase hex tag
    Hex(String),
    /// Raw tag bytes
    Binary(Vec<u8>),
    /// Encoded hash string
    Encoded(String),
}

impl Argon2Output {
    /// Text form, if this is a hex or encoded output
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Hex(text) | Self::Encoded(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Raw bytes, if this is a binary output
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl fmt::Display for Argon2Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex(text) | Self::Encoded(text) => f.write_str(text),
            Self::Binary(bytes) => f.write_str(&to_hex(bytes)),
        }
    }
}

/// Argon2 hashing and verification over a registry's primitive modules
#[derive(Debug, Clone)]
pub struct Argon2Engine {
    registry: Registry,
}

impl Argon2Engine {
    /// Engine drawing modules from `registry`
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Engine over the process-wide registry
    pub fn global() -> Result<Self> {
        Ok(Self::new(Registry::global()?.clone()))
    }

    /// Validate `options` against this engine's limits
    pub fn request(&self, variant: Argon2Variant, options: &Argon2Options) -> Result<Argon2Request> {
        Argon2Request::new(variant, options, self.registry.config())
    }

    /// Hash with `variant`, returning the shape chosen by `options.output_type`
    pub async fn hash(&self, variant: Argon2Variant, options: &Argon2Options) -> Result<Argon2Output> {
        let request = self.request(variant, options)?;
        let tag = self.compute(&request).await?;

        Ok(match request.output_type {
            OutputType::Hex => Argon2Output::Hex(to_hex(&tag)),
            OutputType::Binary => Argon2Output::Binary(tag),
            OutputType::Encoded => Argon2Output::Encoded(
                EncodedHash {
                    variant: request.variant,
                    memory_size: request.memory_size,
                    iterations: request.iterations,
                    parallelism: request.parallelism,
                    salt: request.salt.clone(),
                    hash: tag,
                }
                .encode(),
            ),
        })
    }

    /// Raw tag for a validated request
    pub async fn compute(&self, request: &Argon2Request) -> Result<Vec<u8>> {
        let geometry = Geometry::new(request);
        tracing::debug!(
            "{}: m={} KiB ({} blocks), t={}, p={}, {} byte tag",
            request.variant,
            request.memory_size,
            geometry.blocks,
            request.iterations,
            request.parallelism,
            request.hash_length
        );

        let engine = self.registry.instantiate("argon2", BLOCK_SIZE).await?;
        let mut mixer = BlockMixer::new(engine)?;
        let mut variable = VariableHash::new(&self.registry, request.hash_length()).await?;

        let h0 = variable.blake2b_512(&[initial_input(request).as_slice()])?;

        let mut matrix = BlockMatrix::new(geometry);
        let mut seed = [0u8; 72];
        seed[..64].copy_from_slice(&h0);
        for lane in 0..geometry.lanes {
            seed[68..].copy_from_slice(&lane.to_le_bytes());
            for column in 0..2u32 {
                seed[64..68].copy_from_slice(&column.to_le_bytes());
                variable.output(&[&seed[..]], matrix.lane_block_mut(lane, column))?;
            }
        }

        matrix.fill(&mut mixer)?;

        let mut tag = vec![0u8; request.hash_length()];
        variable.output(&[matrix.final_block().as_slice()], &mut tag)?;
        Ok(tag)
    }

    /// Check `password` against an encoded hash.
    ///
    /// Malformed strings and unsupported versions fail before any hashing;
    /// the tags are compared in constant time.
    pub async fn verify(&self, password: &[u8], encoded: &str, secret: Option<&[u8]>) -> Result<bool> {
        let parsed = EncodedHash::parse(encoded)?;
        let options = Argon2Options {
            password: password.to_vec(),
            salt: parsed.salt,
            secret: secret.map(<[u8]>::to_vec),
            iterations: parsed.iterations,
            parallelism: parsed.parallelism,
            memory_size: parsed.memory_size,
            hash_length: parsed.hash.len() as u32,
            output_type: OutputType::Binary,
        };
        let request = self.request(parsed.variant, &options)?;

        let tag = self.compute(&request).await?;
        Ok(tag.ct_eq(&parsed.hash).into())
    }
}

/// Parameter block hashed into `H0`
fn initial_input(request: &Argon2Request) -> Vec<u8> {
    let mut input = Vec::with_capacity(
        40 + request.password.len() + request.salt.len() + request.secret.len(),
    );
    for word in [
        request.parallelism,
        request.hash_length,
        request.memory_size,
        request.iterations,
        ARGON2_VERSION,
        request.variant.type_code(),
    ] {
        input.extend_from_slice(&word.to_le_bytes());
    }
    for field in [&request.password, &request.salt, &request.secret] {
        input.extend_from_slice(&(field.len() as u32).to_le_bytes());
        input.extend_from_slice(field);
    }
    // No associated data
    input.extend_from_slice(&0u32.to_le_bytes());
    input
}

/// Argon2d over the global registry
pub async fn argon2d(options: &Argon2Options) -> Result<Argon2Output> {
    Argon2Engine::global()?.hash(Argon2Variant::D, options).await
}

/// Argon2i over the global registry
pub async fn argon2i(options: &Argon2Options) -> Result<Argon2Output> {
    Argon2Engine::global()?.hash(Argon2Variant::I, options).await
}

/// Argon2id over the global registry
pub async fn argon2id(options: &Argon2Options) -> Result<Argon2Output> {
    Argon2Engine::global()?.hash(Argon2Variant::Id, options).await
}

/// Verify against an encoded hash over the global registry
pub async fn argon2_verify(
    password: impl AsRef<[u8]>,
    encoded: &str,
    secret: Option<&[u8]>,
) -> Result<bool> {
    Argon2Engine::global()?
        .verify(password.as_ref(), encoded, secret)
        .await
}
