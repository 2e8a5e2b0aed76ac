//! Argon2 parameters and their validation

use crate::config::RuntimeConfig;
use crate::error::{HashError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Argon2 version implemented here (1.3)
pub const ARGON2_VERSION: u32 = 0x13;

/// Shortest accepted salt in bytes
pub const MIN_SALT_LEN: usize = 8;

/// Shortest accepted tag in bytes
pub const MIN_HASH_LEN: u32 = 4;

/// Largest accepted degree of parallelism
pub const MAX_PARALLELISM: u32 = 0x00ff_ffff;

/// Argon2 flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Argon2Variant {
    /// Data-dependent addressing throughout
    D,
    /// Data-independent addressing throughout
    I,
    /// Data-independent for the first half of the first pass
    Id,
}

impl Argon2Variant {
    /// Type code mixed into H0 and the address blocks
    pub fn type_code(&self) -> u32 {
        match self {
            Self::D => 0,
            Self::I => 1,
            Self::Id => 2,
        }
    }

    /// Identifier used in encoded hashes
    pub fn name(&self) -> &'static str {
        match self {
            Self::D => "argon2d",
            Self::I => "argon2i",
            Self::Id => "argon2id",
        }
    }

    /// Whether block references come from address blocks at this position
    pub fn data_independent(&self, pass: u32, slice: u32) -> bool {
        match self {
            Self::D => false,
            Self::I => true,
            Self::Id => pass == 0 && slice < 2,
        }
    }
}

impl fmt::Display for Argon2Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Argon2Variant {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "argon2d" | "d" => Ok(Self::D),
            "argon2i" | "i" => Ok(Self::I),
            "argon2id" | "id" => Ok(Self::Id),
            _ => Err(HashError::validation("variant", format!("unknown Argon2 variant '{}'", s))),
        }
    }
}

/// Shape of the value returned by [`Argon2Engine::hash`](super::Argon2Engine::hash)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// Lowercase hex tag
    #[default]
    Hex,
    /// Raw tag bytes
    Binary,
    /// PHC-style `$argon2id$v=19$...` string
    Encoded,
}

impl FromStr for OutputType {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hex" => Ok(Self::Hex),
            "binary" => Ok(Self::Binary),
            "encoded" => Ok(Self::Encoded),
            _ => Err(HashError::validation(
                "output_type",
                format!("unsupported output type '{}', expected hex, binary or encoded", s),
            )),
        }
    }
}

/// Caller-facing Argon2 options
#[derive(Clone, PartialEq, Eq)]
pub struct Argon2Options {
    /// Password or message to hash
    pub password: Vec<u8>,
    /// Salt, at least 8 bytes
    pub salt: Vec<u8>,
    /// Optional secret for keyed hashing
    pub secret: Option<Vec<u8>>,
    /// Number of passes
    pub iterations: u32,
    /// Number of lanes
    pub parallelism: u32,
    /// Memory in KiB; raised to `8 * parallelism` blocks when smaller
    pub memory_size: u32,
    /// Tag length in bytes
    pub hash_length: u32,
    /// Output shape
    pub output_type: OutputType,
}

impl Argon2Options {
    /// Options with 3 passes, 1 lane, 64 MiB and a 32-byte hex tag
    pub fn new(password: impl AsRef<[u8]>, salt: impl AsRef<[u8]>) -> Self {
        Self {
            password: password.as_ref().to_vec(),
            salt: salt.as_ref().to_vec(),
            secret: None,
            iterations: 3,
            parallelism: 1,
            memory_size: 64 * 1024,
            hash_length: 32,
            output_type: OutputType::Hex,
        }
    }
}

impl fmt::Debug for Argon2Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Argon2Options")
            .field("password", &format_args!("<{} bytes>", self.password.len()))
            .field("salt_len", &self.salt.len())
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("iterations", &self.iterations)
            .field("parallelism", &self.parallelism)
            .field("memory_size", &self.memory_size)
            .field("hash_length", &self.hash_length)
            .field("output_type", &self.output_type)
            .finish()
    }
}

/// Fully validated parameters of one Argon2 computation
#[derive(Clone)]
pub struct Argon2Request {
    pub(crate) variant: Argon2Variant,
    pub(crate) password: Vec<u8>,
    pub(crate) salt: Vec<u8>,
    pub(crate) secret: Vec<u8>,
    pub(crate) iterations: u32,
    pub(crate) parallelism: u32,
    pub(crate) memory_size: u32,
    pub(crate) hash_length: u32,
    pub(crate) output_type: OutputType,
}

impl Argon2Request {
    /// Validate `options` for `variant` against the runtime limits
    pub fn new(variant: Argon2Variant, options: &Argon2Options, config: &RuntimeConfig) -> Result<Self> {
        if options.password.is_empty() {
            return Err(HashError::validation("password", "must not be empty"));
        }
        if options.salt.len() < MIN_SALT_LEN {
            return Err(HashError::validation(
                "salt",
                format!("must be at least {} bytes, got {}", MIN_SALT_LEN, options.salt.len()),
            ));
        }
        if options.iterations < 1 {
            return Err(HashError::validation("iterations", "must be at least 1"));
        }
        if options.parallelism < 1 || options.parallelism > MAX_PARALLELISM {
            return Err(HashError::validation(
                "parallelism",
                format!("must be between 1 and {}", MAX_PARALLELISM),
            ));
        }
        if options.hash_length < MIN_HASH_LEN || options.hash_length > config.argon2_max_hash_len {
            return Err(HashError::validation(
                "hash_length",
                format!(
                    "must be between {} and {} bytes",
                    MIN_HASH_LEN, config.argon2_max_hash_len
                ),
            ));
        }

        let effective = effective_blocks(options.memory_size, options.parallelism);
        let limit = config.argon2_max_memory_kib;
        if options.memory_size > limit || effective > u64::from(limit) {
            return Err(HashError::validation(
                "memory_size",
                format!("{} KiB exceeds the configured maximum of {} KiB", options.memory_size.max(effective as u32), limit),
            ));
        }

        Ok(Self {
            variant,
            password: options.password.clone(),
            salt: options.salt.clone(),
            secret: options.secret.clone().unwrap_or_default(),
            iterations: options.iterations,
            parallelism: options.parallelism,
            memory_size: options.memory_size,
            hash_length: options.hash_length,
            output_type: options.output_type,
        })
    }

    /// Variant being computed
    pub fn variant(&self) -> Argon2Variant {
        self.variant
    }

    /// Requested memory in KiB, as mixed into H0 and the encoded form
    pub fn memory_size(&self) -> u32 {
        self.memory_size
    }

    /// Number of 1 KiB blocks actually allocated
    pub fn effective_blocks(&self) -> u32 {
        effective_blocks(self.memory_size, self.parallelism) as u32
    }

    /// Tag length in bytes
    pub fn hash_length(&self) -> usize {
        self.hash_length as usize
    }
}

impl fmt::Debug for Argon2Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Argon2Request")
            .field("variant", &self.variant)
            .field("iterations", &self.iterations)
            .field("parallelism", &self.parallelism)
            .field("memory_size", &self.memory_size)
            .field("hash_length", &self.hash_length)
            .finish_non_exhaustive()
    }
}

/// `max(m, 8p)` rounded down to a multiple of `4p`
pub(crate) fn effective_blocks(memory_size: u32, parallelism: u32) -> u64 {
    let lanes = u64::from(parallelism);
    let raised = u64::from(memory_size).max(8 * lanes);
    raised / (4 * lanes) * (4 * lanes)
}
