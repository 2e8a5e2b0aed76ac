//! Runtime settings for HashBridge
//!
//! Defines the runtime configuration, its defaults and the environment and
//! file sources it can be loaded from, plus the catalogue of streaming hash
//! algorithms.

use crate::error::{HashError, IoResultExt, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Environment variable toggling the sandbox (`1/true/on` or `0/false/off`)
pub const ENV_SANDBOX: &str = "HASHBRIDGE_SANDBOX";
/// Environment variable limiting the linear memory of a single instance (e.g. `16M`)
pub const ENV_MAX_INSTANCE_MEMORY: &str = "HASHBRIDGE_MAX_INSTANCE_MEMORY";
/// Environment variable capping Argon2 memory (e.g. `1G`)
pub const ENV_ARGON2_MAX_MEMORY: &str = "HASHBRIDGE_ARGON2_MAX_MEMORY";
/// Environment variable capping the Argon2 tag length (e.g. `4K`)
pub const ENV_ARGON2_MAX_HASH_LEN: &str = "HASHBRIDGE_ARGON2_MAX_HASH_LEN";

/// Size of the scratch window every primitive instance exposes
pub const SCRATCH_CAPACITY: usize = 16 * 1024;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Whether the sandbox may compile and run primitive modules
    pub sandbox_enabled: bool,
    /// Upper bound on the linear memory of one instance, in bytes
    pub max_instance_memory: usize,
    /// Upper bound on the Argon2 memory parameter, in KiB
    pub argon2_max_memory_kib: u32,
    /// Upper bound on the Argon2 tag length, in bytes
    pub argon2_max_hash_len: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sandbox_enabled: true,
            max_instance_memory: 16 * 1024 * 1024, // 16MB
            argon2_max_memory_kib: 4 * 1024 * 1024, // 4GB
            argon2_max_hash_len: 64 * 1024,
        }
    }
}

impl RuntimeConfig {
    /// Build a config from defaults overridden by `HASHBRIDGE_*` variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load a JSON config file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_path(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in [`from_env`](Self::from_env))
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_SANDBOX) {
            self.sandbox_enabled = parse_flag(&value)
                .ok_or_else(|| HashError::config(format!("{}: expected a boolean, got '{}'", ENV_SANDBOX, value)))?;
        }

        if let Some(value) = lookup(ENV_MAX_INSTANCE_MEMORY) {
            let bytes = parse_size(&value)
                .map_err(|e| HashError::config(format!("{}: {}", ENV_MAX_INSTANCE_MEMORY, e)))?;
            self.max_instance_memory = usize::try_from(bytes)
                .map_err(|_| HashError::config(format!("{}: {} is too large", ENV_MAX_INSTANCE_MEMORY, value)))?;
        }

        if let Some(value) = lookup(ENV_ARGON2_MAX_MEMORY) {
            let bytes = parse_size(&value)
                .map_err(|e| HashError::config(format!("{}: {}", ENV_ARGON2_MAX_MEMORY, e)))?;
            self.argon2_max_memory_kib = u32::try_from(bytes / 1024)
                .map_err(|_| HashError::config(format!("{}: {} is too large", ENV_ARGON2_MAX_MEMORY, value)))?;
        }

        if let Some(value) = lookup(ENV_ARGON2_MAX_HASH_LEN) {
            let bytes = parse_size(&value)
                .map_err(|e| HashError::config(format!("{}: {}", ENV_ARGON2_MAX_HASH_LEN, e)))?;
            self.argon2_max_hash_len = u32::try_from(bytes)
                .map_err(|_| HashError::config(format!("{}: {} is too large", ENV_ARGON2_MAX_HASH_LEN, value)))?;
        }

        self.validate()
    }

    /// Check the config for values no instance could satisfy
    pub fn validate(&self) -> Result<()> {
        if self.max_instance_memory < SCRATCH_CAPACITY {
            return Err(HashError::config(format!(
                "max_instance_memory must be at least {} bytes to hold the scratch window",
                SCRATCH_CAPACITY
            )));
        }
        if self.argon2_max_memory_kib < 8 {
            return Err(HashError::config("argon2_max_memory_kib must be at least 8"));
        }
        if self.argon2_max_hash_len < 4 {
            return Err(HashError::config("argon2_max_hash_len must be at least 4"));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Streaming hash algorithms backed by a built-in primitive module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// MD5 (128-bit)
    Md5,
    /// SHA-1 (160-bit)
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
    /// BLAKE2b with a 256-bit digest
    Blake2b256,
    /// BLAKE2b with a 512-bit digest
    Blake2b512,
    /// CRC-32 (IEEE 802.3)
    Crc32,
    /// CRC-32C (Castagnoli)
    Crc32c,
}

impl HashAlgorithm {
    /// Every supported algorithm
    pub const ALL: [HashAlgorithm; 10] = [
        Self::Md5,
        Self::Sha1,
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Blake2b256,
        Self::Blake2b512,
        Self::Crc32,
        Self::Crc32c,
    ];

    /// Name of the primitive module implementing this algorithm
    pub fn asset(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 | Self::Sha256 => "sha256",
            Self::Sha384 | Self::Sha512 => "sha512",
            Self::Blake2b256 | Self::Blake2b512 => "blake2b",
            Self::Crc32 | Self::Crc32c => "crc32",
        }
    }

    /// Get the output size in bytes
    pub fn output_size(&self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 | Self::Blake2b256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 | Self::Blake2b512 => 64,
            Self::Crc32 | Self::Crc32c => 4,
        }
    }

    /// Get the input block size in bytes (the HMAC pad width)
    pub fn block_size(&self) -> usize {
        match self {
            Self::Md5 | Self::Sha1 | Self::Sha224 | Self::Sha256 => 64,
            Self::Sha384 | Self::Sha512 | Self::Blake2b256 | Self::Blake2b512 => 128,
            Self::Crc32 | Self::Crc32c => 4,
        }
    }

    /// Parameter passed to the module's `init` export
    pub fn init_param(&self) -> Option<u32> {
        match self {
            Self::Md5 | Self::Sha1 => None,
            Self::Sha224 => Some(224),
            Self::Sha256 | Self::Blake2b256 => Some(256),
            Self::Sha384 => Some(384),
            Self::Sha512 | Self::Blake2b512 => Some(512),
            Self::Crc32 => Some(0xEDB8_8320),
            Self::Crc32c => Some(0x82F6_3B78),
        }
    }

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA-1",
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
            Self::Blake2b256 => "BLAKE2b-256",
            Self::Blake2b512 => "BLAKE2b-512",
            Self::Crc32 => "CRC32",
            Self::Crc32c => "CRC32C",
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        Self::ALL
            .iter()
            .copied()
            .find(|algo| algo.name().replace('-', "").to_ascii_lowercase() == normalized)
            .ok_or_else(|| HashError::validation("algorithm", format!("unsupported hash algorithm '{}'", s)))
    }
}

/// Parse a byte count with an optional binary `K`, `M` or `G` suffix (e.g. "64K", "16M")
pub fn parse_size(size: &str) -> std::result::Result<u64, String> {
    let size = size.trim();
    let (digits, shift) = match size.char_indices().last() {
        None => return Err("Empty size string".to_string()),
        Some((at, unit)) => match unit.to_ascii_uppercase() {
            'K' => (&size[..at], 10),
            'M' => (&size[..at], 20),
            'G' => (&size[..at], 30),
            _ => (size, 0),
        },
    };

    let count: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("Invalid size: {}", size))?;
    count
        .checked_mul(1 << shift)
        .ok_or_else(|| format!("Size out of range: {}", size))
}
