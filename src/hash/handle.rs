//! Streaming hasher state machine over a primitive engine
//!
//! ```text
//!  Uninit --init--> Ready --update--> Ready --digest--> Finalized
//!     \               ^                                   |
//!      \--load--------+------------------init/load--------+
//! ```

use super::snapshot::{self, SnapshotTarget};
use crate::encoding::to_hex;
use crate::engine::PrimitiveEngine;
use crate::error::{HashError, Result};
use std::fmt;

/// Uniform streaming hash interface
pub trait Hasher {
    /// Input block size in bytes (the HMAC pad width)
    fn block_size(&self) -> usize;

    /// Digest size in bytes
    fn digest_size(&self) -> usize;

    /// Start a new computation; always legal
    fn init(&mut self) -> Result<()>;

    /// Absorb `data`
    fn update(&mut self, data: &[u8]) -> Result<()>;

    /// Finish and return the digest bytes
    fn digest(&mut self) -> Result<Vec<u8>>;

    /// Finish and return the digest as lowercase hex
    fn hex_digest(&mut self) -> Result<String> {
        Ok(to_hex(&self.digest()?))
    }
}

impl<H: Hasher + ?Sized> Hasher for &mut H {
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn digest_size(&self) -> usize {
        (**self).digest_size()
    }

    fn init(&mut self) -> Result<()> {
        (**self).init()
    }

    fn update(&mut self, data: &[u8]) -> Result<()> {
        (**self).update(data)
    }

    fn digest(&mut self) -> Result<Vec<u8>> {
        (**self).digest()
    }

    fn hex_digest(&mut self) -> Result<String> {
        (**self).hex_digest()
    }
}

/// Lifecycle of a [`HasherHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HasherState {
    /// Created, never initialized or loaded
    Uninit,
    /// Accepting input
    Ready,
    /// Digest produced; needs `init` or `load` before further use
    Finalized,
}

impl HasherState {
    /// Lowercase name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninit => "uninitialized",
            Self::Ready => "ready",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for HasherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a handle drives its engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HasherParams {
    /// Input block size reported to constructions such as HMAC
    pub block_size: usize,
    /// Parameter for the module's `init` export
    pub init_param: Option<u32>,
    /// Parameter for the module's `finalize` export
    pub final_param: Option<u32>,
    /// Bytes placed at the start of the scratch window before every `init` (keys)
    pub preload: Vec<u8>,
}

/// Streaming hasher owning one primitive engine
pub struct HasherHandle {
    engine: PrimitiveEngine,
    params: HasherParams,
    state: HasherState,
}

impl HasherHandle {
    /// Wrap `engine` in the `Uninit` state
    pub fn new(engine: PrimitiveEngine, params: HasherParams) -> Result<Self> {
        if params.block_size == 0 {
            return Err(HashError::validation("block_size", "must be positive"));
        }
        if params.preload.len() > engine.capacity() {
            return Err(HashError::validation(
                "preload",
                format!("{} bytes exceed the scratch window", params.preload.len()),
            ));
        }
        Ok(Self {
            engine,
            params,
            state: HasherState::Uninit,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> HasherState {
        self.state
    }

    /// Name of the underlying module
    pub fn module_name(&self) -> &str {
        self.engine.name()
    }

    fn require_ready(&self, operation: &'static str) -> Result<()> {
        match self.state {
            HasherState::Ready => Ok(()),
            state => Err(HashError::usage(operation, state.name())),
        }
    }

    fn snapshot_target(&self) -> SnapshotTarget {
        SnapshotTarget {
            fingerprint: self.engine.fingerprint(),
            digest_size: self.engine.digest_length(),
            state_size: self.engine.state_size(),
        }
    }

    /// Serialize the running state; only legal while `Ready`
    pub fn save(&self) -> Result<Vec<u8>> {
        self.require_ready("save")?;
        Ok(snapshot::encode(&self.snapshot_target(), &self.engine.export_state()))
    }

    /// Restore a state produced by [`save`](Self::save), from any state.
    ///
    /// The blob is validated in full before the engine is touched; on
    /// failure the handle is left exactly as it was.
    pub fn load(&mut self, blob: &[u8]) -> Result<()> {
        let state = snapshot::decode(blob, &self.snapshot_target()).map_err(|e| {
            tracing::debug!("Rejected snapshot for '{}': {}", self.engine.name(), e);
            e
        })?;
        self.engine.import_state(state)?;
        self.state = HasherState::Ready;
        Ok(())
    }

    /// Give back the engine
    pub fn into_engine(self) -> PrimitiveEngine {
        self.engine
    }
}

impl Hasher for HasherHandle {
    fn block_size(&self) -> usize {
        self.params.block_size
    }

    fn digest_size(&self) -> usize {
        self.engine.digest_length()
    }

    fn init(&mut self) -> Result<()> {
        if !self.params.preload.is_empty() {
            self.engine.write(&self.params.preload, 0)?;
        }
        self.engine.init(self.params.init_param)?;
        self.state = HasherState::Ready;
        Ok(())
    }

    fn update(&mut self, data: &[u8]) -> Result<()> {
        self.require_ready("update")?;
        self.engine.update(data)
    }

    fn digest(&mut self) -> Result<Vec<u8>> {
        self.require_ready("digest")?;
        let digest = self.engine.finalize(self.params.final_param)?.to_vec();
        self.state = HasherState::Finalized;
        Ok(digest)
    }

    fn hex_digest(&mut self) -> Result<String> {
        self.require_ready("digest")?;
        self.engine.finalize(self.params.final_param)?;
        self.state = HasherState::Finalized;
        Ok(self.engine.digest_hex())
    }
}

impl fmt::Debug for HasherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HasherHandle")
            .field("module", &self.engine.name())
            .field("digest_size", &self.engine.digest_length())
            .field("block_size", &self.params.block_size)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HashAlgorithm, RuntimeConfig};
    use crate::engine::Registry;
    use crate::error::ErrorKind;
    use crate::hash::create_hasher;

    async fn sha256(registry: &Registry) -> HasherHandle {
        create_hasher(registry, HashAlgorithm::Sha256).await.unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let registry = Registry::new(RuntimeConfig::default());
        let engine = registry.instantiate("sha256", 32).await.unwrap();
        let mut hasher = HasherHandle::new(
            engine,
            HasherParams {
                block_size: 64,
                init_param: Some(256),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(hasher.state(), HasherState::Uninit);
        assert_eq!(hasher.update(b"x").unwrap_err().kind(), ErrorKind::Usage);
        assert_eq!(hasher.digest().unwrap_err().kind(), ErrorKind::Usage);
        assert_eq!(hasher.save().unwrap_err().kind(), ErrorKind::Usage);

        hasher.init().unwrap();
        hasher.update(b"abc").unwrap();
        let first = hasher.hex_digest().unwrap();
        assert_eq!(hasher.state(), HasherState::Finalized);

        let err = hasher.update(b"more").unwrap_err();
        assert_eq!(err.to_string(), "Cannot update while the hasher is finalized");
        assert_eq!(hasher.digest().unwrap_err().kind(), ErrorKind::Usage);
        assert_eq!(hasher.save().unwrap_err().kind(), ErrorKind::Usage);

        hasher.init().unwrap();
        hasher.update(b"abc").unwrap();
        assert_eq!(hasher.hex_digest().unwrap(), first);
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let registry = Registry::new(RuntimeConfig::default());
        let (a, b) = (vec![0x5au8; 100], vec![0xa5u8; 70]);

        let mut hasher = sha256(&registry).await;
        hasher.update(&a).unwrap();
        let saved = hasher.save().unwrap();
        hasher.update(&b).unwrap();
        let resumed = hasher.digest().unwrap();

        let mut whole = sha256(&registry).await;
        whole.update(&[a.as_slice(), b.as_slice()].concat()).unwrap();
        assert_eq!(whole.digest().unwrap(), resumed);

        // Reload into the finalized handle and into a fresh one
        hasher.load(&saved).unwrap();
        hasher.update(&b).unwrap();
        assert_eq!(hasher.digest().unwrap(), resumed);

        let mut other = sha256(&registry).await;
        other.update(b"unrelated").unwrap();
        other.load(&saved).unwrap();
        other.update(&b).unwrap();
        assert_eq!(other.digest().unwrap(), resumed);
    }

    #[tokio::test]
    async fn test_any_flipped_byte_fails_load() {
        let registry = Registry::new(RuntimeConfig::default());
        let mut hasher = sha256(&registry).await;
        hasher.update(b"hello").unwrap();
        let saved = hasher.save().unwrap();

        for i in 0..saved.len() {
            let mut tampered = saved.clone();
            tampered[i] = tampered[i].wrapping_add(1);
            let err = hasher.load(&tampered).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "byte {}", i);
        }

        // Failed loads left the running state alone
        hasher.update(b" world").unwrap();
        let mut reference = sha256(&registry).await;
        reference.update(b"hello world").unwrap();
        assert_eq!(hasher.digest().unwrap(), reference.digest().unwrap());
    }

    #[tokio::test]
    async fn test_foreign_snapshot_rejected() {
        let registry = Registry::new(RuntimeConfig::default());
        let mut md5 = create_hasher(&registry, HashAlgorithm::Md5).await.unwrap();
        md5.update(b"abc").unwrap();
        let saved = md5.save().unwrap();

        let mut sha1 = create_hasher(&registry, HashAlgorithm::Sha1).await.unwrap();
        assert_eq!(sha1.load(&saved).unwrap_err().kind(), ErrorKind::Format);

        // Same module, different digest size
        let mut sha224 = create_hasher(&registry, HashAlgorithm::Sha224).await.unwrap();
        sha224.update(b"abc").unwrap();
        let saved = sha224.save().unwrap();
        let mut sha256 = sha256(&registry).await;
        assert_eq!(sha256.load(&saved).unwrap_err().kind(), ErrorKind::Format);
    }

    #[tokio::test]
    async fn test_load_without_init_builds_tables() {
        let registry = Registry::new(RuntimeConfig::default());
        let mut crc = create_hasher(&registry, HashAlgorithm::Crc32c).await.unwrap();
        crc.update(b"1234").unwrap();
        let saved = crc.save().unwrap();

        let engine = registry.instantiate("crc32", 4).await.unwrap();
        let mut fresh = HasherHandle::new(
            engine,
            HasherParams {
                block_size: 4,
                init_param: HashAlgorithm::Crc32c.init_param(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(fresh.state(), HasherState::Uninit);

        fresh.load(&saved).unwrap();
        assert_eq!(fresh.state(), HasherState::Ready);
        fresh.update(b"56789").unwrap();
        assert_eq!(fresh.hex_digest().unwrap(), "e3069283");
    }
}
