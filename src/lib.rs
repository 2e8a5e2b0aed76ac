//! # HashBridge - Sandboxed Hashing Runtime
//!
//! HashBridge runs cryptographic primitives as sandboxed modules that talk to
//! the host through a fixed 16 KiB scratch window, and builds streaming
//! hashers, HMAC, PBKDF2 and Argon2 on top of them.
//!
//! ## Features
//!
//! - **Compile once**: each primitive module is compiled at most once per
//!   registry, however many tasks ask for it concurrently
//! - **Streaming hashers**: MD5, SHA-1, SHA-2, BLAKE2b (keyed, variable
//!   size), CRC32 and CRC32C with an explicit `Uninit/Ready/Finalized` lifecycle
//! - **Resumable state**: `save`/`load` snapshots checked byte for byte
//! - **HMAC and PBKDF2** over any hasher
//! - **Argon2d/i/id** with PHC-style encoded strings and constant-time verify
//!
//! ## Quick Start
//!
//! ```no_run
//! # async fn demo() -> hashbridge::Result<()> {
//! use hashbridge::hash::sha256;
//!
//! let digest = sha256("hello world").await?;
//! println!("{}", digest);
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming and Snapshots
//!
//! ```no_run
//! # async fn demo() -> hashbridge::Result<()> {
//! use hashbridge::config::{HashAlgorithm, RuntimeConfig};
//! use hashbridge::engine::Registry;
//! use hashbridge::hash::{create_hasher, Hasher};
//!
//! let registry = Registry::new(RuntimeConfig::default());
//! let mut hasher = create_hasher(&registry, HashAlgorithm::Sha512).await?;
//!
//! hasher.update(b"first half")?;
//! let snapshot = hasher.save()?;
//!
//! hasher.update(b"second half")?;
//! let digest = hasher.hex_digest()?;
//!
//! hasher.load(&snapshot)?;
//! hasher.update(b"second half")?;
//! assert_eq!(hasher.hex_digest()?, digest);
//! # Ok(())
//! # }
//! ```
//!
//! ## Password Hashing
//!
//! ```no_run
//! # async fn demo() -> hashbridge::Result<()> {
//! use hashbridge::kdf::{argon2_verify, argon2id, Argon2Options, OutputType};
//!
//! let options = Argon2Options {
//!     memory_size: 19 * 1024,
//!     iterations: 2,
//!     output_type: OutputType::Encoded,
//!     ..Argon2Options::new("correct horse", "random salt bytes")
//! };
//!
//! let encoded = argon2id(&options).await?.to_string();
//! assert!(argon2_verify("correct horse", &encoded, None).await?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod sandbox;
pub mod sync;

// Re-export commonly used types
pub use config::{HashAlgorithm, RuntimeConfig};
pub use engine::{PrimitiveEngine, Registry};
pub use error::{ErrorKind, HashError, Result};
pub use hash::{Hasher, HasherHandle, HasherState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use hashbridge::prelude::*;
    //! ```

    pub use crate::config::{HashAlgorithm, RuntimeConfig};
    pub use crate::engine::{PrimitiveEngine, Registry};
    pub use crate::error::{ErrorKind, HashError, Result};
    pub use crate::hash::{create_blake2b, create_hasher, hash_file, HashResult, Hasher, HasherHandle, HasherState};
    pub use crate::kdf::{
        argon2_verify, argon2d, argon2i, argon2id, create_hmac, pbkdf2, pbkdf2_with, Argon2Engine,
        Argon2Options, Argon2Output, Argon2Variant, Hmac, OutputType,
    };
    pub use crate::sync::AsyncMutex;
}
