//! Streaming hashers and one-shot digests
//!
//! A [`HasherHandle`] owns a private primitive engine and walks the
//! `Uninit -> Ready -> Finalized` lifecycle; its running state can be saved
//! to a self-checking snapshot and restored later. One-shot helpers such as
//! [`sha256`] share one engine per algorithm through the global registry.

mod algorithms;
mod handle;
mod snapshot;

pub use algorithms::*;
pub use handle::{Hasher, HasherHandle, HasherParams, HasherState};
pub use snapshot::{SNAPSHOT_MAGIC, SNAPSHOT_VERSION};
