//! Synchronization primitives
//!
//! Provides the FIFO [`AsyncMutex`] that makes compile-if-absent and
//! shared-instance access atomic across interleaved tasks.

mod mutex;

pub use mutex::*;
