//! Sandboxed execution of primitive modules
//!
//! A [`PrimitiveAsset`] is compiled into a [`CompiledModule`] once, then
//! instantiated any number of times. Every [`Instance`] owns a private linear
//! memory holding a 16 KiB scratch window, the opaque primitive state and an
//! auxiliary area; all bytes cross the boundary through the scratch window.

mod abi;
mod asset;
mod instance;
mod kernels;
mod native;

pub use abi::{Kernel, KernelId, Regions, Trap, ABI_VERSION};
pub use asset::{builtin_assets, CompiledModule, MemoryLayout, ModuleHeader, PrimitiveAsset, IMAGE_LEN, IMAGE_MAGIC};
pub use instance::Instance;
pub use native::NativeSandbox;

pub(crate) use kernels::{ARGON2_BLOCK_SIZE, ARGON2_OUT, ARGON2_PREV, ARGON2_REF};

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Engine able to compile and instantiate primitive modules
#[async_trait]
pub trait Sandbox: Send + Sync + std::fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Whether modules can run at all
    fn is_available(&self) -> bool;

    /// Validate an asset and bind it to its kernel
    async fn compile(&self, asset: &PrimitiveAsset) -> Result<CompiledModule>;

    /// Create an instance with fresh memory
    async fn instantiate(&self, module: Arc<CompiledModule>) -> Result<Instance>;
}
