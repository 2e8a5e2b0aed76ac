//! In-process sandbox running the native kernels

use super::asset::{CompiledModule, PrimitiveAsset};
use super::instance::Instance;
use super::Sandbox;
use crate::config::RuntimeConfig;
use crate::error::{HashError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Sandbox executing modules against the kernels linked into this crate
#[derive(Debug, Clone)]
pub struct NativeSandbox {
    enabled: bool,
    max_instance_memory: usize,
}

impl NativeSandbox {
    /// Build a sandbox honoring the config's toggle and memory limit
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            enabled: config.sandbox_enabled,
            max_instance_memory: config.max_instance_memory,
        }
    }
}

#[async_trait]
impl Sandbox for NativeSandbox {
    fn name(&self) -> &str {
        "native"
    }

    fn is_available(&self) -> bool {
        self.enabled
    }

    async fn compile(&self, asset: &PrimitiveAsset) -> Result<CompiledModule> {
        // Compilation is a suspension point for callers queued on the same asset
        tokio::task::yield_now().await;
        CompiledModule::compile(asset)
    }

    async fn instantiate(&self, module: Arc<CompiledModule>) -> Result<Instance> {
        let required = module.layout().memory_size();
        if required > self.max_instance_memory {
            return Err(HashError::Capability(format!(
                "module '{}' needs {} bytes of memory, limit is {}",
                module.name(),
                required,
                self.max_instance_memory
            )));
        }

        tokio::task::yield_now().await;
        let name = module.name().to_string();
        Instance::new(module).map_err(|trap| HashError::computation(name, trap.to_string()))
    }
}
