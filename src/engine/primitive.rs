//! Ready-to-use instance of a primitive module

use super::registry::Registry;
use crate::encoding::to_hex;
use crate::error::{HashError, Result};
use crate::sandbox::{Instance, Trap};
use std::fmt;

/// A primitive module instance with a fixed digest length.
///
/// Every byte exchanged with the module goes through the instance's scratch
/// window; [`update`](Self::update) splits larger inputs into window-sized
/// chunks. Engines are owned exclusively, so independent engines never need
/// locking; shared engines live behind [`Registry::with_shared`].
pub struct PrimitiveEngine {
    instance: Instance,
    digest_length: usize,
}

impl PrimitiveEngine {
    /// Compile (once per registry) and instantiate `asset`
    pub async fn load(registry: &Registry, asset: &str, digest_length: usize) -> Result<Self> {
        registry.instantiate(asset, digest_length).await
    }

    pub(crate) fn new(instance: Instance, digest_length: usize) -> Self {
        Self {
            instance,
            digest_length,
        }
    }

    /// Module name
    pub fn name(&self) -> &str {
        self.instance.module().name()
    }

    /// Fingerprint of the compiled module
    pub fn fingerprint(&self) -> u32 {
        self.instance.module().fingerprint()
    }

    /// Bytes of digest this engine reports
    pub fn digest_length(&self) -> usize {
        self.digest_length
    }

    /// Size of the scratch window
    pub fn capacity(&self) -> usize {
        self.instance.scratch().len()
    }

    /// Whether the module exports the combined `calculate` call
    pub fn supports_calculate(&self) -> bool {
        self.instance.module().supports_calculate()
    }

    /// Size of the opaque state exported by [`export_state`](Self::export_state)
    pub fn state_size(&self) -> usize {
        self.instance.state().len()
    }

    fn trap(&self, trap: Trap) -> HashError {
        HashError::computation(self.name(), trap.to_string())
    }

    /// Copy `bytes` into the scratch window at `offset`
    pub fn write(&mut self, bytes: &[u8], offset: usize) -> Result<()> {
        let capacity = self.capacity();
        match offset.checked_add(bytes.len()) {
            Some(end) if end <= capacity => {
                self.instance.scratch_mut()[offset..end].copy_from_slice(bytes);
                Ok(())
            }
            _ => Err(HashError::validation(
                "offset",
                format!(
                    "{} bytes at offset {} exceed the {}-byte scratch window",
                    bytes.len(),
                    offset,
                    capacity
                ),
            )),
        }
    }

    /// Reset the module state; extra inputs must already be in the scratch window
    pub fn init(&mut self, param: Option<u32>) -> Result<()> {
        self.instance.init(param).map_err(|trap| self.trap(trap))
    }

    /// Feed `data`, one `update` call per window-sized chunk
    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        let capacity = self.capacity();
        for chunk in data.chunks(capacity) {
            self.instance.scratch_mut()[..chunk.len()].copy_from_slice(chunk);
            self.instance.update(chunk.len()).map_err(|trap| self.trap(trap))?;
        }
        Ok(())
    }

    /// Finish the computation and return the digest bytes
    pub fn finalize(&mut self, param: Option<u32>) -> Result<&[u8]> {
        self.instance.finalize(param).map_err(|trap| self.trap(trap))?;
        Ok(self.digest())
    }

    /// One-call hash of an input smaller than the scratch window.
    ///
    /// Only valid on modules declaring the combined export.
    pub fn calculate(
        &mut self,
        data: &[u8],
        init_param: Option<u32>,
        final_param: Option<u32>,
    ) -> Result<&[u8]> {
        if !self.supports_calculate() {
            return Err(HashError::computation(
                self.name(),
                "module does not export a combined calculate call",
            ));
        }
        if data.len() >= self.capacity() {
            return Err(HashError::validation(
                "data",
                format!(
                    "{} bytes do not fit the {}-byte scratch window",
                    data.len(),
                    self.capacity()
                ),
            ));
        }
        self.instance.scratch_mut()[..data.len()].copy_from_slice(data);
        self.invoke(data.len(), init_param, final_param)?;
        Ok(self.digest())
    }

    /// Hash `data` from scratch, taking the combined fast path when allowed
    pub fn hash(
        &mut self,
        data: &[u8],
        init_param: Option<u32>,
        final_param: Option<u32>,
    ) -> Result<&[u8]> {
        if self.supports_calculate() && data.len() < self.capacity() {
            return self.calculate(data, init_param, final_param);
        }
        self.init(init_param)?;
        self.update(data)?;
        self.finalize(final_param)
    }

    /// Raw combined call over `len` bytes already placed in the scratch window
    pub fn invoke(
        &mut self,
        len: usize,
        init_param: Option<u32>,
        final_param: Option<u32>,
    ) -> Result<()> {
        self.instance
            .calculate(len, init_param, final_param)
            .map_err(|trap| self.trap(trap))
    }

    /// Scratch window contents
    pub fn scratch(&self) -> &[u8] {
        self.instance.scratch()
    }

    /// First `digest_length` bytes of the scratch window
    pub fn digest(&self) -> &[u8] {
        &self.instance.scratch()[..self.digest_length]
    }

    /// Digest bytes as lowercase hex
    pub fn digest_hex(&self) -> String {
        to_hex(self.digest())
    }

    /// Copy of the opaque module state
    pub fn export_state(&self) -> Vec<u8> {
        self.instance.state().to_vec()
    }

    /// Replace the module state and rebuild derived tables.
    ///
    /// Leaves the previous state in place on failure.
    pub fn import_state(&mut self, state: &[u8]) -> Result<()> {
        self.instance.import_state(state).map_err(|trap| self.trap(trap))
    }
}

impl fmt::Debug for PrimitiveEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveEngine")
            .field("module", &self.name())
            .field("digest_length", &self.digest_length)
            .field("supports_calculate", &self.supports_calculate())
            .finish()
    }
}
