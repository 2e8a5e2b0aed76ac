//! One instantiation of a compiled module

use super::abi::{Regions, Trap};
use super::asset::CompiledModule;
use std::fmt;
use std::sync::Arc;

/// Private linear memory bound to a compiled module
pub struct Instance {
    module: Arc<CompiledModule>,
    memory: Vec<u8>,
}

impl Instance {
    /// Allocate memory for `module` and run its `start` export
    pub fn new(module: Arc<CompiledModule>) -> Result<Self, Trap> {
        let memory = vec![0u8; module.layout().memory_size()];
        let mut instance = Self { module, memory };
        let kernel = instance.module.kernel();
        kernel.start(instance.regions())?;
        Ok(instance)
    }

    /// Module this instance runs
    pub fn module(&self) -> &Arc<CompiledModule> {
        &self.module
    }

    fn regions(&mut self) -> Regions<'_> {
        let layout = *self.module.layout();
        let (head, tail) = self.memory.split_at_mut(layout.state_offset);
        let (state, aux) = tail.split_at_mut(layout.state_size);
        Regions {
            scratch: &mut head[layout.scratch_offset..layout.scratch_offset + layout.scratch_size],
            state,
            aux: &mut aux[..layout.aux_size],
        }
    }

    /// Scratch window
    pub fn scratch(&self) -> &[u8] {
        let layout = self.module.layout();
        &self.memory[layout.scratch_offset..layout.scratch_offset + layout.scratch_size]
    }

    /// Mutable scratch window
    pub fn scratch_mut(&mut self) -> &mut [u8] {
        self.regions().scratch
    }

    /// Opaque state region
    pub fn state(&self) -> &[u8] {
        let layout = self.module.layout();
        &self.memory[layout.state_offset..layout.state_offset + layout.state_size]
    }

    /// `init` export
    pub fn init(&mut self, param: Option<u32>) -> Result<(), Trap> {
        let kernel = self.module.kernel();
        kernel.init(self.regions(), param)
    }

    /// `update` export
    pub fn update(&mut self, len: usize) -> Result<(), Trap> {
        let kernel = self.module.kernel();
        kernel.update(self.regions(), len)
    }

    /// `finalize` export
    pub fn finalize(&mut self, param: Option<u32>) -> Result<(), Trap> {
        let kernel = self.module.kernel();
        kernel.finalize(self.regions(), param)
    }

    /// Combined `calculate` export, present only when the image declares it
    pub fn calculate(
        &mut self,
        len: usize,
        init_param: Option<u32>,
        final_param: Option<u32>,
    ) -> Result<(), Trap> {
        if !self.module.supports_calculate() {
            return Err(Trap::Unsupported("calculate"));
        }
        let kernel = self.module.kernel();
        kernel.calculate(self.regions(), len, init_param, final_param)
    }

    /// Overwrite the state region and run `resume`.
    ///
    /// The previous state is restored if `resume` traps.
    pub fn import_state(&mut self, state: &[u8]) -> Result<(), Trap> {
        let layout = *self.module.layout();
        if state.len() != layout.state_size {
            return Err(Trap::CorruptState("state length"));
        }

        let range = layout.state_offset..layout.state_offset + layout.state_size;
        let previous = self.memory[range.clone()].to_vec();
        self.memory[range.clone()].copy_from_slice(state);

        let kernel = self.module.kernel();
        if let Err(trap) = kernel.resume(self.regions()) {
            self.memory[range].copy_from_slice(&previous);
            return Err(trap);
        }
        Ok(())
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("module", &self.module.name())
            .field("memory", &self.memory.len())
            .finish()
    }
}
