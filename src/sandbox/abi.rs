//! Call-and-memory-window ABI shared by every primitive module
//!
//! A module exposes `start`, `init`, `update`, `finalize`, an optional
//! combined `calculate` and a `resume` hook run after foreign state has been
//! imported. The host never hands a module more than three regions of its
//! instance memory: the scratch window, the opaque state and an auxiliary
//! area for tables the module derives from its state.

use thiserror::Error;

/// Version of the ABI described by module images
pub const ABI_VERSION: u16 = 1;

/// Failure signaled by a primitive module
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Trap {
    /// Access outside the scratch window
    #[error("{requested} bytes exceed the {available}-byte scratch window")]
    OutOfBounds { requested: usize, available: usize },

    /// Parameter not accepted by `init` or `finalize`
    #[error("unsupported parameter {0:#x}")]
    InvalidParam(u32),

    /// Export not provided by this module
    #[error("export '{0}' is not provided")]
    Unsupported(&'static str),

    /// State region holds values no export could have written
    #[error("corrupt state: {0}")]
    CorruptState(&'static str),
}

/// Identifies the kernel a module image binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KernelId {
    /// MD5
    Md5 = 1,
    /// SHA-1
    Sha1 = 2,
    /// SHA-224 and SHA-256
    Sha256 = 3,
    /// SHA-384 and SHA-512
    Sha512 = 4,
    /// BLAKE2b, keyed or unkeyed, 8..=512 bit output
    Blake2b = 5,
    /// Reflected CRC-32 with a caller-chosen polynomial
    Crc32 = 6,
    /// Argon2 block compression
    Argon2 = 7,
}

impl KernelId {
    /// Decode the kernel byte of a module image
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Md5),
            2 => Some(Self::Sha1),
            3 => Some(Self::Sha256),
            4 => Some(Self::Sha512),
            5 => Some(Self::Blake2b),
            6 => Some(Self::Crc32),
            7 => Some(Self::Argon2),
            _ => None,
        }
    }
}

/// Views into one instance's linear memory handed to a kernel call
pub struct Regions<'a> {
    /// Bounded window for input and output bytes
    pub scratch: &'a mut [u8],
    /// Opaque running state, exported by save and imported by load
    pub state: &'a mut [u8],
    /// Derived data (lookup tables) rebuilt by `init` and `resume`
    pub aux: &'a mut [u8],
}

impl<'a> Regions<'a> {
    /// Borrow the same regions for a nested call
    pub fn reborrow(&mut self) -> Regions<'_> {
        Regions {
            scratch: &mut *self.scratch,
            state: &mut *self.state,
            aux: &mut *self.aux,
        }
    }
}

/// Check that `len` bytes fit in a scratch window of `available` bytes
pub(crate) fn check_len(len: usize, available: usize) -> Result<(), Trap> {
    if len > available {
        return Err(Trap::OutOfBounds {
            requested: len,
            available,
        });
    }
    Ok(())
}

/// Behavior behind a compiled module's exports
pub trait Kernel: Send + Sync + 'static {
    /// Kernel identity, matched against the image header at compile time
    fn id(&self) -> KernelId;

    /// Bytes of opaque state
    fn state_size(&self) -> usize;

    /// Bytes of auxiliary memory
    fn aux_size(&self) -> usize {
        0
    }

    /// Whether the combined `calculate` export exists
    fn supports_calculate(&self) -> bool {
        false
    }

    /// One-time setup after instantiation
    fn start(&self, _regions: Regions<'_>) -> Result<(), Trap> {
        Ok(())
    }

    /// Reset the state; extra inputs are read from the scratch window
    fn init(&self, regions: Regions<'_>, param: Option<u32>) -> Result<(), Trap>;

    /// Absorb the first `len` bytes of the scratch window
    fn update(&self, regions: Regions<'_>, len: usize) -> Result<(), Trap>;

    /// Write the digest to the start of the scratch window
    fn finalize(&self, regions: Regions<'_>, param: Option<u32>) -> Result<(), Trap>;

    /// `init`, `update(len)` and `finalize` in a single call
    fn calculate(
        &self,
        mut regions: Regions<'_>,
        len: usize,
        init_param: Option<u32>,
        final_param: Option<u32>,
    ) -> Result<(), Trap> {
        if !self.supports_calculate() {
            return Err(Trap::Unsupported("calculate"));
        }
        self.init(regions.reborrow(), init_param)?;
        self.update(regions.reborrow(), len)?;
        self.finalize(regions, final_param)
    }

    /// Rebuild derived data after the state region was overwritten
    fn resume(&self, _regions: Regions<'_>) -> Result<(), Trap> {
        Ok(())
    }
}
