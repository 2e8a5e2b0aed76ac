//! Primitive module images and their compiled form
//!
//! An image is a 32-byte little-endian header:
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 4    | magic `\0hbm`                           |
//! | 4      | 2    | ABI version                             |
//! | 6      | 1    | kernel id                               |
//! | 7      | 1    | flags (bit 0: combined `calculate`)     |
//! | 8      | 4    | scratch offset                          |
//! | 12     | 4    | scratch size                            |
//! | 16     | 4    | state offset                            |
//! | 20     | 4    | state size                              |
//! | 24     | 4    | auxiliary size                          |
//! | 28     | 4    | checksum (XXH3-64 of bytes 0..28, low)  |

use super::abi::{Kernel, KernelId, ABI_VERSION};
use super::kernels;
use crate::config::SCRATCH_CAPACITY;
use crate::error::{HashError, Result};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_64;

/// Magic bytes opening every module image
pub const IMAGE_MAGIC: [u8; 4] = *b"\0hbm";
/// Exact length of a module image
pub const IMAGE_LEN: usize = 32;

const FLAG_CALCULATE: u8 = 0b0000_0001;
const CHECKSUMMED: usize = 28;

/// Offset of the scratch window in built-in modules
const BUILTIN_SCRATCH_OFFSET: usize = 1024;

/// Placement of the three regions inside an instance's linear memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    /// Offset of the scratch window
    pub scratch_offset: usize,
    /// Size of the scratch window
    pub scratch_size: usize,
    /// Offset of the opaque state
    pub state_offset: usize,
    /// Size of the opaque state
    pub state_size: usize,
    /// Size of the auxiliary area following the state
    pub aux_size: usize,
}

impl MemoryLayout {
    /// Offset of the auxiliary area
    pub fn aux_offset(&self) -> usize {
        self.state_offset + self.state_size
    }

    /// Total linear memory an instance needs
    pub fn memory_size(&self) -> usize {
        self.aux_offset() + self.aux_size
    }
}

/// Decoded module image header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleHeader {
    /// Kernel the image binds to
    pub kernel: KernelId,
    /// Whether the module exports the combined `calculate` call
    pub combined_calculate: bool,
    /// Memory layout of instances
    pub layout: MemoryLayout,
}

fn field(image: &[u8], offset: usize) -> usize {
    u32::from_le_bytes([image[offset], image[offset + 1], image[offset + 2], image[offset + 3]]) as usize
}

fn checksum(bytes: &[u8]) -> u32 {
    xxh3_64(bytes) as u32
}

impl ModuleHeader {
    /// Standard header for a built-in kernel
    pub fn for_kernel(kernel: &dyn Kernel) -> Self {
        Self {
            kernel: kernel.id(),
            combined_calculate: kernel.supports_calculate(),
            layout: MemoryLayout {
                scratch_offset: BUILTIN_SCRATCH_OFFSET,
                scratch_size: SCRATCH_CAPACITY,
                state_offset: BUILTIN_SCRATCH_OFFSET + SCRATCH_CAPACITY,
                state_size: kernel.state_size(),
                aux_size: kernel.aux_size(),
            },
        }
    }

    /// Serialize into an image
    pub fn encode(&self) -> Vec<u8> {
        let mut image = Vec::with_capacity(IMAGE_LEN);
        image.extend_from_slice(&IMAGE_MAGIC);
        image.extend_from_slice(&ABI_VERSION.to_le_bytes());
        image.push(self.kernel as u8);
        image.push(if self.combined_calculate { FLAG_CALCULATE } else { 0 });
        let layout = &self.layout;
        for value in [
            layout.scratch_offset,
            layout.scratch_size,
            layout.state_offset,
            layout.state_size,
            layout.aux_size,
        ] {
            image.extend_from_slice(&(value as u32).to_le_bytes());
        }
        let sum = checksum(&image);
        image.extend_from_slice(&sum.to_le_bytes());
        image
    }

    /// Decode an image, checking framing only
    pub fn parse(image: &[u8]) -> std::result::Result<Self, String> {
        if image.len() != IMAGE_LEN {
            return Err(format!("image is {} bytes, expected {}", image.len(), IMAGE_LEN));
        }
        if image[..4] != IMAGE_MAGIC {
            return Err("bad magic".to_string());
        }
        let version = u16::from_le_bytes([image[4], image[5]]);
        if version != ABI_VERSION {
            return Err(format!("unsupported ABI version {}", version));
        }
        if field(image, CHECKSUMMED) as u32 != checksum(&image[..CHECKSUMMED]) {
            return Err("checksum mismatch".to_string());
        }
        let kernel = KernelId::from_byte(image[6]).ok_or_else(|| format!("unknown kernel id {}", image[6]))?;
        let flags = image[7];
        if flags & !FLAG_CALCULATE != 0 {
            return Err(format!("unknown flags {:#04x}", flags));
        }

        Ok(Self {
            kernel,
            combined_calculate: flags & FLAG_CALCULATE != 0,
            layout: MemoryLayout {
                scratch_offset: field(image, 8),
                scratch_size: field(image, 12),
                state_offset: field(image, 16),
                state_size: field(image, 20),
                aux_size: field(image, 24),
            },
        })
    }
}

/// Immutable module image identified by name
#[derive(Debug, Clone)]
pub struct PrimitiveAsset {
    name: Arc<str>,
    image: Arc<[u8]>,
}

impl PrimitiveAsset {
    /// Wrap an image under `name`
    pub fn new(name: impl Into<Arc<str>>, image: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
        }
    }

    /// Asset name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw image bytes
    pub fn image(&self) -> &[u8] {
        &self.image
    }
}

static BUILTINS: Lazy<Vec<PrimitiveAsset>> = Lazy::new(|| {
    [
        ("md5", KernelId::Md5),
        ("sha1", KernelId::Sha1),
        ("sha256", KernelId::Sha256),
        ("sha512", KernelId::Sha512),
        ("blake2b", KernelId::Blake2b),
        ("crc32", KernelId::Crc32),
        ("argon2", KernelId::Argon2),
    ]
    .into_iter()
    .map(|(name, id)| PrimitiveAsset::new(name, ModuleHeader::for_kernel(kernels::lookup(id)).encode()))
    .collect()
});

/// Assets shipped with the crate
pub fn builtin_assets() -> &'static [PrimitiveAsset] {
    &BUILTINS
}

/// A validated module bound to its kernel; read-only once cached
pub struct CompiledModule {
    name: Arc<str>,
    fingerprint: u32,
    kernel: &'static dyn Kernel,
    layout: MemoryLayout,
    combined_calculate: bool,
}

impl CompiledModule {
    /// Validate an asset's image and bind it to its kernel
    pub fn compile(asset: &PrimitiveAsset) -> Result<Self> {
        let fail = |message: String| HashError::compile(asset.name(), message);

        let header = ModuleHeader::parse(asset.image()).map_err(fail)?;
        let kernel = kernels::lookup(header.kernel);
        let layout = header.layout;

        if layout.scratch_size != SCRATCH_CAPACITY {
            return Err(fail(format!(
                "scratch window is {} bytes, expected {}",
                layout.scratch_size, SCRATCH_CAPACITY
            )));
        }
        if layout.scratch_offset + layout.scratch_size > layout.state_offset {
            return Err(fail("state region overlaps the scratch window".to_string()));
        }
        if layout.state_size != kernel.state_size() || layout.aux_size != kernel.aux_size() {
            return Err(fail(format!(
                "layout does not match the {:?} kernel (state {} / aux {})",
                header.kernel,
                kernel.state_size(),
                kernel.aux_size()
            )));
        }
        if header.combined_calculate && !kernel.supports_calculate() {
            return Err(fail(format!("{:?} kernel has no combined calculate export", header.kernel)));
        }

        let mut identity = Vec::with_capacity(asset.name().len() + asset.image().len());
        identity.extend_from_slice(asset.name().as_bytes());
        identity.extend_from_slice(asset.image());

        Ok(Self {
            name: Arc::clone(&asset.name),
            fingerprint: xxh3_64(&identity) as u32,
            kernel,
            layout,
            combined_calculate: header.combined_calculate,
        })
    }

    /// Module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of name and image, embedded in saved hasher state
    pub fn fingerprint(&self) -> u32 {
        self.fingerprint
    }

    /// Memory layout of instances
    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Whether the combined `calculate` fast path may be used
    pub fn supports_calculate(&self) -> bool {
        self.combined_calculate
    }

    pub(crate) fn kernel(&self) -> &'static dyn Kernel {
        self.kernel
    }
}

impl fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledModule")
            .field("name", &self.name)
            .field("fingerprint", &format_args!("{:#010x}", self.fingerprint))
            .field("kernel", &self.kernel.id())
            .field("layout", &self.layout)
            .field("combined_calculate", &self.combined_calculate)
            .finish()
    }
}
