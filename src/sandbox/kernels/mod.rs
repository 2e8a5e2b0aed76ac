//! Native kernels behind the built-in primitive modules

mod argon2;
mod blake2b;
mod crc32;
mod md;
mod md5;
mod sha1;
mod sha256;
mod sha512;

use super::abi::{Kernel, KernelId};
use md::MdKernel;

static MD5: MdKernel<md5::Md5> = MdKernel::new();
static SHA1: MdKernel<sha1::Sha1> = MdKernel::new();
static SHA256: MdKernel<sha256::Sha256> = MdKernel::new();
static SHA512: MdKernel<sha512::Sha512> = MdKernel::new();
static BLAKE2B: blake2b::Blake2bKernel = blake2b::Blake2bKernel;
static CRC32: crc32::Crc32Kernel = crc32::Crc32Kernel;
static ARGON2: argon2::Argon2Kernel = argon2::Argon2Kernel;

/// Kernel bound to an image's kernel id
pub(crate) fn lookup(id: KernelId) -> &'static dyn Kernel {
    match id {
        KernelId::Md5 => &MD5,
        KernelId::Sha1 => &SHA1,
        KernelId::Sha256 => &SHA256,
        KernelId::Sha512 => &SHA512,
        KernelId::Blake2b => &BLAKE2B,
        KernelId::Crc32 => &CRC32,
        KernelId::Argon2 => &ARGON2,
    }
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

pub(crate) fn write_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(word)
}

pub(crate) fn write_u64(bytes: &mut [u8], offset: usize, value: u64) {
    bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

pub(crate) use argon2::{BLOCK_SIZE as ARGON2_BLOCK_SIZE, OUT as ARGON2_OUT, PREV as ARGON2_PREV, REF as ARGON2_REF};
