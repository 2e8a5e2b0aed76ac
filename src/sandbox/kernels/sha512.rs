//! SHA-384 and SHA-512 over the `sha2` block function

use super::md::Compression;
use crate::sandbox::abi::{KernelId, Trap};
use sha2::digest::generic_array::GenericArray;
use std::slice;

const IV_512: [u64; 8] = [
    0x6a09e667f3bcc908, 0xbb67ae8584caa73b, 0x3c6ef372fe94f82b, 0xa54ff53a5f1d36f1,
    0x510e527fade682d1, 0x9b05688c2b3e6c1f, 0x1f83d9abfb41bd6b, 0x5be0cd19137e2179,
];

const IV_384: [u64; 8] = [
    0xcbbb9d5dc1059ed8, 0x629a292a367cd507, 0x9159015a3070dd17, 0x152fecd8f70e5939,
    0x67332667ffc00b31, 0x8eb44a8768581511, 0xdb0c2e0d64f98fa7, 0x47b5481dbefa4fa4,
];

pub(crate) struct Sha512;

impl Compression for Sha512 {
    const ID: KernelId = KernelId::Sha512;
    const BLOCK: usize = 128;
    const LENGTH_BYTES: usize = 16;
    const BIG_ENDIAN: bool = true;

    fn initial(param: Option<u32>) -> Result<([u64; 8], usize), Trap> {
        match param {
            None | Some(512) => Ok((IV_512, 64)),
            Some(384) => Ok((IV_384, 48)),
            Some(other) => Err(Trap::InvalidParam(other)),
        }
    }

    fn compress(chain: &mut [u64; 8], block: &[u8]) {
        sha2::compress512(chain, slice::from_ref(GenericArray::from_slice(block)));
    }

    fn output(chain: &[u64; 8], out: &mut [u8]) {
        for (bytes, word) in out.chunks_mut(8).zip(chain.iter()) {
            bytes.copy_from_slice(&word.to_be_bytes()[..bytes.len()]);
        }
    }
}
