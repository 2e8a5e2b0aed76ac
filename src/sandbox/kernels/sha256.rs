//! SHA-224 and SHA-256 over the `sha2` block function

use super::md::Compression;
use crate::sandbox::abi::{KernelId, Trap};
use sha2::digest::generic_array::GenericArray;
use std::slice;

const IV_256: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

const IV_224: [u32; 8] = [
    0xc1059ed8, 0x367cd507, 0x3070dd17, 0xf70e5939, 0xffc00b31, 0x68581511, 0x64f98fa7, 0xbefa4fa4,
];

pub(crate) struct Sha256;

impl Compression for Sha256 {
    const ID: KernelId = KernelId::Sha256;
    const BLOCK: usize = 64;
    const LENGTH_BYTES: usize = 8;
    const BIG_ENDIAN: bool = true;

    fn initial(param: Option<u32>) -> Result<([u64; 8], usize), Trap> {
        let (iv, out_len) = match param {
            None | Some(256) => (IV_256, 32),
            Some(224) => (IV_224, 28),
            Some(other) => return Err(Trap::InvalidParam(other)),
        };
        let mut chain = [0u64; 8];
        for (slot, word) in chain.iter_mut().zip(iv) {
            *slot = word as u64;
        }
        Ok((chain, out_len))
    }

    fn compress(chain: &mut [u64; 8], block: &[u8]) {
        let mut state = [0u32; 8];
        for (slot, word) in state.iter_mut().zip(chain.iter()) {
            *slot = *word as u32;
        }
        sha2::compress256(&mut state, slice::from_ref(GenericArray::from_slice(block)));
        for (slot, word) in chain.iter_mut().zip(state) {
            *slot = word as u64;
        }
    }

    fn output(chain: &[u64; 8], out: &mut [u8]) {
        for (bytes, word) in out.chunks_mut(4).zip(chain.iter()) {
            bytes.copy_from_slice(&(*word as u32).to_be_bytes()[..bytes.len()]);
        }
    }
}
