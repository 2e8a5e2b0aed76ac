//! SHA-1 over the `sha1` crate's block function

use super::md::Compression;
use crate::sandbox::abi::{KernelId, Trap};
use ::sha1::digest::generic_array::GenericArray;
use std::slice;

const IV: [u32; 5] = [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476, 0xc3d2e1f0];

pub(crate) struct Sha1;

impl Compression for Sha1 {
    const ID: KernelId = KernelId::Sha1;
    const BLOCK: usize = 64;
    const LENGTH_BYTES: usize = 8;
    const BIG_ENDIAN: bool = true;

    fn initial(param: Option<u32>) -> Result<([u64; 8], usize), Trap> {
        match param {
            None | Some(160) => {
                let mut chain = [0u64; 8];
                for (slot, word) in chain.iter_mut().zip(IV) {
                    *slot = word as u64;
                }
                Ok((chain, 20))
            }
            Some(other) => Err(Trap::InvalidParam(other)),
        }
    }

    fn compress(chain: &mut [u64; 8], block: &[u8]) {
        let mut state = [0u32; 5];
        for (slot, word) in state.iter_mut().zip(chain.iter()) {
            *slot = *word as u32;
        }
        ::sha1::compress(&mut state, slice::from_ref(GenericArray::from_slice(block)));
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
