//! Argon2 block compression `G`
//!
//! The combined export reads the previous block at [`PREV`] and the
//! reference block at [`REF`], and XORs `P(prev ^ ref) ^ prev ^ ref` into the
//! block at [`OUT`]. The host zeroes [`OUT`] for first-pass blocks.

use super::{read_u64, write_u64};
use crate::sandbox::abi::{check_len, Kernel, KernelId, Regions, Trap};

pub(crate) const BLOCK_SIZE: usize = 1024;
const WORDS: usize = BLOCK_SIZE / 8;

pub(crate) const OUT: usize = 0;
pub(crate) const PREV: usize = 2 * BLOCK_SIZE;
pub(crate) const REF: usize = 3 * BLOCK_SIZE;
const WINDOW: usize = 4 * BLOCK_SIZE;

pub(crate) struct Argon2Kernel;

#[inline(always)]
fn fblamka(x: u64, y: u64) -> u64 {
    let product = (x & 0xffff_ffff).wrapping_mul(y & 0xffff_ffff);
    x.wrapping_add(y).wrapping_add(product.wrapping_mul(2))
}

#[inline(always)]
fn gb(v: &mut [u64; 16], a: usize, b: usize, c: usize, d: usize) {
    v[a] = fblamka(v[a], v[b]);
    v[d] = (v[d] ^ v[a]).rotate_right(32);
    v[c] = fblamka(v[c], v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(24);
    v[a] = fblamka(v[a], v[b]);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = fblamka(v[c], v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(63);
}

/// Blake2b round over the 16 words of `block` selected by `index`
fn permute(block: &mut [u64; WORDS], index: &[usize; 16]) {
    let mut v = [0u64; 16];
    for (slot, &i) in v.iter_mut().zip(index) {
        *slot = block[i];
    }

    gb(&mut v, 0, 4, 8, 12);
    gb(&mut v, 1, 5, 9, 13);
    gb(&mut v, 2, 6, 10, 14);
    gb(&mut v, 3, 7, 11, 15);
    gb(&mut v, 0, 5, 10, 15);
    gb(&mut v, 1, 6, 11, 12);
    gb(&mut v, 2, 7, 8, 13);
    gb(&mut v, 3, 4, 9, 14);

    for (&value, &i) in v.iter().zip(index) {
        block[i] = value;
    }
}

fn mix(scratch: &mut [u8]) {
    let mut r = [0u64; WORDS];
    for (i, word) in r.iter_mut().enumerate() {
        *word = read_u64(scratch, PREV + i * 8) ^ read_u64(scratch, REF + i * 8);
    }

    let mut q = r;
    for row in 0..8 {
        let mut index = [0usize; 16];
        for (j, slot) in index.iter_mut().enumerate() {
            *slot = row * 16 + j;
        }
        permute(&mut q, &index);
    }
    for column in 0..8 {
        let mut index = [0usize; 16];
        for (j, slot) in index.iter_mut().enumerate() {
            *slot = 2 * column + (j / 2) * 16 + (j % 2);
        }
        permute(&mut q, &index);
    }

    for i in 0..WORDS {
        let offset = OUT + i * 8;
        let z = read_u64(scratch, offset) ^ r[i] ^ q[i];
        write_u64(scratch, offset, z);
    }
}

impl Kernel for Argon2Kernel {
    fn id(&self) -> KernelId {
        KernelId::Argon2
    }

    fn state_size(&self) -> usize {
        0
    }

    fn supports_calculate(&self) -> bool {
        true
    }

    fn init(&self, regions: Regions<'_>, _param: Option<u32>) -> Result<(), Trap> {
        check_len(WINDOW, regions.scratch.len())?;
        regions.scratch[..WINDOW].fill(0);
        Ok(())
    }

    fn update(&self, _regions: Regions<'_>, _len: usize) -> Result<(), Trap> {
        Err(Trap::Unsupported("update"))
    }

    fn finalize(&self, regions: Regions<'_>, _param: Option<u32>) -> Result<(), Trap> {
        check_len(WINDOW, regions.scratch.len())?;
        mix(regions.scratch);
        Ok(())
    }

    fn calculate(
        &self,
        regions: Regions<'_>,
        _len: usize,
        _init_param: Option<u32>,
        _final_param: Option<u32>,
    ) -> Result<(), Trap> {
        self.finalize(regions, None)
    }
}
