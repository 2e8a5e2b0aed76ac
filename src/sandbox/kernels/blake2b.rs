//! BLAKE2b (RFC 7693), keyed or unkeyed, with 8..=512 bit digests
//!
//! `init` takes `digest_bits | key_bits << 16`; the key itself is read from
//! the start of the scratch window. The last input block is held back until
//! more data arrives so `finalize` can flag it.

use super::{read_u32, read_u64, write_u32, write_u64};
use crate::sandbox::abi::{check_len, Kernel, KernelId, Regions, Trap};

const BLOCK: usize = 128;

const H: usize = 0;
const COUNTER: usize = 64;
const BUFFERED: usize = 80;
const OUT_LEN: usize = 84;
const BUFFER: usize = 88;
const STATE_SIZE: usize = BUFFER + BLOCK;

const IV: [u64; 8] = [
    0x6a09e667f3bcc908, 0xbb67ae8584caa73b, 0x3c6ef372fe94f82b, 0xa54ff53a5f1d36f1,
    0x510e527fade682d1, 0x9b05688c2b3e6c1f, 0x1f83d9abfb41bd6b, 0x5be0cd19137e2179,
];

const SIGMA: [[usize; 16]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
    [11, 8, 12, 0, 5, 2, 15, 13, 10, 14, 3, 6, 7, 1, 9, 4],
    [7, 9, 3, 1, 13, 12, 11, 14, 2, 6, 5, 10, 4, 0, 15, 8],
    [9, 0, 5, 7, 2, 4, 10, 15, 14, 1, 11, 12, 6, 8, 3, 13],
    [2, 12, 6, 10, 0, 11, 8, 3, 4, 13, 7, 5, 15, 14, 1, 9],
    [12, 5, 1, 15, 14, 13, 4, 10, 0, 7, 6, 3, 9, 2, 8, 11],
    [13, 11, 7, 14, 12, 1, 3, 9, 5, 0, 15, 4, 8, 6, 2, 10],
    [6, 15, 14, 9, 11, 3, 0, 8, 12, 2, 13, 7, 1, 4, 10, 5],
    [10, 2, 8, 4, 7, 6, 1, 5, 15, 11, 9, 14, 3, 12, 13, 0],
];

pub(crate) struct Blake2bKernel;

struct State {
    h: [u64; 8],
    counter: u128,
    buffered: usize,
    out_len: usize,
}

impl State {
    fn load(state: &[u8]) -> Result<Self, Trap> {
        let mut h = [0u64; 8];
        for (i, word) in h.iter_mut().enumerate() {
            *word = read_u64(state, H + i * 8);
        }
        let counter = read_u64(state, COUNTER) as u128 | (read_u64(state, COUNTER + 8) as u128) << 64;
        let loaded = Self {
            h,
            counter,
            buffered: read_u32(state, BUFFERED) as usize,
            out_len: read_u32(state, OUT_LEN) as usize,
        };
        if loaded.out_len == 0 || loaded.out_len > 64 {
            return Err(Trap::CorruptState("digest length"));
        }
        if loaded.buffered > BLOCK {
            return Err(Trap::CorruptState("buffered length"));
        }
        Ok(loaded)
    }

    fn store(&self, state: &mut [u8]) {
        for (i, word) in self.h.iter().enumerate() {
            write_u64(state, H + i * 8, *word);
        }
        write_u64(state, COUNTER, self.counter as u64);
        write_u64(state, COUNTER + 8, (self.counter >> 64) as u64);
        write_u32(state, BUFFERED, self.buffered as u32);
        write_u32(state, OUT_LEN, self.out_len as u32);
    }
}

#[inline(always)]
fn g(v: &mut [u64; 16], a: usize, b: usize, c: usize, d: usize, x: u64, y: u64) {
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(x);
    v[d] = (v[d] ^ v[a]).rotate_right(32);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(24);
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(y);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(63);
}

fn compress(h: &mut [u64; 8], block: &[u8], counter: u128, last: bool) {
    let mut m = [0u64; 16];
    for (i, word) in m.iter_mut().enumerate() {
        *word = read_u64(block, i * 8);
    }

    let mut v = [0u64; 16];
    v[..8].copy_from_slice(h);
    v[8..].copy_from_slice(&IV);
    v[12] ^= counter as u64;
    v[13] ^= (counter >> 64) as u64;
    if last {
        v[14] = !v[14];
    }

    for round in 0..12 {
        let s = &SIGMA[round % 10];
        g(&mut v, 0, 4, 8, 12, m[s[0]], m[s[1]]);
        g(&mut v, 1, 5, 9, 13, m[s[2]], m[s[3]]);
        g(&mut v, 2, 6, 10, 14, m[s[4]], m[s[5]]);
        g(&mut v, 3, 7, 11, 15, m[s[6]], m[s[7]]);
        g(&mut v, 0, 5, 10, 15, m[s[8]], m[s[9]]);
        g(&mut v, 1, 6, 11, 12, m[s[10]], m[s[11]]);
        g(&mut v, 2, 7, 8, 13, m[s[12]], m[s[13]]);
        g(&mut v, 3, 4, 9, 14, m[s[14]], m[s[15]]);
    }

    for i in 0..8 {
        h[i] ^= v[i] ^ v[i + 8];
    }
}

impl Kernel for Blake2bKernel {
    fn id(&self) -> KernelId {
        KernelId::Blake2b
    }

    fn state_size(&self) -> usize {
        STATE_SIZE
    }

    fn init(&self, regions: Regions<'_>, param: Option<u32>) -> Result<(), Trap> {
        let param = param.unwrap_or(512);
        let digest_bits = param & 0xffff;
        let key_bits = param >> 16;
        if digest_bits == 0 || digest_bits > 512 || digest_bits % 8 != 0 || key_bits > 512 || key_bits % 8 != 0 {
            return Err(Trap::InvalidParam(param));
        }
        let out_len = (digest_bits / 8) as usize;
        let key_len = (key_bits / 8) as usize;
        check_len(key_len, regions.scratch.len())?;

        let mut h = IV;
        h[0] ^= 0x0101_0000 ^ ((key_len as u64) << 8) ^ out_len as u64;

        regions.state.fill(0);
        let mut state = State {
            h,
            counter: 0,
            buffered: 0,
            out_len,
        };
        if key_len > 0 {
            regions.state[BUFFER..BUFFER + key_len].copy_from_slice(&regions.scratch[..key_len]);
            state.buffered = BLOCK;
        }
        state.store(regions.state);
        Ok(())
    }

    fn update(&self, regions: Regions<'_>, len: usize) -> Result<(), Trap> {
        check_len(len, regions.scratch.len())?;
        let (header, rest) = regions.state.split_at_mut(BUFFER);
        let buffer = &mut rest[..BLOCK];
        let mut state = State::load(header)?;
        let mut input = &regions.scratch[..len];

        while !input.is_empty() {
            if state.buffered == BLOCK {
                state.counter = state.counter.wrapping_add(BLOCK as u128);
                compress(&mut state.h, buffer, state.counter, false);
                state.buffered = 0;
            }
            let take = (BLOCK - state.buffered).min(input.len());
            buffer[state.buffered..state.buffered + take].copy_from_slice(&input[..take]);
            state.buffered += take;
            input = &input[take..];
        }

        state.store(header);
        Ok(())
    }

    fn finalize(&self, regions: Regions<'_>, _param: Option<u32>) -> Result<(), Trap> {
        let (header, rest) = regions.state.split_at_mut(BUFFER);
        let buffer = &mut rest[..BLOCK];
        let mut state = State::load(header)?;
        check_len(state.out_len, regions.scratch.len())?;

        state.counter = state.counter.wrapping_add(state.buffered as u128);
        buffer[state.buffered..].fill(0);
        compress(&mut state.h, buffer, state.counter, true);

        let mut digest = [0u8; 64];
        for (bytes, word) in digest.chunks_exact_mut(8).zip(state.h.iter()) {
            bytes.copy_from_slice(&word.to_le_bytes());
        }
        regions.scratch[..state.out_len].copy_from_slice(&digest[..state.out_len]);

        state.buffered = 0;
        state.store(header);
        Ok(())
    }
}
