//! MD5 compression (RFC 1321)

use super::md::Compression;
use crate::sandbox::abi::{KernelId, Trap};

const IV: [u32; 4] = [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476];

const SHIFTS: [[u32; 4]; 4] = [[7, 12, 17, 22], [5, 9, 14, 20], [4, 11, 16, 23], [6, 10, 15, 21]];

const K: [u32; 64] = [
    0xd76aa478, 0xe8c7b756, 0x242070db, 0xc1bdceee, 0xf57c0faf, 0x4787c62a, 0xa8304613, 0xfd469501,
    0x698098d8, 0x8b44f7af, 0xffff5bb1, 0x895cd7be, 0x6b901122, 0xfd987193, 0xa679438e, 0x49b40821,
    0xf61e2562, 0xc040b340, 0x265e5a51, 0xe9b6c7aa, 0xd62f105d, 0x02441453, 0xd8a1e681, 0xe7d3fbc8,
    0x21e1cde6, 0xc33707d6, 0xf4d50d87, 0x455a14ed, 0xa9e3e905, 0xfcefa3f8, 0x676f02d9, 0x8d2a4c8a,
    0xfffa3942, 0x8771f681, 0x6d9d6122, 0xfde5380c, 0xa4beea44, 0x4bdecfa9, 0xf6bb4b60, 0xbebfbc70,
    0x289b7ec6, 0xeaa127fa, 0xd4ef3085, 0x04881d05, 0xd9d4d039, 0xe6db99e5, 0x1fa27cf8, 0xc4ac5665,
    0xf4292244, 0x432aff97, 0xab9423a7, 0xfc93a039, 0x655b59c3, 0x8f0ccc92, 0xffeff47d, 0x85845dd1,
    0x6fa87e4f, 0xfe2ce6e0, 0xa3014314, 0x4e0811a1, 0xf7537e82, 0xbd3af235, 0x2ad7d2bb, 0xeb86d391,
];

pub(crate) struct Md5;

impl Compression for Md5 {
    const ID: KernelId = KernelId::Md5;
    const BLOCK: usize = 64;
    const LENGTH_BYTES: usize = 8;
    const BIG_ENDIAN: bool = false;

    fn initial(param: Option<u32>) -> Result<([u64; 8], usize), Trap> {
        match param {
            None | Some(128) => {
                let mut chain = [0u64; 8];
                for (slot, word) in chain.iter_mut().zip(IV) {
                    *slot = word as u64;
                }
                Ok((chain, 16))
            }
            Some(other) => Err(Trap::InvalidParam(other)),
        }
    }

    fn compress(chain: &mut [u64; 8], block: &[u8]) {
        let mut m = [0u32; 16];
        for (word, bytes) in m.iter_mut().zip(block.chunks_exact(4)) {
            *word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }

        let [mut a, mut b, mut c, mut d] = [chain[0] as u32, chain[1] as u32, chain[2] as u32, chain[3] as u32];

        for i in 0..64 {
            let (f, g) = match i / 16 {
                0 => ((b & c) | (!b & d), i),
                1 => ((d & b) | (!d & c), (5 * i + 1) % 16),
                2 => (b ^ c ^ d, (3 * i + 5) % 16),
                _ => (c ^ (b | !d), (7 * i) % 16),
            };
            let rotated = a
                .wrapping_add(f)
                .wrapping_add(K[i])
                .wrapping_add(m[g])
                .rotate_left(SHIFTS[i / 16][i % 4]);
            a = d;
            d = c;
            c = b;
            b = b.wrapping_add(rotated);
        }

        chain[0] = (chain[0] as u32).wrapping_add(a) as u64;
        chain[1] = (chain[1] as u32).wrapping_add(b) as u64;
        chain[2] = (chain[2] as u32).wrapping_add(c) as u64;
        chain[3] = (chain[3] as u32).wrapping_add(d) as u64;
    }

    fn output(chain: &[u64; 8], out: &mut [u8]) {
        for (bytes, word) in out.chunks_mut(4).zip(chain.iter()) {
            bytes.copy_from_slice(&(*word as u32).to_le_bytes()[..bytes.len()]);
        }
    }
}
