//! Merkle-Damgard framing shared by MD5 and the SHA family
//!
//! State layout: chain words (8 x u64), total length (u64), buffered byte
//! count (u32), digest length (u32), then one block of buffered input.

use super::{read_u32, read_u64, write_u32, write_u64};
use crate::sandbox::abi::{check_len, Kernel, KernelId, Regions, Trap};
use std::marker::PhantomData;

const CHAIN: usize = 0;
const TOTAL: usize = 64;
const BUFFERED: usize = 72;
const OUT_LEN: usize = 76;
const HEADER: usize = 80;

/// A block compression function plus its padding conventions
pub(crate) trait Compression: Send + Sync + 'static {
    const ID: KernelId;
    const BLOCK: usize;
    /// Width of the trailing message-length field
    const LENGTH_BYTES: usize;
    const BIG_ENDIAN: bool;

    /// Initial chain value and digest length for an `init` parameter
    fn initial(param: Option<u32>) -> Result<([u64; 8], usize), Trap>;

    fn compress(chain: &mut [u64; 8], block: &[u8]);

    /// Serialize the first `out.len()` digest bytes
    fn output(chain: &[u64; 8], out: &mut [u8]);
}

pub(crate) struct MdKernel<C>(PhantomData<C>);

impl<C> MdKernel<C> {
    pub(crate) const fn new() -> Self {
        Self(PhantomData)
    }
}

struct Header {
    chain: [u64; 8],
    total: u64,
    buffered: usize,
    out_len: usize,
}

impl Header {
    fn load<C: Compression>(state: &[u8]) -> Result<Self, Trap> {
        let mut chain = [0u64; 8];
        for (i, word) in chain.iter_mut().enumerate() {
            *word = read_u64(state, CHAIN + i * 8);
        }
        let header = Self {
            chain,
            total: read_u64(state, TOTAL),
            buffered: read_u32(state, BUFFERED) as usize,
            out_len: read_u32(state, OUT_LEN) as usize,
        };
        if header.out_len == 0 || header.out_len > 64 {
            return Err(Trap::CorruptState("digest length"));
        }
        if header.buffered >= C::BLOCK {
            return Err(Trap::CorruptState("buffered length"));
        }
        Ok(header)
    }

    fn store(&self, state: &mut [u8]) {
        for (i, word) in self.chain.iter().enumerate() {
            write_u64(state, CHAIN + i * 8, *word);
        }
        write_u64(state, TOTAL, self.total);
        write_u32(state, BUFFERED, self.buffered as u32);
        write_u32(state, OUT_LEN, self.out_len as u32);
    }
}

impl<C: Compression> Kernel for MdKernel<C> {
    fn id(&self) -> KernelId {
        C::ID
    }

    fn state_size(&self) -> usize {
        HEADER + C::BLOCK
    }

    fn supports_calculate(&self) -> bool {
        true
    }

    fn init(&self, regions: Regions<'_>, param: Option<u32>) -> Result<(), Trap> {
        let (chain, out_len) = C::initial(param)?;
        regions.state.fill(0);
        Header {
            chain,
            total: 0,
            buffered: 0,
            out_len,
        }
        .store(regions.state);
        Ok(())
    }

    fn update(&self, regions: Regions<'_>, len: usize) -> Result<(), Trap> {
        check_len(len, regions.scratch.len())?;
        let (header_bytes, rest) = regions.state.split_at_mut(HEADER);
        let buffer = &mut rest[..C::BLOCK];
        let mut header = Header::load::<C>(header_bytes)?;
        let mut input = &regions.scratch[..len];

        if header.buffered > 0 {
            let take = (C::BLOCK - header.buffered).min(input.len());
            buffer[header.buffered..header.buffered + take].copy_from_slice(&input[..take]);
            header.buffered += take;
            input = &input[take..];
            if header.buffered == C::BLOCK {
                C::compress(&mut header.chain, buffer);
                header.buffered = 0;
            }
        }

        let mut blocks = input.chunks_exact(C::BLOCK);
        for block in &mut blocks {
            C::compress(&mut header.chain, block);
        }
        let tail = blocks.remainder();
        if !tail.is_empty() {
            buffer[..tail.len()].copy_from_slice(tail);
            header.buffered = tail.len();
        }

        header.total = header.total.wrapping_add(len as u64);
        header.store(header_bytes);
        Ok(())
    }

    fn finalize(&self, regions: Regions<'_>, _param: Option<u32>) -> Result<(), Trap> {
        let (header_bytes, rest) = regions.state.split_at_mut(HEADER);
        let buffer = &mut rest[..C::BLOCK];
        let mut header = Header::load::<C>(header_bytes)?;
        check_len(header.out_len, regions.scratch.len())?;

        let bit_len = (header.total as u128) << 3;
        let length_at = C::BLOCK - C::LENGTH_BYTES;

        buffer[header.buffered] = 0x80;
        buffer[header.buffered + 1..].fill(0);
        if header.buffered + 1 > length_at {
            C::compress(&mut header.chain, buffer);
            buffer.fill(0);
        }

        let length_field = &mut buffer[length_at..];
        if C::BIG_ENDIAN {
            length_field.copy_from_slice(&bit_len.to_be_bytes()[16 - C::LENGTH_BYTES..]);
        } else {
            length_field.copy_from_slice(&bit_len.to_le_bytes()[..C::LENGTH_BYTES]);
        }
        C::compress(&mut header.chain, buffer);

        C::output(&header.chain, &mut regions.scratch[..header.out_len]);
        header.buffered = 0;
        header.store(header_bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{md5::Md5, sha1::Sha1, sha256::Sha256, sha512::Sha512};
    use super::*;
    use sha2::Digest;

    fn run<C: Compression>(param: Option<u32>, data: &[u8], split: usize) -> Vec<u8> {
        let kernel = MdKernel::<C>::new();
        let mut scratch = vec![0u8; 256];
        let mut state = vec![0u8; kernel.state_size()];
        let mut aux = Vec::new();
        let mut regions = Regions {
            scratch: &mut scratch,
            state: &mut state,
            aux: &mut aux,
        };

        kernel.init(regions.reborrow(), param).unwrap();
        for part in [&data[..split], &data[split..]] {
            regions.scratch[..part.len()].copy_from_slice(part);
            kernel.update(regions.reborrow(), part.len()).unwrap();
        }
        kernel.finalize(regions.reborrow(), param).unwrap();

        let out_len = read_u32(regions.state, OUT_LEN) as usize;
        regions.scratch[..out_len].to_vec()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            hex::encode(run::<Sha256>(None, b"", 0)),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            hex::encode(run::<Sha1>(None, b"", 0)),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        assert_eq!(
            hex::encode(run::<Md5>(None, b"", 0)),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_padding_boundaries_match_reference() {
        let data: Vec<u8> = (0..200u8).collect();
        // Lengths around the point where the length field spills into an extra block
        for len in [55, 56, 63, 64, 65, 111, 112, 127, 128, 129, 200] {
            let input = &data[..len];
            let split = len / 3;

            assert_eq!(run::<Md5>(None, input, split), ::md5::Md5::digest(input).to_vec());
            assert_eq!(run::<Sha1>(None, input, split), ::sha1::Sha1::digest(input).to_vec());
            assert_eq!(run::<Sha256>(Some(224), input, split), sha2::Sha224::digest(input).to_vec());
            assert_eq!(run::<Sha256>(None, input, split), sha2::Sha256::digest(input).to_vec());
            assert_eq!(run::<Sha512>(Some(384), input, split), sha2::Sha384::digest(input).to_vec());
            assert_eq!(run::<Sha512>(None, input, split), sha2::Sha512::digest(input).to_vec());
        }
    }

    #[test]
    fn test_rejects_unknown_width() {
        let kernel = MdKernel::<Sha256>::new();
        let mut state = vec![0u8; kernel.state_size()];
        let regions = Regions {
            scratch: &mut [],
            state: &mut state,
            aux: &mut [],
        };
        assert!(kernel.init(regions, Some(160)).is_err());
    }
}
