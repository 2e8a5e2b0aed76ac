//! Variable-length hash `H'` built from BLAKE2b hashers

use crate::engine::Registry;
use crate::error::{HashError, Result};
use crate::hash::{create_blake2b, Hasher, HasherHandle};

const FULL: usize = 64;
const HALF: usize = 32;

/// Digest size of the last BLAKE2b call for an `len`-byte output
fn tail_len(len: usize) -> usize {
    if len <= FULL {
        len
    } else {
        len - HALF * rounds(len)
    }
}

/// Number of 32-byte chunks emitted before the tail
fn rounds(len: usize) -> usize {
    len.div_ceil(HALF) - 2
}

/// `H'` for 1024-byte blocks and one chosen output length.
///
/// BLAKE2b digest sizes are fixed per hasher, so every size the computation
/// will need is instantiated up front and the hashing itself never awaits.
pub(crate) struct VariableHash {
    full: HasherHandle,
    tail: Option<HasherHandle>,
}

impl VariableHash {
    /// Hashers covering block-sized outputs and `output_len`
    pub(crate) async fn new(registry: &Registry, output_len: usize) -> Result<Self> {
        let full = create_blake2b(registry, (FULL * 8) as u32, None).await?;
        let tail = match tail_len(output_len) {
            FULL => None,
            len => Some(create_blake2b(registry, (len * 8) as u32, None).await?),
        };
        Ok(Self { full, tail })
    }

    /// BLAKE2b-512 over the concatenation of `parts`
    pub(crate) fn blake2b_512(&mut self, parts: &[&[u8]]) -> Result<Vec<u8>> {
        self.full.init()?;
        for part in parts {
            self.full.update(part)?;
        }
        self.full.digest()
    }

    fn sized(&mut self, len: usize) -> Result<&mut HasherHandle> {
        if len == FULL {
            return Ok(&mut self.full);
        }
        match self.tail.as_mut() {
            Some(tail) if tail.digest_size() == len => Ok(tail),
            _ => Err(HashError::computation(
                "blake2b",
                format!("no {}-byte hasher prepared for H'", len),
            )),
        }
    }

    /// `H'(parts, len)` written into `out`, whose length selects the output size
    pub(crate) fn output(&mut self, parts: &[&[u8]], out: &mut [u8]) -> Result<()> {
        let len = out.len();
        let prefix = (len as u32).to_le_bytes();

        if len <= FULL {
            let hasher = self.sized(len)?;
            hasher.init()?;
            hasher.update(&prefix)?;
            for part in parts {
                hasher.update(part)?;
            }
            out.copy_from_slice(&hasher.digest()?);
            return Ok(());
        }

        let rounds = rounds(len);
        let mut v = {
            let mut input: Vec<&[u8]> = Vec::with_capacity(parts.len() + 1);
            input.push(&prefix);
            input.extend_from_slice(parts);
            self.blake2b_512(&input)?
        };
        out[..HALF].copy_from_slice(&v[..HALF]);

        for i in 1..rounds {
            v = self.blake2b_512(&[&v[..]])?;
            out[i * HALF..(i + 1) * HALF].copy_from_slice(&v[..HALF]);
        }

        let tail = self.sized(tail_len(len))?;
        tail.init()?;
        tail.update(&v)?;
        out[rounds * HALF..].copy_from_slice(&tail.digest()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use blake2::digest::{Update, VariableOutput};
    use blake2::Blake2bVar;

    fn blake2b(len: usize, data: &[u8]) -> Vec<u8> {
        let mut hasher = Blake2bVar::new(len).unwrap();
        hasher.update(data);
        let mut out = vec![0u8; len];
        hasher.finalize_variable(&mut out).unwrap();
        out
    }

    /// Straightforward `H'` over the reference BLAKE2b
    fn reference(input: &[u8], len: usize) -> Vec<u8> {
        let prefixed = [&(len as u32).to_le_bytes()[..], input].concat();
        if len <= 64 {
            return blake2b(len, &prefixed);
        }
        let r = len.div_ceil(32) - 2;
        let mut v = blake2b(64, &prefixed);
        let mut out = v[..32].to_vec();
        for _ in 1..r {
            v = blake2b(64, &v);
            out.extend_from_slice(&v[..32]);
        }
        out.extend(blake2b(len - 32 * r, &v));
        out
    }

    #[test]
    fn test_tail_lengths() {
        assert_eq!(tail_len(16), 16);
        assert_eq!(tail_len(64), 64);
        assert_eq!(tail_len(65), 33);
        assert_eq!(tail_len(100), 36);
        assert_eq!(tail_len(1024), 64);
    }

    #[tokio::test]
    async fn test_matches_reference() {
        let registry = Registry::new(RuntimeConfig::default());
        let input = b"variable length hashing input";

        for len in [4, 16, 63, 64, 65, 96, 100, 128, 1024] {
            let mut hash = VariableHash::new(&registry, len).await.unwrap();
            let mut out = vec![0u8; len];
            hash.output(&[&input[..10], &input[10..]], &mut out).unwrap();
            assert_eq!(out, reference(input, len), "{} bytes", len);

            // Block-sized output is always available
            let mut block = vec![0u8; 1024];
            hash.output(&[&input[..]], &mut block).unwrap();
            assert_eq!(block, reference(input, 1024));
        }
    }

    #[tokio::test]
    async fn test_unprepared_size_fails() {
        let registry = Registry::new(RuntimeConfig::default());
        let mut hash = VariableHash::new(&registry, 32).await.unwrap();
        let mut out = vec![0u8; 20];
        assert!(hash.output(&[b"x".as_slice()], &mut out).is_err());
    }
}
