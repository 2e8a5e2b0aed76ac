//! Block matrix and the memory-filling passes
//!
//! Memory is `lanes` rows of `lane_len` 1 KiB blocks; every lane is cut into
//! four slices of `segment_len` blocks. All lanes finish a slice before any
//! lane starts the next one, which is the only cross-lane ordering rule.

use super::params::{Argon2Request, Argon2Variant};
use crate::engine::PrimitiveEngine;
use crate::error::Result;
use crate::sandbox::{ARGON2_BLOCK_SIZE, ARGON2_OUT, ARGON2_PREV, ARGON2_REF};

pub(crate) const BLOCK_SIZE: usize = ARGON2_BLOCK_SIZE;
const WORDS: usize = BLOCK_SIZE / 8;
const SYNC_POINTS: u32 = 4;
static ZERO_BLOCK: [u8; BLOCK_SIZE] = [0; BLOCK_SIZE];

/// Shape of the block matrix for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub lanes: u32,
    pub lane_len: u32,
    pub segment_len: u32,
    pub blocks: u32,
    pub passes: u32,
    pub variant: Argon2Variant,
}

impl Geometry {
    pub(crate) fn new(request: &Argon2Request) -> Self {
        let blocks = request.effective_blocks();
        let lanes = request.parallelism;
        let lane_len = blocks / lanes;
        Self {
            lanes,
            lane_len,
            segment_len: lane_len / SYNC_POINTS,
            blocks,
            passes: request.iterations,
            variant: request.variant,
        }
    }

    #[inline]
    fn index(&self, lane: u32, column: u32) -> usize {
        (lane * self.lane_len + column) as usize
    }

    /// Column of the reference block for position `index` of a segment
    fn reference_column(&self, pass: u32, slice: u32, index: u32, same_lane: bool, j1: u32) -> u32 {
        let area = match (pass, same_lane) {
            (0, _) if slice == 0 => index - 1,
            (0, true) => slice * self.segment_len + index - 1,
            (0, false) => slice * self.segment_len - u32::from(index == 0),
            (_, true) => self.lane_len - self.segment_len + index - 1,
            (_, false) => self.lane_len - self.segment_len - u32::from(index == 0),
        };

        let area = u64::from(area);
        let x = (u64::from(j1) * u64::from(j1)) >> 32;
        let relative = area - 1 - ((area * x) >> 32);

        let start = if pass == 0 || slice == SYNC_POINTS - 1 {
            0
        } else {
            u64::from((slice + 1) * self.segment_len)
        };
        ((start + relative) % u64::from(self.lane_len)) as u32
    }
}

/// Contiguous, zeroed-on-drop storage for every block
pub(crate) struct BlockMatrix {
    geometry: Geometry,
    data: Vec<u8>,
}

impl BlockMatrix {
    pub(crate) fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            data: vec![0u8; geometry.blocks as usize * BLOCK_SIZE],
        }
    }

    pub(crate) fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    fn block(&self, index: usize) -> &[u8] {
        &self.data[index * BLOCK_SIZE..(index + 1) * BLOCK_SIZE]
    }

    fn block_mut(&mut self, index: usize) -> &mut [u8] {
        &mut self.data[index * BLOCK_SIZE..(index + 1) * BLOCK_SIZE]
    }

    /// Block at `column` of `lane`
    pub(crate) fn lane_block_mut(&mut self, lane: u32, column: u32) -> &mut [u8] {
        let index = self.geometry.index(lane, column);
        self.block_mut(index)
    }

    fn first_word(&self, index: usize) -> u64 {
        let mut word = [0u8; 8];
        word.copy_from_slice(&self.block(index)[..8]);
        u64::from_le_bytes(word)
    }

    /// XOR of the last block of every lane
    pub(crate) fn final_block(&self) -> Vec<u8> {
        let last = self.geometry.lane_len - 1;
        let mut out = self.block(self.geometry.index(0, last)).to_vec();
        for lane in 1..self.geometry.lanes {
            let block = self.block(self.geometry.index(lane, last));
            out.iter_mut().zip(block).for_each(|(o, b)| *o ^= b);
        }
        out
    }

    /// Run every pass over the matrix, mixing through `mixer`
    pub(crate) fn fill(&mut self, mixer: &mut BlockMixer) -> Result<()> {
        let geometry = self.geometry;
        for pass in 0..geometry.passes {
            for slice in 0..SYNC_POINTS {
                for lane in 0..geometry.lanes {
                    self.fill_segment(mixer, pass, slice, lane)?;
                }
            }
        }
        Ok(())
    }

    fn fill_segment(&mut self, mixer: &mut BlockMixer, pass: u32, slice: u32, lane: u32) -> Result<()> {
        let geometry = self.geometry;
        let data_independent = geometry.variant.data_independent(pass, slice);

        let mut addresses = AddressGenerator::new(&geometry, pass, lane, slice);
        let mut address_block = [0u64; WORDS];

        let start = if pass == 0 && slice == 0 {
            if data_independent {
                address_block = addresses.next(mixer)?;
            }
            2
        } else {
            0
        };

        for i in start..geometry.segment_len {
            let column = slice * geometry.segment_len + i;
            let prev_column = if column == 0 { geometry.lane_len - 1 } else { column - 1 };
            let prev = geometry.index(lane, prev_column);

            let rand = if data_independent {
                if i % WORDS as u32 == 0 {
                    address_block = addresses.next(mixer)?;
                }
                address_block[i as usize % WORDS]
            } else {
                self.first_word(prev)
            };

            let ref_lane = if pass == 0 && slice == 0 {
                lane
            } else {
                ((rand >> 32) % u64::from(geometry.lanes)) as u32
            };
            let ref_column = geometry.reference_column(pass, slice, i, ref_lane == lane, rand as u32);
            let reference = geometry.index(ref_lane, ref_column);
            let current = geometry.index(lane, column);

            let base = if pass == 0 { &ZERO_BLOCK[..] } else { self.block(current) };
            mixer.load(base, self.block(prev), self.block(reference))?;
            mixer.mix()?;
            mixer.store(self.block_mut(current));
        }
        Ok(())
    }
}

impl Drop for BlockMatrix {
    fn drop(&mut self) {
        self.data.fill(0);
    }
}

/// Counter-driven pseudo-random block source for data-independent addressing
struct AddressGenerator {
    input: [u8; BLOCK_SIZE],
    counter: u64,
}

impl AddressGenerator {
    fn new(geometry: &Geometry, pass: u32, lane: u32, slice: u32) -> Self {
        let mut input = [0u8; BLOCK_SIZE];
        let words = [
            u64::from(pass),
            u64::from(lane),
            u64::from(slice),
            u64::from(geometry.blocks),
            u64::from(geometry.passes),
            u64::from(geometry.variant.type_code()),
        ];
        for (i, word) in words.iter().enumerate() {
            input[i * 8..(i + 1) * 8].copy_from_slice(&word.to_le_bytes());
        }
        Self { input, counter: 0 }
    }

    /// `G(0, G(0, input))` with the counter advanced first
    fn next(&mut self, mixer: &mut BlockMixer) -> Result<[u64; WORDS]> {
        self.counter += 1;
        self.input[48..56].copy_from_slice(&self.counter.to_le_bytes());

        mixer.load(&ZERO_BLOCK, &ZERO_BLOCK, &self.input)?;
        mixer.mix()?;
        let mut once = [0u8; BLOCK_SIZE];
        mixer.store(&mut once);

        mixer.load(&ZERO_BLOCK, &ZERO_BLOCK, &once)?;
        mixer.mix()?;
        let mut twice = [0u8; BLOCK_SIZE];
        mixer.store(&mut twice);

        let mut words = [0u64; WORDS];
        for (word, chunk) in words.iter_mut().zip(twice.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *word = u64::from_le_bytes(bytes);
        }
        Ok(words)
    }
}

/// Compression `G` executed inside the `argon2` primitive module
pub(crate) struct BlockMixer {
    engine: PrimitiveEngine,
}

impl BlockMixer {
    pub(crate) fn new(mut engine: PrimitiveEngine) -> Result<Self> {
        engine.init(None)?;
        Ok(Self { engine })
    }

    /// Stage the block to XOR into, the previous block and the reference block
    fn load(&mut self, base: &[u8], prev: &[u8], reference: &[u8]) -> Result<()> {
        self.engine.write(base, ARGON2_OUT)?;
        self.engine.write(prev, ARGON2_PREV)?;
        self.engine.write(reference, ARGON2_REF)
    }

    fn mix(&mut self) -> Result<()> {
        self.engine.invoke(0, None, None)
    }

    fn store(&self, out: &mut [u8]) {
        out.copy_from_slice(&self.engine.scratch()[ARGON2_OUT..ARGON2_OUT + BLOCK_SIZE]);
    }
}

impl Drop for BlockMixer {
    fn drop(&mut self) {
        // Wipe the staged blocks; the engine is dropped right after
        let _ = self.engine.init(None);
    }
}
