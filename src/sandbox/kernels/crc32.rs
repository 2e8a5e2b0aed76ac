//! Reflected CRC-32 with a caller-chosen polynomial
//!
//! The 256-entry lookup table lives in auxiliary memory, tagged with the
//! polynomial it was built for, and is rebuilt by `init` and `resume`.

use super::{read_u32, write_u32};
use crate::sandbox::abi::{check_len, Kernel, KernelId, Regions, Trap};

/// IEEE 802.3 polynomial, reflected
const IEEE: u32 = 0xEDB8_8320;

const CRC: usize = 0;
const POLYNOMIAL: usize = 4;
const STATE_SIZE: usize = 8;

const TABLE_TAG: usize = 0;
const TABLE: usize = 4;
const AUX_SIZE: usize = TABLE + 256 * 4;

pub(crate) struct Crc32Kernel;

fn build_table(aux: &mut [u8], polynomial: u32) {
    if read_u32(aux, TABLE_TAG) == polynomial {
        return;
    }
    for i in 0..256u32 {
        let mut c = i;
        for _ in 0..8 {
            c = if c & 1 != 0 { polynomial ^ (c >> 1) } else { c >> 1 };
        }
        write_u32(aux, TABLE + i as usize * 4, c);
    }
    write_u32(aux, TABLE_TAG, polynomial);
}

fn load_polynomial(state: &[u8]) -> Result<u32, Trap> {
    match read_u32(state, POLYNOMIAL) {
        0 => Err(Trap::CorruptState("polynomial")),
        polynomial => Ok(polynomial),
    }
}

impl Kernel for Crc32Kernel {
    fn id(&self) -> KernelId {
        KernelId::Crc32
    }

    fn state_size(&self) -> usize {
        STATE_SIZE
    }

    fn aux_size(&self) -> usize {
        AUX_SIZE
    }

    fn supports_calculate(&self) -> bool {
        true
    }

    fn init(&self, regions: Regions<'_>, param: Option<u32>) -> Result<(), Trap> {
        let polynomial = param.unwrap_or(IEEE);
        if polynomial == 0 {
            return Err(Trap::InvalidParam(polynomial));
        }
        build_table(regions.aux, polynomial);
        write_u32(regions.state, CRC, 0xFFFF_FFFF);
        write_u32(regions.state, POLYNOMIAL, polynomial);
        Ok(())
    }

    fn update(&self, regions: Regions<'_>, len: usize) -> Result<(), Trap> {
        check_len(len, regions.scratch.len())?;
        let polynomial = load_polynomial(regions.state)?;
        if read_u32(regions.aux, TABLE_TAG) != polynomial {
            return Err(Trap::CorruptState("lookup table"));
        }

        let table = &regions.aux[TABLE..];
        let mut crc = read_u32(regions.state, CRC);
        for &byte in &regions.scratch[..len] {
            let index = ((crc ^ byte as u32) & 0xff) as usize;
            crc = read_u32(table, index * 4) ^ (crc >> 8);
        }
        write_u32(regions.state, CRC, crc);
        Ok(())
    }

    fn finalize(&self, regions: Regions<'_>, _param: Option<u32>) -> Result<(), Trap> {
        load_polynomial(regions.state)?;
        check_len(4, regions.scratch.len())?;
        let crc = !read_u32(regions.state, CRC);
        regions.scratch[..4].copy_from_slice(&crc.to_be_bytes());
        Ok(())
    }

    fn resume(&self, regions: Regions<'_>) -> Result<(), Trap> {
        let polynomial = load_polynomial(regions.state)?;
        build_table(regions.aux, polynomial);
        Ok(())
    }
}
