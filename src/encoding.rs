//! Hex and base64 codecs

use crate::error::{HashError, Result};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

const fn build_hex_table() -> [[u8; 2]; 256] {
    let mut table = [[0u8; 2]; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = [HEX_DIGITS[i >> 4], HEX_DIGITS[i & 0x0f]];
        i += 1;
    }
    table
}

/// Nibble pair for every byte value
static HEX_TABLE: [[u8; 2]; 256] = build_hex_table();

/// Lowercase hex rendering of `bytes`
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        let [hi, lo] = HEX_TABLE[byte as usize];
        out.push(hi as char);
        out.push(lo as char);
    }
    out
}

/// Standard-alphabet base64, with or without `=` padding
pub fn encode_base64(bytes: &[u8], padded: bool) -> String {
    if padded {
        STANDARD.encode(bytes)
    } else {
        STANDARD_NO_PAD.encode(bytes)
    }
}

/// Decode unpadded standard-alphabet base64, rejecting non-canonical input
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    STANDARD_NO_PAD
        .decode(text)
        .map_err(|e| HashError::format("base64", e.to_string()))
}
