//! # Variable-Length Integer Encoding
//!
//! This module provides the varint32 encoding used by the B-Tree cell
//! format for keys and payload sizes. The encoding is the classic
//! big-endian 7-bits-per-byte continuation scheme: the high bit of each
//! byte marks "more bytes follow", the low seven bits carry the value,
//! most significant group first.
//!
//! ## Fixed-Width Writer
//!
//! The on-disk cell format stores every varint in its padded four-byte
//! form, continuation bit set on the first three bytes:
//!
//! ```text
//! value v (v < 2^28):
//! +-----------------+-----------------+-----------------+-----------------+
//! | 1 vvvvvvv(27-21)| 1 vvvvvvv(20-14)| 1 vvvvvvv(13-7) | 0 vvvvvvv(6-0)  |
//! +-----------------+-----------------+-----------------+-----------------+
//! ```
//!
//! Fixed-width varints keep every cell size a compile-time constant
//! (plus payload), which is what the node layout code relies on. The
//! cost is a 2^28 − 1 ceiling on encodable values; `write_varint32`
//! rejects anything larger rather than truncating.
//!
//! ## Reader
//!
//! `read_varint32` accepts any well-formed continuation sequence of one
//! to five bytes, so it decodes both the padded form above and the
//! minimal form. It returns the value together with the number of bytes
//! consumed.
//!
//! ## Error Handling
//!
//! All failures are reported through `eyre::Result`:
//! - value ≥ 2^28 on encode: "varint32 value out of range"
//! - empty or truncated input on decode: "truncated varint32"
//! - more than five continuation bytes: "varint32 too long"

use eyre::{bail, ensure, Result};

/// Width of every varint the cell codec writes.
pub const VARINT32_SIZE: usize = 4;

/// Largest value the fixed four-byte form can carry.
pub const MAX_VARINT32: u32 = (1 << 28) - 1;

pub fn write_varint32(buf: &mut [u8], value: u32) -> Result<()> {
    ensure!(
        value <= MAX_VARINT32,
        "varint32 value out of range: {} > {}",
        value,
        MAX_VARINT32
    );
    ensure!(
        buf.len() >= VARINT32_SIZE,
        "buffer too small for varint32: {} < {}",
        buf.len(),
        VARINT32_SIZE
    );

    buf[0] = ((value >> 21) & 0x7F) as u8 | 0x80;
    buf[1] = ((value >> 14) & 0x7F) as u8 | 0x80;
    buf[2] = ((value >> 7) & 0x7F) as u8 | 0x80;
    buf[3] = (value & 0x7F) as u8;
    Ok(())
}

pub fn read_varint32(buf: &[u8]) -> Result<(u32, usize)> {
    ensure!(!buf.is_empty(), "truncated varint32: empty buffer");

    let mut value: u32 = 0;
    for (i, &byte) in buf.iter().enumerate().take(5) {
        ensure!(value >> 25 == 0, "varint32 overflows 32 bits");
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    if buf.len() < 5 {
        bail!("truncated varint32: {} byte(s) without terminator", buf.len());
    }
    bail!("varint32 too long: no terminator within 5 bytes");
}
