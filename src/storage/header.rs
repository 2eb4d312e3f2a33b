//! # File Header
//!
//! The first 100 bytes of page 1 identify the file and fix its page
//! size. Every field except the page size has a single legal value, and
//! `open` validates the lot byte for byte; a file that deviates in any
//! position is rejected as corrupt.
//!
//! ## Layout (all multi-byte fields big-endian)
//!
//! ```text
//! Offset  Size  Field               Fixed value
//! 0x00    16    magic               "SQLite format 3\0"
//! 0x10    2     page_size           (per file)
//! 0x12    6     format bytes        01 01 00 40 20 20
//! 0x18    4     file change counter 0
//! 0x1C    4     reserved            0
//! 0x20    8     unused              0
//! 0x28    4     schema version      0
//! 0x2C    4     format marker       1
//! 0x30    4     page cache size     20000
//! 0x34    4     unused              0
//! 0x38    4     format marker       1
//! 0x3C    4     reserved            0
//! 0x40    4     unused              0
//! 0x44    4     user cookie         0
//! 0x48    28    reserved            0
//! ```
//!
//! The struct is a zerocopy view, so headers are read and written
//! directly against page buffers without intermediate parsing.

use eyre::{ensure, Result};
use zerocopy::big_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{FILE_HEADER_SIZE, MIN_PAGE_SIZE};

pub const FILE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

const FORMAT_BYTES: [u8; 6] = [0x01, 0x01, 0x00, 0x40, 0x20, 0x20];
const PAGE_CACHE_SIZE: u32 = 20000;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct FileHeader {
    magic: [u8; 16],
    page_size: U16,
    format: [u8; 6],
    file_change_counter: U32,
    reserved_1c: [u8; 4],
    unused_20: [u8; 8],
    schema_version: U32,
    format_marker_2c: U32,
    page_cache_size: U32,
    unused_34: U32,
    format_marker_38: U32,
    reserved_3c: [u8; 4],
    unused_40: U32,
    user_cookie: U32,
    reserved_tail: [u8; 28],
}

const _: () = assert!(std::mem::size_of::<FileHeader>() == FILE_HEADER_SIZE);

impl FileHeader {
    pub fn new(page_size: u16) -> Self {
        Self {
            magic: *FILE_MAGIC,
            page_size: U16::new(page_size),
            format: FORMAT_BYTES,
            file_change_counter: U32::new(0),
            reserved_1c: [0; 4],
            unused_20: [0; 8],
            schema_version: U32::new(0),
            format_marker_2c: U32::new(1),
            page_cache_size: U32::new(PAGE_CACHE_SIZE),
            unused_34: U32::new(0),
            format_marker_38: U32::new(1),
            reserved_3c: [0; 4],
            unused_40: U32::new(0),
            user_cookie: U32::new(0),
            reserved_tail: [0; 28],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE,
            "buffer too small for FileHeader: {} < {}",
            bytes.len(),
            FILE_HEADER_SIZE
        );
        Self::ref_from_bytes(&bytes[..FILE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read FileHeader: {:?}", e))
    }

    pub fn write_to(&self, bytes: &mut [u8]) -> Result<()> {
        ensure!(
            bytes.len() >= FILE_HEADER_SIZE,
            "buffer too small for FileHeader: {} < {}",
            bytes.len(),
            FILE_HEADER_SIZE
        );
        bytes[..FILE_HEADER_SIZE].copy_from_slice(self.as_bytes());
        Ok(())
    }

    pub fn page_size(&self) -> u16 {
        self.page_size.get()
    }

    /// Rejects any header that differs from a freshly written one in
    /// anything but the page size, which must itself be a power of two
    /// of at least 512.
    pub fn validate(&self) -> Result<()> {
        let page_size = self.page_size.get();
        ensure!(
            page_size.is_power_of_two() && page_size >= MIN_PAGE_SIZE,
            "corrupt file header: bad page size {}",
            page_size
        );

        let expected = Self::new(page_size);
        ensure!(
            self.as_bytes() == expected.as_bytes(),
            "corrupt file header: fixed field mismatch"
        );
        Ok(())
    }
}
