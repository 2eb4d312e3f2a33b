//! # Storage Module
//!
//! The storage layer owns the database file: a sequence of fixed-size
//! pages numbered from 1, with a 100-byte file header occupying the
//! start of page 1. The [`Pager`] performs all file I/O; nothing above
//! this layer touches the file directly.
//!
//! ## File Layout
//!
//! ```text
//! +--------------------------+
//! | File header (100 bytes)  |  <- page 1 only
//! | Page 1 node data         |
//! +--------------------------+
//! | Page 2                   |
//! +--------------------------+
//! | ...                      |
//! +--------------------------+
//! ```
//!
//! ## Page Size
//!
//! The page size is a power of two of at least 512 bytes, fixed per
//! file and recorded big-endian at offset 0x10 of the header. New files
//! use [`DEFAULT_PAGE_SIZE`].
//!
//! ## Ownership Model
//!
//! `Pager::read_page` hands out an owned [`MemPage`] snapshot of the
//! requested page. Mutations happen on the snapshot and reach the file
//! only through an explicit `write_page`; dropping a snapshot discards
//! it. This keeps page lifetimes scoped without any reference counting.

mod header;
mod pager;

pub use header::{FileHeader, FILE_MAGIC};
pub use pager::{MemPage, Pager};

/// Page size written into freshly created files.
pub const DEFAULT_PAGE_SIZE: u16 = 1024;

/// Smallest page size the header validation accepts.
pub const MIN_PAGE_SIZE: u16 = 512;

/// Length of the file header at the start of page 1.
pub const FILE_HEADER_SIZE: usize = 100;
