//! # Cell Codec
//!
//! Cells are the key/payload units stored inside a node's cell area.
//! Each node type has its own cell layout; the codec is a pure function
//! of a byte region and a cell value.
//!
//! ## Layouts (multi-byte integers big-endian, varints four bytes wide)
//!
//! ```text
//! Table internal (8 B):  child_page u32 | key varint32
//! Table leaf  (8 B + n): data_size varint32 | key varint32 | data
//! Index internal (16 B): child_page u32 | 0B 03 04 04 | key_idx u32 | key_pk u32
//! Index leaf (12 B):     0B 03 04 04 | key_idx u32 | key_pk u32
//! ```
//!
//! ## Zero-Copy Payloads
//!
//! `decode` borrows the table-leaf payload from the page buffer: the
//! returned [`BTreeCell`] carries a `&[u8]` view, never a copy. Callers
//! that need the payload past the node's lifetime copy it themselves.

use eyre::{bail, ensure, Result};

use crate::encoding::{read_varint32, write_varint32, VARINT32_SIZE};

use super::NodeType;

/// Marker bytes index cells carry between the child pointer and keys.
pub const INDEX_CELL_MAGIC: [u8; 4] = [0x0B, 0x03, 0x04, 0x04];

pub const TABLE_INTERNAL_CELL_SIZE: usize = 4 + VARINT32_SIZE;
pub const TABLE_LEAF_CELL_HEADER_SIZE: usize = 2 * VARINT32_SIZE;
pub const INDEX_INTERNAL_CELL_SIZE: usize = 16;
pub const INDEX_LEAF_CELL_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BTreeCell<'a> {
    TableInternal {
        child_page: u32,
        key: u32,
    },
    TableLeaf {
        key: u32,
        data: &'a [u8],
    },
    IndexInternal {
        child_page: u32,
        key_idx: u32,
        key_pk: u32,
    },
    IndexLeaf {
        key_idx: u32,
        key_pk: u32,
    },
}

impl<'a> BTreeCell<'a> {
    /// The key this cell is ordered by.
    pub fn key(&self) -> u32 {
        match *self {
            BTreeCell::TableInternal { key, .. } => key,
            BTreeCell::TableLeaf { key, .. } => key,
            BTreeCell::IndexInternal { key_idx, .. } => key_idx,
            BTreeCell::IndexLeaf { key_idx, .. } => key_idx,
        }
    }

    /// Child pointer, for internal cells.
    pub fn child_page(&self) -> Option<u32> {
        match *self {
            BTreeCell::TableInternal { child_page, .. } => Some(child_page),
            BTreeCell::IndexInternal { child_page, .. } => Some(child_page),
            _ => None,
        }
    }

    /// Primary key carried by index cells.
    pub fn key_pk(&self) -> Option<u32> {
        match *self {
            BTreeCell::IndexInternal { key_pk, .. } => Some(key_pk),
            BTreeCell::IndexLeaf { key_pk, .. } => Some(key_pk),
            _ => None,
        }
    }

    /// The node type this cell belongs in.
    pub fn node_type(&self) -> NodeType {
        match self {
            BTreeCell::TableInternal { .. } => NodeType::TableInternal,
            BTreeCell::TableLeaf { .. } => NodeType::TableLeaf,
            BTreeCell::IndexInternal { .. } => NodeType::IndexInternal,
            BTreeCell::IndexLeaf { .. } => NodeType::IndexLeaf,
        }
    }

    /// Number of bytes `encode` will occupy.
    pub fn encoded_size(&self) -> usize {
        match self {
            BTreeCell::TableInternal { .. } => TABLE_INTERNAL_CELL_SIZE,
            BTreeCell::TableLeaf { data, .. } => TABLE_LEAF_CELL_HEADER_SIZE + data.len(),
            BTreeCell::IndexInternal { .. } => INDEX_INTERNAL_CELL_SIZE,
            BTreeCell::IndexLeaf { .. } => INDEX_LEAF_CELL_SIZE,
        }
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<()> {
        let size = self.encoded_size();
        ensure!(
            buf.len() >= size,
            "buffer too small for cell: {} < {}",
            buf.len(),
            size
        );

        match *self {
            BTreeCell::TableInternal { child_page, key } => {
                buf[0..4].copy_from_slice(&child_page.to_be_bytes());
                write_varint32(&mut buf[4..8], key)?;
            }
            BTreeCell::TableLeaf { key, data } => {
                write_varint32(&mut buf[0..4], data.len() as u32)?;
                write_varint32(&mut buf[4..8], key)?;
                buf[8..8 + data.len()].copy_from_slice(data);
            }
            BTreeCell::IndexInternal {
                child_page,
                key_idx,
                key_pk,
            } => {
                buf[0..4].copy_from_slice(&child_page.to_be_bytes());
                buf[4..8].copy_from_slice(&INDEX_CELL_MAGIC);
                buf[8..12].copy_from_slice(&key_idx.to_be_bytes());
                buf[12..16].copy_from_slice(&key_pk.to_be_bytes());
            }
            BTreeCell::IndexLeaf { key_idx, key_pk } => {
                buf[0..4].copy_from_slice(&INDEX_CELL_MAGIC);
                buf[4..8].copy_from_slice(&key_idx.to_be_bytes());
                buf[8..12].copy_from_slice(&key_pk.to_be_bytes());
            }
        }
        Ok(())
    }

    /// Decodes the cell starting at `buf[0]`, interpreted per the
    /// owning node's type.
    pub fn decode(buf: &'a [u8], node_type: NodeType) -> Result<Self> {
        match node_type {
            NodeType::TableInternal => {
                ensure!(
                    buf.len() >= TABLE_INTERNAL_CELL_SIZE,
                    "truncated table internal cell: {} bytes",
                    buf.len()
                );
                let child_page = read_be_u32(&buf[0..4]);
                let (key, _) = read_varint32(&buf[4..])?;
                Ok(BTreeCell::TableInternal { child_page, key })
            }
            NodeType::TableLeaf => {
                ensure!(
                    buf.len() >= TABLE_LEAF_CELL_HEADER_SIZE,
                    "truncated table leaf cell: {} bytes",
                    buf.len()
                );
                let (data_size, n_size) = read_varint32(buf)?;
                let (key, n_key) = read_varint32(&buf[n_size..])?;
                let data_start = n_size + n_key;
                let data_end = data_start + data_size as usize;
                ensure!(
                    buf.len() >= data_end,
                    "table leaf cell data extends past page end: {} > {}",
                    data_end,
                    buf.len()
                );
                Ok(BTreeCell::TableLeaf {
                    key,
                    data: &buf[data_start..data_end],
                })
            }
            NodeType::IndexInternal => {
                ensure!(
                    buf.len() >= INDEX_INTERNAL_CELL_SIZE,
                    "truncated index internal cell: {} bytes",
                    buf.len()
                );
                check_index_magic(&buf[4..8])?;
                Ok(BTreeCell::IndexInternal {
                    child_page: read_be_u32(&buf[0..4]),
                    key_idx: read_be_u32(&buf[8..12]),
                    key_pk: read_be_u32(&buf[12..16]),
                })
            }
            NodeType::IndexLeaf => {
                ensure!(
                    buf.len() >= INDEX_LEAF_CELL_SIZE,
                    "truncated index leaf cell: {} bytes",
                    buf.len()
                );
                check_index_magic(&buf[0..4])?;
                Ok(BTreeCell::IndexLeaf {
                    key_idx: read_be_u32(&buf[4..8]),
                    key_pk: read_be_u32(&buf[8..12]),
                })
            }
        }
    }
}

fn read_be_u32(buf: &[u8]) -> u32 {
    u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

fn check_index_magic(bytes: &[u8]) -> Result<()> {
    if bytes != INDEX_CELL_MAGIC.as_slice() {
        bail!("index cell magic mismatch: {:02x?}", bytes);
    }
    Ok(())
}
