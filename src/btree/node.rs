//! # B-Tree Node
//!
//! An in-memory view of one page as a B-Tree node: the parsed header
//! fields plus the owned page snapshot they came from. The cell offset
//! array and the cells are edited directly in the page buffer; the
//! header fields live in the struct and reach the buffer when the node
//! is written back.
//!
//! ## Node Header
//!
//! The header starts at byte 100 of page 1 (after the file header) and
//! at byte 0 of every other page:
//!
//! ```text
//! Offset  Size  Field
//! 0       1     node type
//! 1       2     free_offset   (first free byte after the offset array)
//! 3       2     n_cells
//! 5       2     cells_offset  (start of the cell area)
//! 7       1     always 0
//! 8       4     right_page    (internal nodes only)
//! ```
//!
//! All offsets are page-relative, exactly as stored on disk. Free space
//! is the gap `cells_offset - free_offset`; the offset array grows up
//! into it and the cell area grows down into it.
//!
//! ## Lifecycle
//!
//! `load` materializes a node from the pager, `write` persists the
//! header back and hands the page to the pager; dropping a node without
//! writing discards its in-memory mutations. `init_empty` stamps a
//! fresh node onto an allocated page (including the file header when
//! the page is page 1).

use eyre::{ensure, Result};
use zerocopy::big_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::storage::{FileHeader, MemPage, Pager, FILE_HEADER_SIZE};

use super::cell::BTreeCell;
use super::{NodeType, NODE_HEADER_SIZE};

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct NodeHeader {
    node_type: u8,
    free_offset: U16,
    n_cells: U16,
    cells_offset: U16,
    zero: u8,
}

const _: () = assert!(std::mem::size_of::<NodeHeader>() == NODE_HEADER_SIZE);

#[derive(Debug)]
pub struct BTreeNode {
    page: MemPage,
    pub node_type: NodeType,
    pub free_offset: u16,
    pub n_cells: u16,
    pub cells_offset: u16,
    /// Rightmost child. Meaningful on internal nodes only; 0 on leaves.
    pub right_page: u32,
}

impl BTreeNode {
    /// Reads the page and parses the node header.
    pub fn load(pager: &mut Pager, page_no: u32) -> Result<Self> {
        let page = pager.read_page(page_no)?;
        let base = node_base(page_no);
        let data = page.data();
        ensure!(
            data.len() >= base + NODE_HEADER_SIZE,
            "page {} too small for a node header",
            page_no
        );

        let header = NodeHeader::ref_from_bytes(&data[base..base + NODE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read node header on page {}: {:?}", page_no, e))?;
        let node_type = NodeType::from_byte(header.node_type)?;
        let free_offset = header.free_offset.get();
        let n_cells = header.n_cells.get();
        let cells_offset = header.cells_offset.get();

        let right_page = if node_type.is_internal() {
            u32::from_be_bytes([data[base + 8], data[base + 9], data[base + 10], data[base + 11]])
        } else {
            0
        };

        Ok(Self {
            node_type,
            free_offset,
            n_cells,
            cells_offset,
            right_page,
            page,
        })
    }

    /// Serializes the header fields into the page and writes it out.
    /// The offset array and cell area were edited in place already.
    pub fn write(&mut self, pager: &mut Pager) -> Result<()> {
        let base = node_base(self.page.page_no());
        let header = NodeHeader {
            node_type: self.node_type as u8,
            free_offset: U16::new(self.free_offset),
            n_cells: U16::new(self.n_cells),
            cells_offset: U16::new(self.cells_offset),
            zero: 0,
        };
        let data = self.page.data_mut();
        data[base..base + NODE_HEADER_SIZE].copy_from_slice(header.as_bytes());
        if self.node_type.is_internal() {
            data[base + 8..base + 12].copy_from_slice(&self.right_page.to_be_bytes());
        }
        pager.write_page(&self.page)
    }

    /// Stamps an empty node of the given type onto an allocated page
    /// and writes it through. Page 1 also receives the file header.
    pub fn init_empty(pager: &mut Pager, page_no: u32, node_type: NodeType) -> Result<()> {
        let mut page = pager.read_page(page_no)?;
        let base = node_base(page_no);
        let page_size = pager.page_size();

        if page_no == 1 {
            FileHeader::new(page_size).write_to(page.data_mut())?;
        }

        let header = NodeHeader {
            node_type: node_type as u8,
            free_offset: U16::new((base + node_type.header_size()) as u16),
            n_cells: U16::new(0),
            cells_offset: U16::new(page_size),
            zero: 0,
        };
        let data = page.data_mut();
        data[base..base + NODE_HEADER_SIZE].copy_from_slice(header.as_bytes());
        if node_type.is_internal() {
            data[base + 8..base + 12].fill(0);
        }
        pager.write_page(&page)
    }

    /// A detached node over a fresh buffer that belongs to no file
    /// page. Used to reshape a node's cells without touching the file.
    pub fn scratch(page_size: u16, node_type: NodeType) -> Self {
        Self {
            page: MemPage::zeroed(0, page_size),
            node_type,
            free_offset: node_type.header_size() as u16,
            n_cells: 0,
            cells_offset: page_size,
            right_page: 0,
        }
    }

    /// Re-initializes this node in memory as an empty node of the given
    /// type. Stale cell bytes are left in the buffer; they sit outside
    /// the live region and are overwritten as cells are re-added.
    pub fn reset(&mut self, node_type: NodeType) {
        let base = node_base(self.page.page_no());
        self.node_type = node_type;
        self.free_offset = (base + node_type.header_size()) as u16;
        self.n_cells = 0;
        self.cells_offset = self.page.data().len() as u16;
        self.right_page = 0;
    }

    pub fn page_no(&self) -> u32 {
        self.page.page_no()
    }

    pub fn free_space(&self) -> u16 {
        self.cells_offset - self.free_offset
    }

    /// True when inserting `cell` (plus its offset-array slot) would
    /// not fit in the free gap.
    pub fn would_overflow(&self, cell: &BTreeCell) -> bool {
        cell.encoded_size() + 2 > self.free_space() as usize
    }

    fn offsets_base(&self) -> usize {
        node_base(self.page.page_no()) + self.node_type.header_size()
    }

    fn cell_offset_at(&self, i: u16) -> u16 {
        let at = self.offsets_base() + 2 * i as usize;
        let data = self.page.data();
        u16::from_be_bytes([data[at], data[at + 1]])
    }

    /// Decodes the i-th cell in logical key order.
    pub fn cell_at(&self, i: u16) -> Result<BTreeCell<'_>> {
        ensure!(
            i < self.n_cells,
            "cell index {} out of bounds (n_cells {})",
            i,
            self.n_cells
        );
        let offset = self.cell_offset_at(i) as usize;
        let data = self.page.data();
        ensure!(
            offset < data.len(),
            "cell offset {} outside page {}",
            offset,
            self.page.page_no()
        );
        BTreeCell::decode(&data[offset..], self.node_type)
    }

    /// Inserts `cell` at position `i`, shifting later offset-array
    /// slots right. The caller has checked `would_overflow`.
    pub fn insert_cell(&mut self, i: u16, cell: &BTreeCell) -> Result<()> {
        ensure!(
            i <= self.n_cells,
            "cell index {} out of bounds (n_cells {})",
            i,
            self.n_cells
        );
        let len = cell.encoded_size();
        ensure!(
            len + 2 <= self.free_space() as usize,
            "insufficient free space for cell: need {}, have {}",
            len + 2,
            self.free_space()
        );

        let new_cells_offset = self.cells_offset as usize - len;
        let offsets_base = self.offsets_base();
        let slot = offsets_base + 2 * i as usize;
        let slots_end = offsets_base + 2 * self.n_cells as usize;

        let data = self.page.data_mut();
        cell.encode(&mut data[new_cells_offset..])?;
        data.copy_within(slot..slots_end, slot + 2);
        data[slot..slot + 2].copy_from_slice(&(new_cells_offset as u16).to_be_bytes());

        self.cells_offset = new_cells_offset as u16;
        self.free_offset += 2;
        self.n_cells += 1;
        Ok(())
    }
}

fn node_base(page_no: u32) -> usize {
    if page_no == 1 {
        FILE_HEADER_SIZE
    } else {
        0
    }
}
