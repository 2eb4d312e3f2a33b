//! # B-Tree Engine
//!
//! This module implements the tree-level operations over a database
//! file: opening and bootstrapping the file, point lookup, insertion,
//! and node splitting.
//!
//! ## Open Protocol
//!
//! ```text
//! file absent or empty  -> write file header + empty table leaf at page 1
//! file has content      -> validate all fixed header bytes, adopt its
//!                          page size; any mismatch is fatal
//! ```
//!
//! ## Insertion Strategy
//!
//! Insertion splits pre-emptively on the way down instead of detecting
//! overflow at the leaf and unwinding:
//!
//! 1. If the root itself cannot take the cell, the root's content moves
//!    to a fresh sibling page, the root is re-initialized in place as an
//!    internal node pointing at it, and that sibling is split. The root
//!    page number therefore never changes.
//! 2. Descent then walks internal nodes. Before stepping into a child
//!    that cannot take the cell, the child is split and the descent
//!    restarts at the same parent, since the promoted separator may change
//!    which child the key routes to.
//! 3. The leaf reached this way always has room.
//!
//! ## Split
//!
//! A split moves the cells below the median into a freshly allocated
//! left sibling and promotes the median key into the parent as a
//! separator pointing at that sibling:
//!
//! ```text
//!           parent                          parent
//!         .-------.                    .---+--------.
//!         |  ...  |        =>          | K |  ...   |
//!         '-------'                    '-/-+--------'
//!            |                          /        |
//!          child                     left      child
//!      [c0 .. cK .. cn]           [c0..cK?]  [cK+1..cn]
//! ```
//!
//! Table leaves keep the median cell in the left sibling (the separator
//! in the parent carries the key but no payload); every other node type
//! hands the median over entirely: its key (and primary key, for index
//! nodes) moves into the separator, and for internal nodes its child
//! pointer becomes the left sibling's rightmost child.
//!
//! The child is reshaped through a detached scratch buffer, so no
//! transient page is ever allocated in the file.
//!
//! ## Duplicates
//!
//! Both tree families hold distinct keys. An insert that meets its own
//! key on any level fails without touching the tree.

use std::path::Path;

use eyre::{bail, ensure, Result};

use crate::storage::{FileHeader, Pager, DEFAULT_PAGE_SIZE, FILE_HEADER_SIZE};

use super::cell::BTreeCell;
use super::node::BTreeNode;
use super::NodeType;

#[derive(Debug)]
pub struct BTreeFile {
    pager: Pager,
}

impl BTreeFile {
    /// Opens a database file, bootstrapping an empty one if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut pager = Pager::open(path)?;

        if pager.is_empty() {
            pager.set_page_size(DEFAULT_PAGE_SIZE);
            let mut file = Self { pager };
            let root = file.new_node(NodeType::TableLeaf)?;
            ensure!(root == 1, "fresh file bootstrapped root at page {}", root);
            return Ok(file);
        }

        let mut header_buf = [0u8; FILE_HEADER_SIZE];
        pager
            .read_header(&mut header_buf)
            .map_err(|e| eyre::eyre!("corrupt file header: {}", e))?;
        let header = FileHeader::from_bytes(&header_buf)?;
        header.validate()?;
        pager.set_page_size(header.page_size());

        Ok(Self { pager })
    }

    /// Flushes the pager and drops the handle.
    pub fn close(self) -> Result<()> {
        self.pager.close()
    }

    pub fn page_size(&self) -> u16 {
        self.pager.page_size()
    }

    /// Allocates a fresh page and initializes it as an empty node.
    pub fn new_node(&mut self, node_type: NodeType) -> Result<u32> {
        let page_no = self.pager.allocate_page();
        BTreeNode::init_empty(&mut self.pager, page_no, node_type)?;
        Ok(page_no)
    }

    /// Re-initializes an already allocated page as an empty node.
    pub fn init_empty_node(&mut self, page_no: u32, node_type: NodeType) -> Result<()> {
        BTreeNode::init_empty(&mut self.pager, page_no, node_type)
    }

    /// Loads the node stored at `page_no`.
    pub fn node(&mut self, page_no: u32) -> Result<BTreeNode> {
        BTreeNode::load(&mut self.pager, page_no)
    }

    /// Writes a node's header and page back to the file.
    pub fn write_node(&mut self, node: &mut BTreeNode) -> Result<()> {
        node.write(&mut self.pager)
    }

    /// Looks up `key` in the table B-Tree rooted at `root`, returning a
    /// copy of the payload when present.
    pub fn find(&mut self, root: u32, key: u32) -> Result<Option<Vec<u8>>> {
        let mut page_no = root;

        loop {
            let node = self.node(page_no)?;
            let mut next: Option<u32> = None;

            for i in 0..node.n_cells {
                let cell = node.cell_at(i)?;
                if node.node_type == NodeType::TableLeaf && cell.key() == key {
                    if let BTreeCell::TableLeaf { data, .. } = cell {
                        return Ok(Some(data.to_vec()));
                    }
                }
                if key <= cell.key() {
                    if node.node_type.is_leaf() {
                        return Ok(None);
                    }
                    let Some(child) = cell.child_page() else {
                        bail!("malformed internal node on page {}", page_no);
                    };
                    next = Some(child);
                    break;
                }
            }

            page_no = match next {
                Some(child) => child,
                None if node.node_type.is_leaf() => return Ok(None),
                None => node.right_page,
            };
        }
    }

    /// Inserts a table row.
    pub fn insert_in_table(&mut self, root: u32, key: u32, data: &[u8]) -> Result<()> {
        self.insert(root, &BTreeCell::TableLeaf { key, data })
    }

    /// Inserts an index entry mapping `key_idx` to `key_pk`.
    pub fn insert_in_index(&mut self, root: u32, key_idx: u32, key_pk: u32) -> Result<()> {
        self.insert(root, &BTreeCell::IndexLeaf { key_idx, key_pk })
    }

    /// Inserts a cell into the tree rooted at `root`, splitting the
    /// root first when it is full.
    pub fn insert(&mut self, root: u32, cell: &BTreeCell) -> Result<()> {
        let root_node = self.node(root)?;

        if root_node.would_overflow(cell) {
            let root_type = root_node.node_type;
            let new_right_no = self.new_node(root_type)?;
            let mut new_right = self.node(new_right_no)?;

            for i in 0..root_node.n_cells {
                let c = root_node.cell_at(i)?;
                new_right.insert_cell(i, &c)?;
            }
            new_right.right_page = root_node.right_page;
            drop(root_node);

            // The root is reshaped in place so its page number survives.
            self.init_empty_node(root, root_type.internal_variant())?;
            let mut root_node = self.node(root)?;
            root_node.right_page = new_right_no;
            root_node.write(&mut self.pager)?;
            new_right.write(&mut self.pager)?;
            drop(root_node);
            drop(new_right);

            self.split(root, new_right_no, 0)?;
        }

        self.insert_nonfull(root, cell)
    }

    /// Inserts into a subtree whose top node is known to have room.
    /// Children that would overflow are split before descending.
    fn insert_nonfull(&mut self, page_no: u32, cell: &BTreeCell) -> Result<()> {
        let mut page_no = page_no;

        loop {
            let node = self.node(page_no)?;

            if node.node_type.is_leaf() {
                ensure!(
                    node.node_type == cell.node_type(),
                    "cell type {:?} does not belong in a {:?} node",
                    cell.node_type(),
                    node.node_type
                );

                let mut pos = node.n_cells;
                for i in 0..node.n_cells {
                    let existing = node.cell_at(i)?.key();
                    if existing == cell.key() {
                        bail!("duplicate key {}", existing);
                    }
                    if cell.key() < existing {
                        pos = i;
                        break;
                    }
                }

                let mut node = node;
                node.insert_cell(pos, cell)?;
                return node.write(&mut self.pager);
            }

            let mut route: Option<(u32, u16)> = None;
            for i in 0..node.n_cells {
                let c = node.cell_at(i)?;
                if c.key() == cell.key() {
                    bail!("duplicate key {}", c.key());
                }
                if c.key() > cell.key() {
                    let Some(child) = c.child_page() else {
                        bail!("malformed internal node on page {}", page_no);
                    };
                    route = Some((child, i));
                    break;
                }
            }
            let (child, index) = route.unwrap_or((node.right_page, node.n_cells));
            drop(node);

            let child_node = self.node(child)?;
            let full = child_node.would_overflow(cell);
            drop(child_node);

            if full {
                self.split(page_no, child, index)?;
                // the new separator may reroute the key; rescan this node
                continue;
            }
            page_no = child;
        }
    }

    /// Splits `child_no` around its median: cells below the median move
    /// to a new left sibling, the median becomes a separator in the
    /// parent at position `parent_ncell`. Returns the sibling's page.
    pub fn split(&mut self, parent_no: u32, child_no: u32, parent_ncell: u16) -> Result<u32> {
        let mut parent = self.node(parent_no)?;
        ensure!(
            parent.node_type.is_internal(),
            "split parent on page {} is not an internal node",
            parent_no
        );
        let mut child = self.node(child_no)?;
        ensure!(
            child.n_cells > 0,
            "cannot split empty node on page {}",
            child_no
        );

        let median = child.n_cells / 2;
        let left_no = self.new_node(child.node_type)?;
        let mut left = self.node(left_no)?;

        for i in 0..median {
            let c = child.cell_at(i)?;
            left.insert_cell(i, &c)?;
        }

        let median_cell = child.cell_at(median)?;
        let separator_key = median_cell.key();
        let median_child = median_cell.child_page();
        let median_pk = median_cell.key_pk();
        if child.node_type == NodeType::TableLeaf {
            // leaves keep their data; the row stays retrievable here
            left.insert_cell(median, &median_cell)?;
        }

        if let Some(child_page) = median_child {
            left.right_page = child_page;
        }

        // Reshape the child down to the post-median cells. Going
        // through a detached scratch node keeps transient state out of
        // the file entirely.
        let mut kept = BTreeNode::scratch(self.pager.page_size(), child.node_type);
        for i in median + 1..child.n_cells {
            let c = child.cell_at(i)?;
            kept.insert_cell(i - median - 1, &c)?;
        }

        let child_right = child.right_page;
        child.reset(child.node_type);
        child.right_page = child_right;
        for i in 0..kept.n_cells {
            let c = kept.cell_at(i)?;
            child.insert_cell(i, &c)?;
        }

        let separator = if parent.node_type.is_table() {
            BTreeCell::TableInternal {
                child_page: left_no,
                key: separator_key,
            }
        } else {
            let Some(key_pk) = median_pk else {
                bail!("index separator for page {} has no primary key", child_no);
            };
            BTreeCell::IndexInternal {
                child_page: left_no,
                key_idx: separator_key,
                key_pk,
            }
        };
        parent.insert_cell(parent_ncell, &separator)?;

        parent.write(&mut self.pager)?;
        child.write(&mut self.pager)?;
        left.write(&mut self.pager)?;
        Ok(left_no)
    }
}
