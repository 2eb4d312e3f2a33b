//! # Traversal Cursor
//!
//! A cursor walks the rows of a table B-Tree in key order, forward or
//! backward. Nodes on disk carry no parent pointers, so the cursor owns
//! its path instead: the **trail**, a root-to-leaf sequence of
//! (node, cell index) pairs. Each trail entry owns its node's page
//! snapshot, which bounds every node's lifetime by the trail that holds
//! it and lets the current cell be decoded straight out of the leaf
//! snapshot with no caching.
//!
//! ## Positioning
//!
//! ```text
//! rewind             rewind_to_last
//!   root @ 0            root @ n_cells
//!   ...  @ 0            ...  @ n_cells
//!   leaf @ 0            leaf @ n_cells   (one past the end)
//! ```
//!
//! After `rewind`, `current()` is the first cell of the tree. After
//! `rewind_to_last` the leaf sits one past its end, so the first
//! backward step lands on, and emits, the last cell.
//!
//! ## Stepping
//!
//! `step` moves within the leaf when it can. At a leaf edge it finds
//! the deepest ancestor with another child in the step direction,
//! advances that ancestor's index, and descends into the adjacent
//! subtree (leftmost cell going forward, rightmost going backward). An
//! internal entry's index ranges over `0..=n_cells`, where `n_cells`
//! addresses the rightmost child. When no ancestor can advance, the
//! cursor is at the end of the tree: `step` returns `Ok(false)` and the
//! trail stays exactly where it was, so stepping back in the opposite
//! direction keeps working.

use eyre::{bail, ensure, Result};
use smallvec::SmallVec;

use crate::btree::{BTreeCell, BTreeFile, BTreeNode};

/// How the owning statement intends to use the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorMode {
    #[default]
    Unspecified,
    Read,
    Write,
}

#[derive(Debug)]
struct TrailEntry {
    node: BTreeNode,
    cell_index: u16,
}

#[derive(Debug)]
pub struct Cursor {
    mode: CursorMode,
    root_page: u32,
    trail: SmallVec<[TrailEntry; 8]>,
}

impl Cursor {
    /// Creates a cursor over the tree rooted at `root_page`, positioned
    /// at the root. Call `rewind` or `rewind_to_last` before stepping.
    pub fn new(file: &mut BTreeFile, root_page: u32) -> Result<Self> {
        let node = file.node(root_page)?;
        let mut trail = SmallVec::new();
        trail.push(TrailEntry {
            node,
            cell_index: 0,
        });
        Ok(Self {
            mode: CursorMode::Unspecified,
            root_page,
            trail,
        })
    }

    pub fn mode(&self) -> CursorMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CursorMode) {
        self.mode = mode;
    }

    pub fn root_page(&self) -> u32 {
        self.root_page
    }

    /// Moves to the first cell of the tree.
    pub fn rewind(&mut self, file: &mut BTreeFile) -> Result<()> {
        self.trail.clear();
        let root = file.node(self.root_page)?;
        self.trail.push(TrailEntry {
            node: root,
            cell_index: 0,
        });
        self.descend(file, true)
    }

    /// Moves one past the last cell of the tree, so that the first
    /// backward step emits the last cell.
    pub fn rewind_to_last(&mut self, file: &mut BTreeFile) -> Result<()> {
        self.trail.clear();
        let root = file.node(self.root_page)?;
        self.trail.push(TrailEntry {
            cell_index: root.n_cells,
            node: root,
        });

        loop {
            let top = &self.trail[self.trail.len() - 1];
            if top.node.node_type.is_leaf() {
                return Ok(());
            }
            let next = top.node.right_page;
            let node = file.node(next)?;
            self.trail.push(TrailEntry {
                cell_index: node.n_cells,
                node,
            });
        }
    }

    /// Decodes the cell the cursor is standing on.
    pub fn current(&self) -> Result<BTreeCell<'_>> {
        ensure!(!self.trail.is_empty(), "cursor has no position");
        let top = &self.trail[self.trail.len() - 1];
        top.node.cell_at(top.cell_index)
    }

    /// Steps one cell forward (`true`) or backward (`false`). Returns
    /// `Ok(false)`, leaving the position unchanged, when the tree has
    /// no further cell in that direction.
    pub fn step(&mut self, file: &mut BTreeFile, forward: bool) -> Result<bool> {
        ensure!(!self.trail.is_empty(), "cursor has no position");
        let top = &self.trail[self.trail.len() - 1];
        ensure!(
            top.node.node_type.is_leaf(),
            "cursor is not positioned at a leaf; rewind first"
        );

        // Within the current leaf.
        let n_cells = top.node.n_cells;
        if forward {
            if top.cell_index + 1 < n_cells {
                let top = self.top_mut();
                top.cell_index += 1;
                return Ok(true);
            }
        } else if top.cell_index > 0 {
            let top = self.top_mut();
            top.cell_index -= 1;
            return Ok(true);
        }

        // Leaf exhausted: find the deepest ancestor with another child
        // in the step direction. If none exists the tree is exhausted
        // and the trail must not move.
        let mut anchor = None;
        for depth in (0..self.trail.len().saturating_sub(1)).rev() {
            let entry = &self.trail[depth];
            let can_advance = if forward {
                entry.cell_index < entry.node.n_cells
            } else {
                entry.cell_index > 0
            };
            if can_advance {
                anchor = Some(depth);
                break;
            }
        }
        let Some(depth) = anchor else {
            return Ok(false);
        };

        self.trail.truncate(depth + 1);
        let entry = &mut self.trail[depth];
        if forward {
            entry.cell_index += 1;
        } else {
            entry.cell_index -= 1;
        }
        self.descend(file, forward)?;
        Ok(true)
    }

    /// Pushes trail entries from the current top down to a leaf:
    /// leftmost path going forward, rightmost going backward. Backward
    /// descent leaves the leaf on its last cell.
    fn descend(&mut self, file: &mut BTreeFile, forward: bool) -> Result<()> {
        loop {
            let top = &self.trail[self.trail.len() - 1];
            if top.node.node_type.is_leaf() {
                return Ok(());
            }

            let next = if top.cell_index < top.node.n_cells {
                let cell = top.node.cell_at(top.cell_index)?;
                let Some(child) = cell.child_page() else {
                    bail!(
                        "malformed internal node on page {}",
                        top.node.page_no()
                    );
                };
                child
            } else {
                top.node.right_page
            };

            let node = file.node(next)?;
            let cell_index = if forward {
                0
            } else if node.node_type.is_leaf() {
                node.n_cells.saturating_sub(1)
            } else {
                node.n_cells
            };
            self.trail.push(TrailEntry { node, cell_index });
        }
    }

    fn top_mut(&mut self) -> &mut TrailEntry {
        let last = self.trail.len() - 1;
        &mut self.trail[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_test_file() -> (tempfile::TempDir, BTreeFile) {
        let dir = tempdir().unwrap();
        let file = BTreeFile::open(dir.path().join("test.db")).unwrap();
        (dir, file)
    }

    fn collect_forward(file: &mut BTreeFile, root: u32) -> Vec<u32> {
        let mut cursor = Cursor::new(file, root).unwrap();
        cursor.rewind(file).unwrap();

        let mut keys = vec![cursor.current().unwrap().key()];
        while cursor.step(file, true).unwrap() {
            keys.push(cursor.current().unwrap().key());
        }
        keys
    }

    fn collect_backward(file: &mut BTreeFile, root: u32) -> Vec<u32> {
        let mut cursor = Cursor::new(file, root).unwrap();
        cursor.rewind_to_last(file).unwrap();

        let mut keys = Vec::new();
        while cursor.step(file, false).unwrap() {
            keys.push(cursor.current().unwrap().key());
        }
        keys
    }

    #[test]
    fn step_on_empty_tree_cannot_move() {
        let (_dir, mut file) = open_test_file();
        let mut cursor = Cursor::new(&mut file, 1).unwrap();
        cursor.rewind(&mut file).unwrap();

        assert!(!cursor.step(&mut file, true).unwrap());
        assert!(!cursor.step(&mut file, false).unwrap());
    }

    #[test]
    fn single_leaf_forward_walk() {
        let (_dir, mut file) = open_test_file();
        for key in [30u32, 10, 20] {
            file.insert_in_table(1, key, b"row").unwrap();
        }

        assert_eq!(collect_forward(&mut file, 1), vec![10, 20, 30]);
    }

    #[test]
    fn single_leaf_backward_walk() {
        let (_dir, mut file) = open_test_file();
        for key in [30u32, 10, 20] {
            file.insert_in_table(1, key, b"row").unwrap();
        }

        assert_eq!(collect_backward(&mut file, 1), vec![30, 20, 10]);
    }

    #[test]
    fn multi_leaf_forward_walk_is_sorted_and_complete() {
        let (_dir, mut file) = open_test_file();
        for key in (1..=150u32).rev() {
            file.insert_in_table(1, key, &[0x55; 16]).unwrap();
        }

        let keys = collect_forward(&mut file, 1);
        assert_eq!(keys, (1..=150).collect::<Vec<u32>>());
    }

    #[test]
    fn multi_leaf_backward_walk_is_exact_reverse() {
        let (_dir, mut file) = open_test_file();
        for key in 1..=150u32 {
            file.insert_in_table(1, key, &[0x55; 16]).unwrap();
        }

        let keys = collect_backward(&mut file, 1);
        assert_eq!(keys, (1..=150).rev().collect::<Vec<u32>>());
    }

    #[test]
    fn exhausted_cursor_can_turn_around() {
        let (_dir, mut file) = open_test_file();
        for key in 1..=5u32 {
            file.insert_in_table(1, key, b"row").unwrap();
        }

        let mut cursor = Cursor::new(&mut file, 1).unwrap();
        cursor.rewind(&mut file).unwrap();
        while cursor.step(&mut file, true).unwrap() {}

        // at the last cell, a failed forward step must not move us
        assert_eq!(cursor.current().unwrap().key(), 5);
        assert!(cursor.step(&mut file, false).unwrap());
        assert_eq!(cursor.current().unwrap().key(), 4);
    }

    #[test]
    fn turn_around_across_leaf_boundary() {
        let (_dir, mut file) = open_test_file();
        for key in 1..=150u32 {
            file.insert_in_table(1, key, &[0x55; 16]).unwrap();
        }

        let mut cursor = Cursor::new(&mut file, 1).unwrap();
        cursor.rewind(&mut file).unwrap();
        for _ in 0..80 {
            assert!(cursor.step(&mut file, true).unwrap());
        }
        assert_eq!(cursor.current().unwrap().key(), 81);

        for _ in 0..40 {
            assert!(cursor.step(&mut file, false).unwrap());
        }
        assert_eq!(cursor.current().unwrap().key(), 41);
    }

    #[test]
    fn rewind_returns_to_first_cell() {
        let (_dir, mut file) = open_test_file();
        for key in 1..=50u32 {
            file.insert_in_table(1, key, &[0x55; 16]).unwrap();
        }

        let mut cursor = Cursor::new(&mut file, 1).unwrap();
        cursor.rewind(&mut file).unwrap();
        for _ in 0..20 {
            cursor.step(&mut file, true).unwrap();
        }

        cursor.rewind(&mut file).unwrap();
        assert_eq!(cursor.current().unwrap().key(), 1);
    }

    #[test]
    fn current_payload_matches_row() {
        let (_dir, mut file) = open_test_file();
        file.insert_in_table(1, 7, b"payload seven").unwrap();

        let mut cursor = Cursor::new(&mut file, 1).unwrap();
        cursor.rewind(&mut file).unwrap();

        match cursor.current().unwrap() {
            BTreeCell::TableLeaf { key, data } => {
                assert_eq!(key, 7);
                assert_eq!(data, b"payload seven");
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn mode_defaults_to_unspecified() {
        let (_dir, mut file) = open_test_file();
        let mut cursor = Cursor::new(&mut file, 1).unwrap();

        assert_eq!(cursor.mode(), CursorMode::Unspecified);
        cursor.set_mode(CursorMode::Write);
        assert_eq!(cursor.mode(), CursorMode::Write);
    }
}
