//! Split-heavy scenarios: bulk inserts, full forward and backward
//! traversal, index trees, and a structural walk that checks node
//! invariants after the tree has been reshaped many times.

use acorndb::{BTreeCell, BTreeFile, Cursor, NodeType};
use tempfile::tempdir;

fn open_file(dir: &tempfile::TempDir) -> BTreeFile {
    BTreeFile::open(dir.path().join("x.cdb")).unwrap()
}

fn insert_rows(file: &mut BTreeFile, root: u32, keys: impl Iterator<Item = u32>) {
    for key in keys {
        let payload = [key as u8; 10];
        file.insert_in_table(root, key, &payload).unwrap();
    }
}

mod forced_split {
    use super::*;

    #[test]
    fn two_hundred_rows_split_the_root_and_stay_findable() {
        let dir = tempdir().unwrap();
        let mut file = open_file(&dir);

        insert_rows(&mut file, 1, 1..=200);

        let root = file.node(1).unwrap();
        assert_eq!(root.node_type, NodeType::TableInternal);

        for key in 1..=200u32 {
            let data = file.find(1, key).unwrap();
            assert_eq!(data, Some(vec![key as u8; 10]), "key {} lost", key);
        }
    }

    #[test]
    fn forward_traversal_emits_every_key_in_order() {
        let dir = tempdir().unwrap();
        let mut file = open_file(&dir);
        insert_rows(&mut file, 1, 1..=200);

        let mut cursor = Cursor::new(&mut file, 1).unwrap();
        cursor.rewind(&mut file).unwrap();

        let mut keys = vec![cursor.current().unwrap().key()];
        while cursor.step(&mut file, true).unwrap() {
            keys.push(cursor.current().unwrap().key());
        }

        assert_eq!(keys, (1..=200).collect::<Vec<u32>>());
        // a further step in the same direction stays put
        assert!(!cursor.step(&mut file, true).unwrap());
        assert_eq!(cursor.current().unwrap().key(), 200);
    }

    #[test]
    fn backward_traversal_is_the_exact_reverse() {
        let dir = tempdir().unwrap();
        let mut file = open_file(&dir);
        insert_rows(&mut file, 1, 1..=200);

        let mut cursor = Cursor::new(&mut file, 1).unwrap();
        cursor.rewind_to_last(&mut file).unwrap();

        let mut keys = Vec::new();
        while cursor.step(&mut file, false).unwrap() {
            keys.push(cursor.current().unwrap().key());
        }

        assert_eq!(keys, (1..=200).rev().collect::<Vec<u32>>());
        assert!(!cursor.step(&mut file, false).unwrap());
        assert_eq!(cursor.current().unwrap().key(), 1);
    }

    #[test]
    fn shuffled_inserts_traverse_sorted() {
        let dir = tempdir().unwrap();
        let mut file = open_file(&dir);

        // deterministic shuffle of 1..=200
        let keys = (1..=200u32).map(|k| (k * 73) % 211).filter(|&k| k != 0);
        insert_rows(&mut file, 1, keys);

        let mut cursor = Cursor::new(&mut file, 1).unwrap();
        cursor.rewind(&mut file).unwrap();
        let mut seen = vec![cursor.current().unwrap().key()];
        while cursor.step(&mut file, true).unwrap() {
            seen.push(cursor.current().unwrap().key());
        }

        assert_eq!(seen.len(), 200);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }
}

mod index_trees {
    use super::*;

    #[test]
    fn index_insert_and_duplicate_rejection() {
        let dir = tempdir().unwrap();
        let mut file = open_file(&dir);
        let root = file.new_node(NodeType::IndexLeaf).unwrap();

        file.insert_in_index(root, 42, 7).unwrap();

        let result = file.insert_in_index(root, 42, 8);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("duplicate key"));

        let node = file.node(root).unwrap();
        assert_eq!(node.n_cells, 1);
        match node.cell_at(0).unwrap() {
            BTreeCell::IndexLeaf { key_idx, key_pk } => {
                assert_eq!(key_idx, 42);
                assert_eq!(key_pk, 7);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn index_entries_survive_splits_with_their_primary_keys() {
        let dir = tempdir().unwrap();
        let mut file = open_file(&dir);
        let root = file.new_node(NodeType::IndexLeaf).unwrap();

        for key in 1..=500u32 {
            file.insert_in_index(root, key, 1_000_000 + key).unwrap();
        }

        let node = file.node(root).unwrap();
        assert_eq!(node.node_type, NodeType::IndexInternal);
        drop(node);

        // every entry is in the tree exactly once, pk intact
        let mut seen = std::collections::BTreeMap::new();
        collect_index_entries(&mut file, root, &mut seen);
        assert_eq!(seen.len(), 500);
        for (key, pk) in seen {
            assert_eq!(pk, 1_000_000 + key, "wrong pk for key {}", key);
        }
    }

    fn collect_index_entries(
        file: &mut BTreeFile,
        page_no: u32,
        out: &mut std::collections::BTreeMap<u32, u32>,
    ) {
        let node = file.node(page_no).unwrap();
        let mut children = Vec::new();
        for i in 0..node.n_cells {
            let cell = node.cell_at(i).unwrap();
            let prev = out.insert(cell.key(), cell.key_pk().unwrap());
            assert!(prev.is_none(), "key {} appears twice", cell.key());
            if let Some(child) = cell.child_page() {
                children.push(child);
            }
        }
        if node.node_type.is_internal() {
            children.push(node.right_page);
        }
        drop(node);
        for child in children {
            collect_index_entries(file, child, out);
        }
    }
}

mod structural_invariants {
    use super::*;

    struct WalkStats {
        leaf_depths: Vec<usize>,
        leaf_cells: u64,
    }

    /// Walks a table tree checking, for every node: the free gap is not
    /// inverted, keys are strictly increasing, each subtree respects
    /// the (lower, upper] bound its parent separator implies, and
    /// internal non-root nodes have at least two children.
    fn check_subtree(
        file: &mut BTreeFile,
        page_no: u32,
        lower: Option<u32>,
        upper: Option<u32>,
        depth: usize,
        is_root: bool,
        stats: &mut WalkStats,
    ) {
        let node = file.node(page_no).unwrap();
        assert!(
            node.cells_offset >= node.free_offset,
            "free gap inverted on page {}",
            page_no
        );

        let mut keys = Vec::new();
        let mut children = Vec::new();
        for i in 0..node.n_cells {
            let cell = node.cell_at(i).unwrap();
            keys.push(cell.key());
            if let Some(child) = cell.child_page() {
                children.push(child);
            }
        }
        assert!(
            keys.windows(2).all(|w| w[0] < w[1]),
            "keys out of order on page {}",
            page_no
        );
        if let (Some(lo), Some(&first)) = (lower, keys.first()) {
            assert!(first > lo, "page {} violates lower bound {}", page_no, lo);
        }
        if let (Some(hi), Some(&last)) = (upper, keys.last()) {
            assert!(last <= hi, "page {} violates upper bound {}", page_no, hi);
        }

        let is_leaf = node.node_type.is_leaf();
        let right_page = node.right_page;
        let n_cells = node.n_cells;
        drop(node);

        if is_leaf {
            stats.leaf_depths.push(depth);
            stats.leaf_cells += u64::from(n_cells);
            return;
        }

        // counting right_page, an internal node has n_cells + 1 children
        if !is_root {
            assert!(n_cells >= 1, "internal page {} has one child", page_no);
        }

        let mut child_lower = lower;
        for (i, &child) in children.iter().enumerate() {
            check_subtree(
                file,
                child,
                child_lower,
                Some(keys[i]),
                depth + 1,
                false,
                stats,
            );
            child_lower = Some(keys[i]);
        }
        check_subtree(file, right_page, keys.last().copied(), upper, depth + 1, false, stats);
    }

    #[test]
    fn tree_shape_holds_after_many_splits() {
        let dir = tempdir().unwrap();
        let mut file = open_file(&dir);
        insert_rows(&mut file, 1, 1..=500);

        let mut stats = WalkStats {
            leaf_depths: Vec::new(),
            leaf_cells: 0,
        };
        check_subtree(&mut file, 1, None, None, 0, true, &mut stats);

        assert_eq!(stats.leaf_cells, 500);
        let first_depth = stats.leaf_depths[0];
        assert!(
            stats.leaf_depths.iter().all(|&d| d == first_depth),
            "leaves at unequal depths: {:?}",
            stats.leaf_depths
        );
        assert!(first_depth >= 1, "500 rows did not split the root");
    }

    #[test]
    fn traversal_agrees_with_walk_count() {
        let dir = tempdir().unwrap();
        let mut file = open_file(&dir);
        insert_rows(&mut file, 1, (1..=350u32).rev());

        let mut cursor = Cursor::new(&mut file, 1).unwrap();
        cursor.rewind(&mut file).unwrap();
        let mut count = 1u64;
        let mut prev = cursor.current().unwrap().key();
        while cursor.step(&mut file, true).unwrap() {
            let key = cursor.current().unwrap().key();
            assert!(key > prev, "key {} emitted after {}", key, prev);
            prev = key;
            count += 1;
        }

        assert_eq!(count, 350);
    }
}
