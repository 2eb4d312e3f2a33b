//! # acorndb: a page-managed B-Tree storage core
//!
//! acorndb is the storage engine of a small relational database: a
//! single file holding one or more B-Trees in a shared page space,
//! together with the cursor a higher-level execution engine uses to
//! walk them. It owns the on-disk format, keeps trees balanced through
//! pre-emptive splitting, and provides ordered key access and range
//! traversal.
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------+
//! |      Execution engine (external)    |
//! +------------------+------------------+
//! |   Cursor         |   B-Tree engine  |
//! |   (cursor)       |   (btree::tree)  |
//! +------------------+------------------+
//! |        Nodes and cell codec         |
//! |     (btree::node, btree::cell)      |
//! +-------------------------------------+
//! |        Pager and file header        |
//! |             (storage)               |
//! +-------------------------------------+
//! ```
//!
//! ## File Format
//!
//! The file is a sequence of fixed-size pages numbered from 1. Page 1
//! starts with a 100-byte header that identifies the format and fixes
//! the page size; each page holds one B-Tree node. Two node families
//! share the format: table trees map 32-bit keys to opaque rows, index
//! trees map an indexed key to the primary key it refers to.
//!
//! ## Usage
//!
//! ```ignore
//! use acorndb::{BTreeFile, Cursor};
//!
//! let mut file = BTreeFile::open("db.cdb")?;
//! file.insert_in_table(1, 10, b"first row")?;
//!
//! let mut cursor = Cursor::new(&mut file, 1)?;
//! cursor.rewind(&mut file)?;
//! loop {
//!     let cell = cursor.current()?;
//!     // ... read the row ...
//!     if !cursor.step(&mut file, true)? {
//!         break;
//!     }
//! }
//! ```
//!
//! ## Scope
//!
//! Single-threaded and synchronous by design. Deletion, write-ahead
//! logging, and free-space reclamation are not part of the format.

pub mod btree;
pub mod cursor;
pub mod encoding;
pub mod storage;

pub use btree::{BTreeCell, BTreeFile, BTreeNode, NodeType};
pub use cursor::{Cursor, CursorMode};
pub use storage::{MemPage, Pager};
