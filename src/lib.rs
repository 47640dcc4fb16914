//! # Durable ordered key-value engines
//!
//! Two independent single-process storage engines built on one idiom:
//! an in-memory structure, a write-ahead log for crash durability, and
//! replay on startup.
//!
//! - [`BTree`]: a balanced multiway tree of integer keys. Every insert
//!   and delete is logged before it is applied; the log is replayed on
//!   open and can be compacted with [`BTree::checkpoint`].
//! - [`LsmTree`]: string keys and values buffered in a sorted MemTable,
//!   flushed to immutable sorted SSTable files with a sparse index, and
//!   merged back into one table by [`LsmTree::compact`].
//!
//! Both engines serialize every public operation behind one mutex and
//! are `Send + Sync`.

pub mod bloom;
pub mod btree;
pub mod compaction;
mod durability;
pub mod error;
pub mod iterator;
pub mod lsm;
pub mod memtable;
pub mod options;
pub mod sstable;
pub mod types;
pub mod wal;

// Public re-exports for the top-level API
pub use btree::BTree;
pub use error::{Error, Result};
pub use lsm::{LsmTree, Stats};
pub use options::{BTreeOptions, LsmOptions};
pub use types::Value;
pub use wal::SyncPolicy;
