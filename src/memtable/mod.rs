use std::collections::BTreeMap;
use std::collections::btree_map;
use std::path::Path;

use crate::error::Result;
use crate::options::TableOptions;
use crate::sstable::SSTable;
use crate::types::Value;

/// In-memory sorted buffer for writes.
///
/// Every write goes here first (after the WAL). When the entry count
/// reaches the threshold, the whole table is written out as one SSTable
/// and cleared.
///
/// Deletes are handled via tombstones: you can't just remove the key
/// because older versions may exist in SSTables on disk.
#[derive(Debug, Default)]
pub struct MemTable {
    data: BTreeMap<String, Value>,
}

impl MemTable {
    pub fn new() -> Self {
        MemTable::default()
    }

    /// Insert or update a key-value pair.
    pub fn put(&mut self, key: String, value: String) {
        self.data.insert(key, Value::Present(value));
    }

    /// Mark a key as deleted by writing a tombstone.
    pub fn delete(&mut self, key: String) {
        self.data.insert(key, Value::Tombstone);
    }

    /// Look up a key. `Some(Value::Tombstone)` is a definitive "deleted",
    /// `None` means this table knows nothing about the key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Sorted iterator over all entries, tombstones included.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.data.iter()
    }

    /// Number of entries, tombstones included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if the memtable has reached the flush threshold.
    pub fn is_full(&self, max_entries: usize) -> bool {
        self.data.len() >= max_entries
    }

    /// Write the current contents to a new SSTable `id` in `dir`, then clear.
    ///
    /// If the write fails the table is left untouched, so nothing is lost
    /// and the caller can retry.
    pub fn flush(&mut self, dir: &Path, id: u64, options: TableOptions) -> Result<SSTable> {
        let table = SSTable::create(dir, id, self.data.iter(), options)?;
        self.data.clear();
        Ok(table)
    }
}
