//! Full compaction: merge every live SSTable into one.
//!
//! Compaction:
//! 1. Removes superseded values (only the newest version of a key survives)
//! 2. Removes tombstones (nothing older is left for them to mask)
//! 3. Cuts read amplification back to a single table

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::iterator::{MergeIterator, StorageIterator};
use crate::options::TableOptions;
use crate::sstable::SSTable;
use crate::types::Value;

/// Merge `tables` (oldest first, the order the LSM tree keeps them in)
/// into one new table `id` in `dir`. The inputs are left on disk; the
/// caller deletes them once the result is installed.
///
/// Each input is read through its own forward-only cursor, and the
/// cursors are merged by a min-heap keyed on the current head key. Every
/// head is tagged with its table's recency (0 = newest); for a key seen
/// more than once, the accumulating map keeps the occurrence with the
/// lowest tag. This is decided explicitly, not left to heap order.
pub fn compact(tables: &[SSTable], dir: &Path, id: u64, options: TableOptions) -> Result<SSTable> {
    let sources = tables
        .iter()
        .rev()
        .map(|table| -> Result<Box<dyn StorageIterator>> { Ok(Box::new(table.iter()?)) })
        .collect::<Result<Vec<_>>>()?;
    let mut merge = MergeIterator::new(sources);

    let mut merged: BTreeMap<String, (usize, Value)> = BTreeMap::new();
    let mut scanned = 0usize;
    while merge.is_valid() {
        let priority = merge.priority().unwrap_or(usize::MAX);
        match merged.entry(merge.key().to_string()) {
            Entry::Vacant(slot) => {
                slot.insert((priority, merge.value().clone()));
            }
            Entry::Occupied(mut slot) => {
                if priority < slot.get().0 {
                    slot.insert((priority, merge.value().clone()));
                }
            }
        }
        scanned += 1;
        merge.next()?;
    }

    let resolved = merged.len();
    let live: BTreeMap<String, Value> = merged
        .into_iter()
        .filter(|(_, (_, value))| !value.is_tombstone())
        .map(|(key, (_, value))| (key, value))
        .collect();

    let table = SSTable::create(dir, id, &live, options)?;
    info!(
        inputs = tables.len(),
        scanned,
        dropped_versions = scanned - resolved,
        dropped_tombstones = resolved - live.len(),
        output = %table.path().display(),
        entries = table.entry_count(),
        "compaction finished"
    );
    Ok(table)
}
