pub mod merge;

pub use merge::MergeIterator;

use crate::error::Result;
use crate::types::Value;

/// The central iteration abstraction for sorted sources.
///
/// SSTable cursors implement it, and [`MergeIterator`] takes a
/// `Vec<Box<dyn StorageIterator>>` and merges them.
pub trait StorageIterator {
    /// Returns the current key. Only meaningful when is_valid() is true.
    fn key(&self) -> &str;

    /// Returns the current value, tombstones included.
    fn value(&self) -> &Value;

    /// Returns true if the iterator is positioned at a valid entry.
    fn is_valid(&self) -> bool;

    /// Advances to the next entry. Returns error on IO failure.
    fn next(&mut self) -> Result<()>;
}
