use std::collections::BTreeMap;
use std::ops::Bound;

/// Sparse index over one SSTable file.
///
/// Maps every Nth key (by write order, the first key included) to the
/// byte offset where its line starts. A lookup seeks to the floor entry
/// and scans forward at most N lines.
///
/// ```text
/// offset 0    apple red         ← indexed (entry 0)
/// offset 10   banana yellow
/// ...
/// offset 97   kiwi green        ← indexed (entry 10)
/// ```
#[derive(Debug, Clone, Default)]
pub struct SparseIndex {
    entries: BTreeMap<String, u64>,
}

impl SparseIndex {
    pub fn new() -> Self {
        SparseIndex::default()
    }

    pub fn insert(&mut self, key: &str, offset: u64) {
        self.entries.insert(key.to_string(), offset);
    }

    /// Offset of the greatest indexed key `<= key`.
    pub fn floor(&self, key: &str) -> Option<u64> {
        self.entries
            .range::<str, _>((Bound::Unbounded, Bound::Included(key)))
            .next_back()
            .map(|(_, &offset)| offset)
    }

    /// Where a scan for `key` starts: its floor, or the top of the file.
    pub fn seek_offset(&self, key: &str) -> u64 {
        self.floor(key).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, &o)| (k.as_str(), o))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_picks_greatest_key_not_above_target() {
        let mut index = SparseIndex::new();
        index.insert("b", 0);
        index.insert("k", 120);
        index.insert("t", 260);

        assert_eq!(index.floor("a"), None);
        assert_eq!(index.seek_offset("a"), 0);
        assert_eq!(index.floor("b"), Some(0));
        assert_eq!(index.floor("j"), Some(0));
        assert_eq!(index.floor("k"), Some(120));
        assert_eq!(index.floor("s"), Some(120));
        assert_eq!(index.floor("zzz"), Some(260));
    }
}
