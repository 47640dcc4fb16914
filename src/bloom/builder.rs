use crate::bloom::{BloomFilter, hash_key};

/// Collects key hashes while an SSTable is written, then sizes the
/// filter for the exact key count once the table is finished.
///
/// Usage during SSTable build:
/// 1. Create BloomFilterBuilder with the target false positive rate
/// 2. Call add_key() for every key written to the SSTable
/// 3. Call build() to get the final BloomFilter
pub struct BloomFilterBuilder {
    hashes: Vec<(u64, u64)>,
    false_positive_rate: f64,
}

impl BloomFilterBuilder {
    pub fn new(false_positive_rate: f64) -> Self {
        BloomFilterBuilder {
            hashes: Vec::new(),
            false_positive_rate,
        }
    }

    pub fn add_key(&mut self, key: &[u8]) {
        self.hashes.push(hash_key(key));
    }

    /// Finalize. An empty table still gets a (minimum-size, all-zero) filter.
    pub fn build(self) -> BloomFilter {
        let mut filter = BloomFilter::new(self.hashes.len().max(1), self.false_positive_rate);
        for hash in self.hashes {
            filter.insert_hash(hash);
        }
        filter
    }
}
