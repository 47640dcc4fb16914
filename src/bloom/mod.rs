pub mod builder;

pub use builder::BloomFilterBuilder;

use std::f64::consts::LN_2;

use xxhash_rust::xxh3::xxh3_128;

/// Set-membership filter kept next to each SSTable.
///
/// A `false` from [`may_contain`](Self::may_contain) is exact: the table
/// never held the key and the seek can be skipped. A `true` may be a
/// false positive, at roughly the rate the filter was sized for.
///
/// Rebuilt whenever a table is written or reopened; never stored on disk.
///
/// Sizing for `n` keys at false positive rate `p`:
/// ```text
/// m = -n * ln(p) / ln(2)^2      bits
/// k = (m / n) * ln(2)           probes per key
/// ```
/// Probe `i` lands on `(h1 + i * h2) mod m`, with `h1`/`h2` the two
/// halves of one XXH3-128 hash of the key.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    words: Vec<u64>,
    bit_len: u64,
    probes: u32,
}

impl BloomFilter {
    /// Empty filter sized for `expected_items` keys.
    ///
    /// # Panics
    /// If `expected_items` is 0 or the rate is outside (0, 1).
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        assert!(expected_items > 0, "expected_items must be > 0");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "false positive rate must be in (0, 1)"
        );

        let n = expected_items as f64;
        let bit_len = ((-n * false_positive_rate.ln()) / (LN_2 * LN_2)).ceil() as u64;
        let bit_len = bit_len.max(64);
        let probes = ((bit_len as f64 / n) * LN_2).round().max(1.0) as u32;

        BloomFilter {
            words: vec![0; bit_len.div_ceil(64) as usize],
            bit_len,
            probes,
        }
    }

    pub fn insert(&mut self, key: &[u8]) {
        self.insert_hash(hash_key(key));
    }

    /// Insert by precomputed [`hash_key`] halves.
    pub(crate) fn insert_hash(&mut self, hash: (u64, u64)) {
        for bit in positions(self.bit_len, self.probes, hash) {
            self.words[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
    }

    pub fn may_contain(&self, key: &[u8]) -> bool {
        positions(self.bit_len, self.probes, hash_key(key))
            .all(|bit| self.words[(bit / 64) as usize] & (1u64 << (bit % 64)) != 0)
    }

    pub fn num_hashes(&self) -> u32 {
        self.probes
    }

    pub fn num_bits(&self) -> u64 {
        self.bit_len
    }
}

fn positions(m: u64, probes: u32, (h1, h2): (u64, u64)) -> impl Iterator<Item = u64> {
    (0..probes as u64).map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % m)
}

/// The two 64-bit halves of the key's XXH3-128 hash.
pub(crate) fn hash_key(key: &[u8]) -> (u64, u64) {
    let hash = xxh3_128(key);
    (hash as u64, (hash >> 64) as u64)
}
