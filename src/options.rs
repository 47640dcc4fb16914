use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::wal::SyncPolicy;

/// Default B-Tree minimum degree.
pub const DEFAULT_MIN_DEGREE: usize = 3;

/// Default MemTable capacity in entries (tombstones included).
pub const DEFAULT_MEMTABLE_SIZE: usize = 1000;

/// Every Nth SSTable entry gets a sparse index slot.
pub const DEFAULT_INDEX_INTERVAL: usize = 10;

/// Target false positive rate of each SSTable's bloom filter.
pub const DEFAULT_BLOOM_FPR: f64 = 0.01;

/// Configuration for [`crate::BTree`].
#[derive(Debug, Clone)]
pub struct BTreeOptions {
    /// Minimum degree `t`: non-root nodes hold `t-1..=2t-1` keys.
    pub min_degree: usize,
    /// Log file; created, along with missing parent directories, on open.
    pub wal_path: PathBuf,
    /// How far each logged mutation is pushed before the call returns.
    pub sync_policy: SyncPolicy,
}

impl BTreeOptions {
    pub fn new(wal_path: impl Into<PathBuf>) -> Self {
        BTreeOptions {
            min_degree: DEFAULT_MIN_DEGREE,
            wal_path: wal_path.into(),
            sync_policy: SyncPolicy::EveryWrite,
        }
    }

    pub fn with_min_degree(mut self, t: usize) -> Self {
        self.min_degree = t;
        self
    }

    pub fn with_sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.min_degree < 2 {
            return Err(Error::InvalidInput(format!(
                "min_degree must be >= 2, got {}",
                self.min_degree
            )));
        }
        Ok(())
    }
}

/// Configuration for [`crate::LsmTree`].
#[derive(Debug, Clone)]
pub struct LsmOptions {
    /// MemTable flush threshold, counted in entries.
    pub memtable_size: usize,
    /// Log of writes not yet flushed; cleared after every flush.
    pub wal_path: PathBuf,
    /// Where SSTable files live. Created if missing.
    pub sstable_dir: PathBuf,
    /// Every Nth entry of a table is indexed.
    pub index_interval: usize,
    pub bloom_false_positive_rate: f64,
    pub sync_policy: SyncPolicy,
}

impl LsmOptions {
    pub fn new(wal_path: impl Into<PathBuf>, sstable_dir: impl Into<PathBuf>) -> Self {
        LsmOptions {
            memtable_size: DEFAULT_MEMTABLE_SIZE,
            wal_path: wal_path.into(),
            sstable_dir: sstable_dir.into(),
            index_interval: DEFAULT_INDEX_INTERVAL,
            bloom_false_positive_rate: DEFAULT_BLOOM_FPR,
            sync_policy: SyncPolicy::EveryWrite,
        }
    }

    pub fn with_memtable_size(mut self, entries: usize) -> Self {
        self.memtable_size = entries;
        self
    }

    pub fn with_index_interval(mut self, interval: usize) -> Self {
        self.index_interval = interval;
        self
    }

    pub fn with_bloom_false_positive_rate(mut self, rate: f64) -> Self {
        self.bloom_false_positive_rate = rate;
        self
    }

    pub fn with_sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    /// The subset of options the SSTable writer needs.
    pub(crate) fn table_options(&self) -> TableOptions {
        TableOptions {
            index_interval: self.index_interval,
            bloom_false_positive_rate: self.bloom_false_positive_rate,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.memtable_size == 0 {
            return Err(Error::InvalidInput("memtable_size must be > 0".into()));
        }
        self.table_options().validate()
    }
}

/// Knobs shared by SSTable creation, reload and compaction.
#[derive(Debug, Clone, Copy)]
pub struct TableOptions {
    pub index_interval: usize,
    pub bloom_false_positive_rate: f64,
}

impl Default for TableOptions {
    fn default() -> Self {
        TableOptions {
            index_interval: DEFAULT_INDEX_INTERVAL,
            bloom_false_positive_rate: DEFAULT_BLOOM_FPR,
        }
    }
}

impl TableOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.index_interval == 0 {
            return Err(Error::InvalidInput("index_interval must be > 0".into()));
        }
        let fpr = self.bloom_false_positive_rate;
        if !(fpr > 0.0 && fpr < 1.0) {
            return Err(Error::InvalidInput(format!(
                "bloom_false_positive_rate must be in (0, 1), got {fpr}"
            )));
        }
        Ok(())
    }
}
