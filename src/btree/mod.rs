pub mod node;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

pub use node::BTreeNode;

use crate::error::{Error, Result};
use crate::options::BTreeOptions;
use crate::types::BTreeKey;
use crate::wal::{RecordType, WALReader, WALRecord, WALWriter};

/// A disk-durable B-Tree of integer keys.
///
/// Every mutation is appended to the WAL before the in-memory tree is
/// touched; on construction the WAL is replayed without re-logging.
///
/// Concurrency: all operations run under one mutex per tree. Splits and
/// merges touch several nodes at once, so finer locking isn't attempted.
pub struct BTree {
    inner: Mutex<TreeInner>,
}

struct TreeInner {
    root: Option<Box<BTreeNode>>,
    t: usize,
    len: usize,
    wal: WALWriter,
}

/// What a replay pass did, for the recovery log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: usize,
    pub skipped: usize,
}

impl BTree {
    /// Open the tree, replaying whatever its WAL holds.
    pub fn open(options: BTreeOptions) -> Result<Self> {
        options.validate()?;

        let mut inner = TreeInner {
            root: None,
            t: options.min_degree,
            len: 0,
            wal: WALWriter::new(&options.wal_path, options.sync_policy)?,
        };
        let stats = inner.recover(&WALReader::new(&options.wal_path)?);
        info!(
            wal = %options.wal_path.display(),
            applied = stats.applied,
            skipped = stats.skipped,
            keys = inner.len,
            "btree recovered"
        );

        Ok(BTree {
            inner: Mutex::new(inner),
        })
    }

    /// Insert `key`. Returns `false` if it was already present; the
    /// request is still logged so replay sees the same sequence.
    pub fn insert(&self, key: BTreeKey) -> Result<bool> {
        let mut inner = self.inner.lock();
        inner.wal.append(&WALRecord::insert(key))?;
        Ok(inner.apply_insert(key))
    }

    /// Delete `key`. Returns `false` if it wasn't present.
    pub fn delete(&self, key: BTreeKey) -> Result<bool> {
        let mut inner = self.inner.lock();
        inner.wal.append(&WALRecord::delete(key.to_string()))?;
        let removed = inner.apply_delete(key);
        if !removed {
            debug!(key, "delete of absent key");
        }
        Ok(removed)
    }

    pub fn search(&self, key: BTreeKey) -> bool {
        let inner = self.inner.lock();
        inner.root.as_ref().is_some_and(|root| root.search(key).is_some())
    }

    /// All keys in ascending order.
    pub fn traverse(&self) -> Vec<BTreeKey> {
        let inner = self.inner.lock();
        let mut out = Vec::with_capacity(inner.len);
        if let Some(root) = &inner.root {
            root.traverse(&mut out);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Levels from root to leaf; 0 when empty.
    pub fn height(&self) -> usize {
        let inner = self.inner.lock();
        let mut height = 0;
        let mut node = inner.root.as_deref();
        while let Some(n) = node {
            height += 1;
            node = n.children().first().map(|c| &**c);
        }
        height
    }

    pub fn min_degree(&self) -> usize {
        self.inner.lock().t
    }

    /// Verify every structural invariant of the tree.
    pub fn validate(&self) -> Result<()> {
        let inner = self.inner.lock();
        let Some(root) = &inner.root else {
            return Ok(());
        };
        root.validate(true, None, None)?;

        let mut keys = Vec::new();
        root.traverse(&mut keys);
        if keys.len() != inner.len {
            return Err(Error::Corruption(format!(
                "tree holds {} keys, expected {}",
                keys.len(),
                inner.len
            )));
        }
        Ok(())
    }

    /// Replace the WAL with one INSERT per live key.
    ///
    /// Bounds log growth the way an LSM flush does: after this the log
    /// is as long as the tree, no matter how many mutations came before.
    pub fn checkpoint(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut keys = Vec::with_capacity(inner.len);
        if let Some(root) = &inner.root {
            root.traverse(&mut keys);
        }
        let records: Vec<WALRecord> = keys.into_iter().map(WALRecord::insert).collect();
        inner.wal.rewrite(&records)?;
        info!(keys = records.len(), wal_bytes = inner.wal.offset(), "btree checkpoint");
        Ok(())
    }

    /// Release the WAL handle. The log is left as is.
    pub fn close(self) -> Result<()> {
        self.inner.into_inner().wal.close()
    }
}

impl TreeInner {
    fn recover(&mut self, reader: &WALReader) -> ReplayStats {
        let mut stats = ReplayStats::default();
        for (line, record) in reader.iter() {
            let applied = record.and_then(|record| {
                let key = record.int_key()?;
                match record.record_type {
                    RecordType::Insert => self.apply_insert(key),
                    RecordType::Delete => self.apply_delete(key),
                    RecordType::Put => {
                        return Err(Error::Corruption("PUT record in a B-Tree log".into()));
                    }
                };
                Ok(())
            });
            match applied {
                Ok(()) => stats.applied += 1,
                Err(e) => {
                    warn!(line, error = %e, "skipping malformed WAL record");
                    stats.skipped += 1;
                }
            }
        }
        stats
    }

    /// Top-down insert without logging.
    fn apply_insert(&mut self, key: BTreeKey) -> bool {
        let t = self.t;
        let root = match self.root.take() {
            None => {
                let mut leaf = BTreeNode::new(t, true);
                leaf.insert_non_full(key);
                Box::new(leaf)
            }
            Some(root) if root.search(key).is_some() => {
                self.root = Some(root);
                return false;
            }
            Some(root) if root.is_full() => {
                let mut grown = BTreeNode::grow_root(*root);
                grown.insert_non_full(key);
                Box::new(grown)
            }
            Some(mut root) => {
                root.insert_non_full(key);
                root
            }
        };
        self.root = Some(root);
        self.len += 1;
        true
    }

    /// Delete without logging; collapses an emptied root.
    fn apply_delete(&mut self, key: BTreeKey) -> bool {
        let Some(root) = self.root.as_mut() else {
            return false;
        };
        let removed = root.delete(key);

        if root.is_empty() {
            let next = if root.is_leaf() {
                None
            } else {
                root.take_only_child()
            };
            self.root = next;
        }
        if removed {
            self.len -= 1;
        }
        removed
    }
}
