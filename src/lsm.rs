use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::compaction;
use crate::durability::has_torn_tail;
use crate::error::{Error, Result};
use crate::memtable::MemTable;
use crate::options::LsmOptions;
use crate::sstable::{SSTable, TableIdAllocator, parse_table_id};
use crate::types::{validate_key, validate_value};
use crate::wal::{RecordType, WALReader, WALRecord, WALWriter};

/// A Log-Structured Merge tree over string keys and values.
///
/// Write path: WAL append → MemTable → (when full) flush to a new SSTable
/// and clear the WAL.
///
/// Read path, first definitive answer wins:
/// ```text
/// MemTable → SSTable[n-1] → SSTable[n-2] → ... → SSTable[0]
///            (newest)                              (oldest)
/// ```
/// A tombstone anywhere on that path is a definitive "absent".
///
/// Concurrency: every public operation runs under one mutex per engine,
/// so operations are fully serialized. Disk I/O is the only place a
/// holder can stall.
pub struct LsmTree {
    inner: Mutex<LsmInner>,
}

struct LsmInner {
    options: LsmOptions,
    memtable: MemTable,
    wal: WALWriter,
    /// Oldest first; flush appends.
    sstables: Vec<SSTable>,
    ids: TableIdAllocator,
}

/// Point-in-time shape of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub memtable_entries: usize,
    pub sstable_count: usize,
    /// Entries across all tables, tombstones and shadowed versions included.
    pub sstable_entries: u64,
}

impl LsmTree {
    /// Open the engine: load existing SSTables, then replay the WAL into
    /// the MemTable.
    ///
    /// If the replayed MemTable is already at the flush threshold it is
    /// flushed right away, so the engine never starts out over budget.
    pub fn open(options: LsmOptions) -> Result<Self> {
        options.validate()?;
        fs::create_dir_all(&options.sstable_dir)?;

        let mut ids = TableIdAllocator::new();
        let sstables = load_tables(&options, &mut ids)?;
        let reader = WALReader::new(&options.wal_path)?;
        let wal = WALWriter::new(&options.wal_path, options.sync_policy)?;

        let mut inner = LsmInner {
            memtable: MemTable::new(),
            wal,
            sstables,
            ids,
            options,
        };
        let (applied, skipped) = inner.recover(&reader);
        info!(
            wal = %inner.options.wal_path.display(),
            tables = inner.sstables.len(),
            applied,
            skipped,
            memtable_entries = inner.memtable.len(),
            "lsm tree recovered"
        );

        if inner.memtable.is_full(inner.options.memtable_size) {
            inner.flush()?;
        }

        Ok(LsmTree {
            inner: Mutex::new(inner),
        })
    }

    /// Insert or overwrite `key`.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        validate_value(value)?;

        let mut inner = self.inner.lock();
        inner.wal.append(&WALRecord::put(key, value))?;
        inner.memtable.put(key.to_string(), value.to_string());
        inner.flush_if_full()
    }

    /// Delete `key` by writing a tombstone. Deleting an absent key is
    /// allowed and still masks nothing.
    pub fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        let mut inner = self.inner.lock();
        inner.wal.append(&WALRecord::delete(key))?;
        inner.memtable.delete(key.to_string());
        inner.flush_if_full()
    }

    /// Current value of `key`, or `None` if it was never written or its
    /// newest version is a tombstone.
    pub fn search(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;

        let inner = self.inner.lock();
        if let Some(value) = inner.memtable.get(key) {
            return Ok(value.as_deref().map(str::to_string));
        }
        for table in inner.sstables.iter().rev() {
            if let Some(value) = table.search(key)? {
                return Ok(value.into_option());
            }
        }
        Ok(None)
    }

    /// Write the MemTable out as a new SSTable and clear the WAL.
    /// A no-op on an empty MemTable.
    pub fn flush(&self) -> Result<()> {
        self.inner.lock().flush()
    }

    /// Merge every SSTable into one and delete the inputs. Does nothing
    /// with fewer than two tables. Never triggered automatically.
    pub fn compact(&self) -> Result<()> {
        self.inner.lock().compact()
    }

    pub fn stats(&self) -> Stats {
        let inner = self.inner.lock();
        Stats {
            memtable_entries: inner.memtable.len(),
            sstable_count: inner.sstables.len(),
            sstable_entries: inner.sstables.iter().map(SSTable::entry_count).sum(),
        }
    }

    /// Table files, oldest first.
    pub fn sstable_paths(&self) -> Vec<PathBuf> {
        let inner = self.inner.lock();
        inner.sstables.iter().map(|t| t.path().to_path_buf()).collect()
    }

    /// Flush whatever is left in the MemTable, then release the WAL.
    pub fn close(self) -> Result<()> {
        let mut inner = self.inner.into_inner();
        inner.flush()?;
        inner.wal.close()
    }
}

impl LsmInner {
    /// Replay PUT/DELETE records straight into the MemTable, no logging,
    /// no flushing. Returns (applied, skipped).
    fn recover(&mut self, reader: &WALReader) -> (usize, usize) {
        let (mut applied, mut skipped) = (0, 0);
        for (line, record) in reader.iter() {
            match record {
                Ok(WALRecord {
                    record_type: RecordType::Put,
                    key,
                    value,
                }) => {
                    self.memtable.put(key, value);
                    applied += 1;
                }
                Ok(WALRecord {
                    record_type: RecordType::Delete,
                    key,
                    ..
                }) => {
                    self.memtable.delete(key);
                    applied += 1;
                }
                Ok(record) => {
                    warn!(line, %record, "skipping record not meant for an LSM log");
                    skipped += 1;
                }
                Err(e) => {
                    warn!(line, error = %e, "skipping malformed WAL record");
                    skipped += 1;
                }
            }
        }
        (applied, skipped)
    }

    fn flush_if_full(&mut self) -> Result<()> {
        if self.memtable.is_full(self.options.memtable_size) {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }
        let entries = self.memtable.len();
        let id = self.ids.next_id();
        let table = self.memtable.flush(
            &self.options.sstable_dir,
            id,
            self.options.table_options(),
        )?;
        info!(file = %table.path().display(), entries, "memtable flushed");
        self.sstables.push(table);

        // Everything the log covered is now in an fsync'd table.
        self.wal.clear()
    }

    fn compact(&mut self) -> Result<()> {
        if self.sstables.len() < 2 {
            return Ok(());
        }
        let id = self.ids.next_id();
        let merged = compaction::compact(
            &self.sstables,
            &self.options.sstable_dir,
            id,
            self.options.table_options(),
        )?;

        let superseded = std::mem::replace(&mut self.sstables, vec![merged]);
        for table in superseded {
            remove_table_file(table.path())?;
        }
        Ok(())
    }
}

/// Open every `sstable_<id>.sst` in the directory, oldest first.
///
/// Temp files left by a flush or compaction that never finished are
/// removed. A table whose last line was cut short is skipped: the WAL
/// it would have replaced was never cleared.
fn load_tables(options: &LsmOptions, ids: &mut TableIdAllocator) -> Result<Vec<SSTable>> {
    let mut found: Vec<(u64, PathBuf)> = Vec::new();
    for entry in fs::read_dir(&options.sstable_dir)? {
        let path = entry?.path();
        if let Some(id) = parse_table_id(&path) {
            found.push((id, path));
        } else if is_table_temp_file(&path) {
            warn!(file = %path.display(), "removing unfinished table");
            remove_table_file(&path)?;
        }
    }
    found.sort_by_key(|(id, _)| *id);

    let mut tables = Vec::with_capacity(found.len());
    for (id, path) in found {
        ids.observe(id);
        if has_torn_tail(&path)? {
            warn!(file = %path.display(), "skipping table with a partial last line");
            continue;
        }
        tables.push(SSTable::open(&path, options.table_options())?);
    }
    Ok(tables)
}

fn is_table_temp_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "tmp")
        && parse_table_id(&path.with_extension("")).is_some()
}

fn remove_table_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}
