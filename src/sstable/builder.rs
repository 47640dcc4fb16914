use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::bloom::BloomFilterBuilder;
use crate::durability::sync_parent_dir;
use crate::error::{Error, Result};
use crate::options::TableOptions;
use crate::sstable::index::SparseIndex;
use crate::sstable::reader::{SSTable, SSTableMeta};
use crate::types::Value;

/// Builds an SSTable file from a sorted stream of key-value pairs.
///
/// Used during:
/// - Memtable flush (sorted memtable → SSTable)
/// - Compaction (merged tables → one new SSTable)
///
/// File layout is one `<key> <value-or-NULL>\n` line per entry. While
/// writing, every `index_interval`-th line (starting with the first)
/// has its start offset recorded in the sparse index.
///
/// Lines go to `<path>.tmp`; `finish` fsyncs and renames it into place,
/// so a table file under its real name is always complete.
pub struct SSTableBuilder {
    writer: BufWriter<File>,
    path: PathBuf,
    tmp_path: PathBuf,
    id: u64,
    index: SparseIndex,
    bloom: BloomFilterBuilder,
    index_interval: usize,
    /// Bytes written so far = start offset of the next line.
    offset: u64,
    entry_count: u64,
    min_key: Option<String>,
    max_key: Option<String>,
}

impl SSTableBuilder {
    /// Start a table that will live at `path`. Fails if that file already
    /// exists: tables are immutable and never overwritten. A stale temp
    /// file from an earlier crash is replaced.
    pub fn new(path: &Path, id: u64, options: TableOptions) -> Result<Self> {
        if path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )
            .into());
        }
        let tmp_path = temp_path(path);
        let file = File::create(&tmp_path)?;
        Ok(SSTableBuilder {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            tmp_path,
            id,
            index: SparseIndex::new(),
            bloom: BloomFilterBuilder::new(options.bloom_false_positive_rate),
            index_interval: options.index_interval,
            offset: 0,
            entry_count: 0,
            min_key: None,
            max_key: None,
        })
    }

    /// Add an entry. Keys MUST arrive in strictly ascending order.
    pub fn add(&mut self, key: &str, value: &Value) -> Result<()> {
        if let Some(last) = &self.max_key {
            if key <= last.as_str() {
                return Err(Error::InvalidInput(format!(
                    "SSTable keys out of order: {key:?} after {last:?}"
                )));
            }
        }

        if self.entry_count % self.index_interval as u64 == 0 {
            self.index.insert(key, self.offset);
        }
        self.bloom.add_key(key.as_bytes());

        let line = format!("{key} {}\n", value.encoded());
        self.writer.write_all(line.as_bytes())?;
        self.offset += line.len() as u64;
        self.entry_count += 1;

        if self.min_key.is_none() {
            self.min_key = Some(key.to_string());
        }
        self.max_key = Some(key.to_string());
        Ok(())
    }

    /// Flush buffer + fsync, rename into place, then hand back the
    /// readable table.
    pub fn finish(mut self) -> Result<SSTable> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        fs::rename(&self.tmp_path, &self.path)?;
        sync_parent_dir(&self.path);

        let meta = SSTableMeta {
            id: self.id,
            entry_count: self.entry_count,
            file_size: self.offset,
            min_key: self.min_key,
            max_key: self.max_key,
        };
        Ok(SSTable::from_parts(self.path, meta, self.index, self.bloom.build()))
    }
}

/// `sstable_<id>.sst.tmp`: not a table name, so never loaded as one.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn index_every_nth_entry_from_the_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sst");

        let mut builder = SSTableBuilder::new(&path, 1, TableOptions::default()).unwrap();
        for i in 0..25u32 {
            let key = format!("key_{i:05}");
            builder.add(&key, &Value::Present("v".into())).unwrap();
        }
        let table = builder.finish().unwrap();

        let indexed: Vec<&str> = table.index().iter().map(|(k, _)| k).collect();
        assert_eq!(indexed, vec!["key_00000", "key_00010", "key_00020"]);
        // "key_00000 v\n" is 12 bytes
        let offsets: Vec<u64> = table.index().iter().map(|(_, o)| o).collect();
        assert_eq!(offsets, vec![0, 120, 240]);
    }

    #[test]
    fn finish_returns_correct_meta() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sst");

        let mut builder = SSTableBuilder::new(&path, 42, TableOptions::default()).unwrap();
        builder.add("alpha", &Value::Present("first".into())).unwrap();
        builder.add("omega", &Value::Tombstone).unwrap();
        let table = builder.finish().unwrap();

        let meta = table.meta();
        assert_eq!(meta.id, 42);
        assert_eq!(meta.entry_count, 2);
        assert_eq!(meta.min_key.as_deref(), Some("alpha"));
        assert_eq!(meta.max_key.as_deref(), Some("omega"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "alpha first\nomega NULL\n");
        assert_eq!(meta.file_size, 23);
    }

    #[test]
    fn out_of_order_key_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sst");

        let mut builder = SSTableBuilder::new(&path, 1, TableOptions::default()).unwrap();
        builder.add("b", &Value::Present("1".into())).unwrap();
        assert!(builder.add("a", &Value::Present("2".into())).is_err());
        assert!(builder.add("b", &Value::Present("3".into())).is_err());
    }

    #[test]
    fn unfinished_table_never_appears_under_its_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sst");

        let mut builder = SSTableBuilder::new(&path, 1, TableOptions::default()).unwrap();
        builder.add("a", &Value::Present("1".into())).unwrap();
        assert!(!path.exists());
        drop(builder);
        assert!(!path.exists());

        // A retry replaces the leftover temp file.
        let mut builder = SSTableBuilder::new(&path, 1, TableOptions::default()).unwrap();
        builder.add("b", &Value::Present("2".into())).unwrap();
        let table = builder.finish().unwrap();
        assert_eq!(std::fs::read_to_string(table.path()).unwrap(), "b 2\n");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn existing_file_is_never_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sst");
        std::fs::write(&path, "keep me\n").unwrap();

        assert!(SSTableBuilder::new(&path, 1, TableOptions::default()).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me\n");
    }
}
