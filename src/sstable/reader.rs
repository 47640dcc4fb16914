use std::fs::{self, File};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::bloom::{BloomFilter, BloomFilterBuilder};
use crate::error::{Error, Result};
use crate::options::TableOptions;
use crate::sstable::builder::SSTableBuilder;
use crate::sstable::index::SparseIndex;
use crate::sstable::iterator::SSTableIterator;
use crate::sstable::{decode_line, parse_line, parse_table_id, table_file_name};
use crate::types::Value;

/// Metadata about an SSTable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SSTableMeta {
    /// Timestamp-derived id, also encoded in the file name.
    pub id: u64,
    /// Number of entries (including tombstones).
    pub entry_count: u64,
    pub file_size: u64,
    /// Smallest key; `None` for an empty table.
    pub min_key: Option<String>,
    pub max_key: Option<String>,
}

/// An immutable, sorted SSTable on disk with its in-memory sparse index.
///
/// Point lookup:
/// 1. Range check against min/max key
/// 2. Bloom filter → definitely absent? done
/// 3. Floor lookup in the sparse index → byte offset
/// 4. Seek, then scan lines forward until the key matches or is passed
pub struct SSTable {
    path: PathBuf,
    meta: SSTableMeta,
    index: SparseIndex,
    bloom: BloomFilter,
}

impl SSTable {
    pub(crate) fn from_parts(
        path: PathBuf,
        meta: SSTableMeta,
        index: SparseIndex,
        bloom: BloomFilter,
    ) -> Self {
        SSTable {
            path,
            meta,
            index,
            bloom,
        }
    }

    /// Write `entries` (ascending by key) to a new table `id` in `dir`.
    /// Creates `dir` if missing.
    pub fn create<'a, I>(dir: &Path, id: u64, entries: I, options: TableOptions) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        fs::create_dir_all(dir)?;
        let path = dir.join(table_file_name(id));

        let mut builder = SSTableBuilder::new(&path, id, options)?;
        for (key, value) in entries {
            builder.add(key, value)?;
        }
        builder.finish()
    }

    /// Open an existing table, rebuilding index and bloom filter with one
    /// sequential pass over the file. A file that doesn't end in `\n`
    /// was cut short and is reported as corrupt.
    pub fn open(path: &Path, options: TableOptions) -> Result<Self> {
        let id = parse_table_id(path).ok_or_else(|| {
            Error::InvalidInput(format!("{} is not an SSTable file name", path.display()))
        })?;

        let mut reader = BufReader::new(File::open(path)?);
        let mut index = SparseIndex::new();
        let mut bloom = BloomFilterBuilder::new(options.bloom_false_positive_rate);
        let mut offset = 0u64;
        let mut entry_count = 0u64;
        let mut min_key: Option<String> = None;
        let mut max_key: Option<String> = None;

        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                break;
            }
            if buf.last() != Some(&b'\n') {
                return Err(Error::Corruption(format!(
                    "{}: unterminated last line at offset {offset}",
                    path.display()
                )));
            }
            let (key, _) = parse_line(decode_line(&buf)?);

            if max_key.as_deref().is_some_and(|last| key <= last) {
                return Err(Error::Corruption(format!(
                    "{}: key {key:?} out of order at offset {offset}",
                    path.display()
                )));
            }
            if entry_count % options.index_interval as u64 == 0 {
                index.insert(key, offset);
            }
            bloom.add_key(key.as_bytes());
            if min_key.is_none() {
                min_key = Some(key.to_string());
            }
            max_key = Some(key.to_string());

            offset += n as u64;
            entry_count += 1;
        }

        let meta = SSTableMeta {
            id,
            entry_count,
            file_size: offset,
            min_key,
            max_key,
        };
        Ok(SSTable::from_parts(path.to_path_buf(), meta, index, bloom.build()))
    }

    /// Point lookup. `Some(Value::Tombstone)` means the key was deleted
    /// as of this table; `None` means this table has no entry for it.
    pub fn search(&self, key: &str) -> Result<Option<Value>> {
        let (Some(min), Some(max)) = (&self.meta.min_key, &self.meta.max_key) else {
            return Ok(None);
        };
        if key < min.as_str() || key > max.as_str() {
            return Ok(None);
        }
        if !self.bloom.may_contain(key.as_bytes()) {
            return Ok(None);
        }

        let mut reader = BufReader::new(File::open(&self.path)?);
        reader.seek(SeekFrom::Start(self.index.seek_offset(key)))?;

        // Collect raw bytes per line; decode only complete lines.
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(None);
            }
            let (current, value) = parse_line(decode_line(&buf)?);
            match current.cmp(key) {
                std::cmp::Ordering::Less => continue,
                std::cmp::Ordering::Equal => return Ok(Some(value)),
                // Sorted: we've passed where it would be.
                std::cmp::Ordering::Greater => return Ok(None),
            }
        }
    }

    /// Forward-only cursor over every entry, positioned at the first.
    pub fn iter(&self) -> Result<SSTableIterator> {
        SSTableIterator::open(&self.path)
    }

    /// Every entry in file order, read without the index.
    pub fn entries(&self) -> Result<Vec<(String, Value)>> {
        use crate::iterator::StorageIterator;

        let mut iter = self.iter()?;
        let mut out = Vec::with_capacity(self.meta.entry_count as usize);
        while iter.is_valid() {
            out.push((iter.key().to_string(), iter.value().clone()));
            iter.next()?;
        }
        Ok(out)
    }

    pub fn meta(&self) -> &SSTableMeta {
        &self.meta
    }

    pub fn id(&self) -> u64 {
        self.meta.id
    }

    pub fn entry_count(&self) -> u64 {
        self.meta.entry_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &SparseIndex {
        &self.index
    }
}

impl std::fmt::Debug for SSTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTable")
            .field("path", &self.path)
            .field("meta", &self.meta)
            .field("index_entries", &self.index.len())
            .finish()
    }
}
