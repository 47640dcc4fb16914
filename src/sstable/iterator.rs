use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::sstable::{decode_line, parse_line};
use crate::types::Value;

/// Sequential reader over one SSTable file, one line at a time.
///
/// Compaction opens one of these per input table and pulls heads off
/// them in key order; nothing but the current line is held in memory.
pub struct SSTableIterator {
    reader: BufReader<File>,
    buf: Vec<u8>,
    key: String,
    value: Value,
    valid: bool,
}

impl SSTableIterator {
    pub fn open(path: &Path) -> Result<Self> {
        let mut iter = SSTableIterator {
            reader: BufReader::new(File::open(path)?),
            buf: Vec::new(),
            key: String::new(),
            value: Value::Tombstone,
            valid: true,
        };
        iter.next()?;
        Ok(iter)
    }
}

impl StorageIterator for SSTableIterator {
    fn key(&self) -> &str {
        &self.key
    }

    fn value(&self) -> &Value {
        &self.value
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn next(&mut self) -> Result<()> {
        if !self.valid {
            return Ok(());
        }
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            self.valid = false;
            return Ok(());
        }
        let (key, value) = parse_line(decode_line(&self.buf)?);
        self.key.clear();
        self.key.push_str(key);
        self.value = value;
        Ok(())
    }
}
