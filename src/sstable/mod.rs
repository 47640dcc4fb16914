pub mod builder;
pub mod index;
pub mod iterator;
pub mod reader;

pub use builder::SSTableBuilder;
pub use index::SparseIndex;
pub use iterator::SSTableIterator;
pub use reader::{SSTable, SSTableMeta};

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};
use crate::types::Value;

/// File extension of SSTable segments.
pub const SSTABLE_EXTENSION: &str = "sst";

const FILE_PREFIX: &str = "sstable_";

/// `sstable_<id>.sst`, zero-padded so lexical order is creation order.
pub fn table_file_name(id: u64) -> String {
    format!("{FILE_PREFIX}{id:020}.{SSTABLE_EXTENSION}")
}

/// Inverse of [`table_file_name`]; `None` for anything that isn't a table.
pub fn parse_table_id(path: &Path) -> Option<u64> {
    if path.extension()? != SSTABLE_EXTENSION {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(FILE_PREFIX)?
        .parse()
        .ok()
}

/// Hands out timestamp-based table ids that only ever go up.
///
/// The id is microseconds since the epoch, bumped past the last id handed
/// out (or seen on disk), so a clock step backwards can never make a new
/// table sort before an older one.
#[derive(Debug, Default)]
pub struct TableIdAllocator {
    last: u64,
}

impl TableIdAllocator {
    pub fn new() -> Self {
        TableIdAllocator::default()
    }

    /// Record an id already in use.
    pub fn observe(&mut self, id: u64) {
        self.last = self.last.max(id);
    }

    pub fn next_id(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        self.last = now.max(self.last + 1);
        self.last
    }
}

/// Split one SSTable line (terminator already stripped) into key and value.
/// A line with no value column reads as a tombstone.
pub(crate) fn parse_line(line: &str) -> (&str, Value) {
    match line.split_once(' ') {
        Some((key, value)) => (key, Value::decode(value)),
        None => (line, Value::Tombstone),
    }
}

/// Turn the raw bytes of one line into text. Only called once the whole
/// line is collected, so a seek can never land inside a multi-byte char.
pub(crate) fn decode_line(raw: &[u8]) -> Result<&str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    std::str::from_utf8(raw).map_err(|e| Error::Corruption(format!("SSTable line is not UTF-8: {e}")))
}
