use std::fmt;

use crate::error::{Error, Result};
use crate::types::BTreeKey;

/// Record type stored in the WAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// B-Tree insert.
    Insert,
    /// Delete, shared by both engines.
    Delete,
    /// LSM upsert.
    Put,
}

impl RecordType {
    fn tag(self) -> &'static str {
        match self {
            RecordType::Insert => "INSERT",
            RecordType::Delete => "DELETE",
            RecordType::Put => "PUT",
        }
    }

    fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "INSERT" => Ok(RecordType::Insert),
            "DELETE" => Ok(RecordType::Delete),
            "PUT" => Ok(RecordType::Put),
            _ => Err(Error::Corruption(format!("invalid record type: {tag:?}"))),
        }
    }

    /// Fields on the line, tag included.
    fn field_count(self) -> usize {
        match self {
            RecordType::Insert | RecordType::Delete => 2,
            RecordType::Put => 3,
        }
    }
}

/// A single record in the WAL.
///
/// On-disk format, one record per `\n`-terminated UTF-8 line:
/// ```text
/// INSERT <int>
/// DELETE <key>
/// PUT <key> <value...>
/// ```
///
/// The value of a PUT runs to the end of the line and may contain spaces.
/// Keys never contain whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WALRecord {
    pub record_type: RecordType,
    pub key: String,
    /// Empty for everything but PUT.
    pub value: String,
}

impl WALRecord {
    /// Create a B-Tree Insert record.
    pub fn insert(key: BTreeKey) -> Self {
        WALRecord {
            record_type: RecordType::Insert,
            key: key.to_string(),
            value: String::new(),
        }
    }

    /// Create a Delete record.
    pub fn delete(key: impl Into<String>) -> Self {
        WALRecord {
            record_type: RecordType::Delete,
            key: key.into(),
            value: String::new(),
        }
    }

    /// Create a Put record.
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        WALRecord {
            record_type: RecordType::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Serialize to one log line, terminator included.
    pub fn encode(&self) -> String {
        match self.record_type {
            RecordType::Put => format!("{} {} {}\n", self.record_type.tag(), self.key, self.value),
            _ => format!("{} {}\n", self.record_type.tag(), self.key),
        }
    }

    /// Parse one log line (terminator optional).
    ///
    /// A line with the wrong number of fields for its tag is corrupt.
    pub fn decode(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let tag = line.split(' ').next().unwrap_or_default();
        let record_type = RecordType::from_tag(tag)?;

        let fields: Vec<&str> = line.splitn(record_type.field_count(), ' ').collect();
        if fields.len() != record_type.field_count() {
            return Err(Error::Corruption(format!(
                "{} record has {} fields, expected {}",
                tag,
                fields.len(),
                record_type.field_count()
            )));
        }

        let key = fields[1];
        if key.is_empty() || (record_type != RecordType::Put && key.contains(' ')) {
            return Err(Error::Corruption(format!("{tag} record has a malformed key")));
        }

        let value = if record_type == RecordType::Put {
            fields[2].to_string()
        } else {
            String::new()
        };

        Ok(WALRecord {
            record_type,
            key: key.to_string(),
            value,
        })
    }

    /// Key of an INSERT/DELETE record interpreted as a B-Tree key.
    pub fn int_key(&self) -> Result<BTreeKey> {
        self.key
            .parse()
            .map_err(|_| Error::Corruption(format!("unparsable integer key {:?}", self.key)))
    }

    /// Size of this record when serialized on disk.
    pub fn encoded_size(&self) -> usize {
        self.encode().len()
    }
}

impl fmt::Display for WALRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode().trim_end())
    }
}
