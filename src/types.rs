use crate::error::{Error, Result};

/// Key type of the B-Tree engine.
pub type BTreeKey = i64;

/// On-disk spelling of a tombstone in SSTable files.
pub const TOMBSTONE_LITERAL: &str = "NULL";

/// A value slot in the LSM engine.
///
/// A Delete writes a tombstone: the key isn't removed, it's marked as
/// deleted so that older versions in SSTables stay masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A live value.
    Present(String),
    /// A delete marker.
    Tombstone,
}

impl Value {
    /// The live value, or `None` for a tombstone.
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Value::Present(v) => Some(v),
            Value::Tombstone => None,
        }
    }

    pub fn into_option(self) -> Option<String> {
        match self {
            Value::Present(v) => Some(v),
            Value::Tombstone => None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Value::Tombstone)
    }

    /// Text as it appears in an SSTable line.
    pub fn encoded(&self) -> &str {
        match self {
            Value::Present(v) => v,
            Value::Tombstone => TOMBSTONE_LITERAL,
        }
    }

    /// Parse the value column of an SSTable line.
    pub fn decode(text: &str) -> Self {
        if text == TOMBSTONE_LITERAL {
            Value::Tombstone
        } else {
            Value::Present(text.to_string())
        }
    }
}

/// Keys share a line with their value, separated by one space, so they
/// can't be empty or contain whitespace.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidInput("key must not be empty".into()));
    }
    if key.chars().any(char::is_whitespace) {
        return Err(Error::InvalidInput(format!(
            "key {key:?} must not contain whitespace"
        )));
    }
    Ok(())
}

/// Values run to the end of the line and must not alias the tombstone.
pub fn validate_value(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidInput("value must not be empty".into()));
    }
    if value.contains(['\n', '\r']) {
        return Err(Error::InvalidInput("value must not contain line breaks".into()));
    }
    if value == TOMBSTONE_LITERAL {
        return Err(Error::InvalidInput(format!(
            "value {TOMBSTONE_LITERAL:?} is reserved for tombstones"
        )));
    }
    Ok(())
}
