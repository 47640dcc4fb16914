use std::fs;
use std::io;
use std::path::Path;

use crate::error::Result;
use crate::wal::record::WALRecord;

/// Reads WAL records back for crash recovery.
///
/// Loads the entire file into memory, then iterates line by line.
/// A missing file is a fresh engine and reads as an empty log.
pub struct WALReader {
    data: Vec<u8>,
}

impl WALReader {
    /// Open a WAL file for reading.
    pub fn new(path: &Path) -> Result<Self> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(WALReader { data })
    }

    /// Every line in file order, terminators stripped. Lines that aren't
    /// valid UTF-8 are decoded lossily.
    pub fn read_logs(&self) -> Vec<String> {
        self.lines()
            .map(|(_, line)| {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                String::from_utf8_lossy(line).into_owned()
            })
            .collect()
    }

    /// Iterate over decoded records. Malformed lines are yielded as errors
    /// so the caller can skip them; iteration always continues.
    pub fn iter(&self) -> WALIterator<'_> {
        WALIterator::new(self.lines())
    }

    /// `(line_number, bytes)` pairs, 1-based. Only `\n`-terminated lines
    /// count: a tail without one is a record whose append never finished.
    fn lines(&self) -> impl Iterator<Item = (usize, &[u8])> {
        let complete = self.data.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
        let data = &self.data[..complete];
        let data = data.strip_suffix(b"\n").unwrap_or(data);
        let empty = data.is_empty();
        data.split(|&b| b == b'\n')
            .enumerate()
            .filter(move |_| !empty)
            .map(|(i, line)| (i + 1, line))
    }
}

/// Iterator over WAL records, one item per line.
pub struct WALIterator<'a> {
    lines: Box<dyn Iterator<Item = (usize, &'a [u8])> + 'a>,
}

impl<'a> WALIterator<'a> {
    fn new(lines: impl Iterator<Item = (usize, &'a [u8])> + 'a) -> Self {
        WALIterator {
            lines: Box::new(lines),
        }
    }
}

impl<'a> Iterator for WALIterator<'a> {
    /// `(line_number, decoded record)`.
    type Item = (usize, Result<WALRecord>);

    fn next(&mut self) -> Option<Self::Item> {
        let (line_no, raw) = self.lines.next()?;
        let record = match std::str::from_utf8(raw) {
            Ok(line) => WALRecord::decode(line),
            Err(e) => Err(crate::error::Error::Corruption(format!("invalid UTF-8: {e}"))),
        };
        Some((line_no, record))
    }
}
