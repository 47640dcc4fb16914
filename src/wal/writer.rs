use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::durability::{complete_len, sync_parent_dir};
use crate::error::Result;
use crate::wal::SyncPolicy;
use crate::wal::record::WALRecord;

/// Appends WAL records to a single growing file.
///
/// Every write must be durable before it's acknowledged to the caller:
/// `append` returns only after the record left the userspace buffer
/// (and, under `SyncPolicy::EveryWrite`, after fsync).
///
/// Two layers of buffering:
///   BufWriter.flush()  → Rust buffer → OS page cache
///   file.sync_all()    → OS page cache → physical disk
pub struct WALWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    offset: u64,
    sync_policy: SyncPolicy,
}

impl WALWriter {
    /// Open (or create) the WAL at `path` for appending. Missing parent
    /// directories are created.
    ///
    /// A last line cut short by a crash mid-append is truncated away first,
    /// so the next record starts on a line of its own.
    pub fn new(path: &Path, sync_policy: SyncPolicy) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        truncate_torn_tail(path)?;
        let file = open_append(path)?;
        let offset = file.metadata()?.len();

        Ok(WALWriter {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            offset,
            sync_policy,
        })
    }

    /// Append a record. Nothing may be applied in memory if this fails.
    pub fn append(&mut self, record: &WALRecord) -> Result<()> {
        let line = record.encode();

        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        if self.sync_policy == SyncPolicy::EveryWrite {
            self.writer.get_ref().sync_all()?;
        }
        self.offset += line.len() as u64;

        Ok(())
    }

    /// Force fsync to disk. Ensures all buffered writes are durable.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Drop every record, starting a fresh durability window.
    ///
    /// Only valid once everything logged so far is durable elsewhere
    /// (an fsync'd SSTable, a checkpoint).
    pub fn clear(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_ref();
        file.set_len(0)?;
        file.sync_all()?;
        self.offset = 0;
        Ok(())
    }

    /// Atomically replace the log with `records`.
    ///
    /// Writes a sibling temp file, fsyncs it, renames it over the log and
    /// reopens the append handle. A crash at any point leaves either the
    /// old log or the new one, never a mix.
    pub fn rewrite<'a>(&mut self, records: impl IntoIterator<Item = &'a WALRecord>) -> Result<()> {
        self.writer.flush()?;

        let tmp_path = temp_path(&self.path);
        let mut offset = 0u64;
        {
            let mut tmp = BufWriter::new(File::create(&tmp_path)?);
            for record in records {
                let line = record.encode();
                tmp.write_all(line.as_bytes())?;
                offset += line.len() as u64;
            }
            tmp.flush()?;
            tmp.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        sync_parent_dir(&self.path);

        self.writer = BufWriter::new(open_append(&self.path)?);
        self.offset = offset;
        Ok(())
    }

    /// Flush, fsync and release the file handle.
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }

    /// Current file length in bytes.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn truncate_torn_tail(path: &Path) -> Result<()> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let len = file.metadata()?.len();
    let keep = complete_len(&mut file)?;
    if keep < len {
        warn!(
            wal = %path.display(),
            dropped_bytes = len - keep,
            "truncating partial record at end of WAL"
        );
        file.set_len(keep)?;
        file.sync_all()?;
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
