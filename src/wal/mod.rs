pub mod reader;
pub mod record;
pub mod writer;

pub use reader::WALReader;
pub use record::{RecordType, WALRecord};
pub use writer::WALWriter;

/// Controls how far each WAL append is pushed before the call returns.
///
/// Trade-off: durability vs throughput.
///   - EveryWrite: the record is fsync'd, survives power loss
///   - OsBuffered: the record reaches the OS page cache only, survives a
///     process crash but not a machine crash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// fsync after every record. Safest, slowest.
    #[default]
    EveryWrite,
    /// Flush the userspace buffer, let the OS decide when to hit disk.
    OsBuffered,
}
