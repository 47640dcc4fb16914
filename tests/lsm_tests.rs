// LSM tree tests
// Read precedence, tombstone masking, flush, compaction and recovery
// through the public engine API.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kv_engines::{LsmOptions, LsmTree, SyncPolicy};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join("lsm.wal"), dir.join("sstables"))
}

fn open(dir: &Path, memtable_size: usize) -> LsmTree {
    let (wal, tables) = paths(dir);
    LsmTree::open(
        LsmOptions::new(wal, tables)
            .with_memtable_size(memtable_size)
            .with_sync_policy(SyncPolicy::OsBuffered),
    )
    .unwrap()
}

fn wal_len(dir: &Path) -> u64 {
    std::fs::metadata(paths(dir).0).unwrap().len()
}

// =============================================================================
// Test 1: Basic put/search/overwrite
// =============================================================================
#[test]
fn put_search_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let lsm = open(dir.path(), 100);

    lsm.put("apple", "red").unwrap();
    lsm.put("banana", "yellow").unwrap();
    lsm.put("apple", "green and sour").unwrap();

    assert_eq!(lsm.search("apple").unwrap().as_deref(), Some("green and sour"));
    assert_eq!(lsm.search("banana").unwrap().as_deref(), Some("yellow"));
    assert_eq!(lsm.search("cherry").unwrap(), None);
}

// =============================================================================
// Test 2: MemTable shadows SSTables
// =============================================================================
#[test]
fn memtable_value_shadows_flushed_value() {
    let dir = tempfile::tempdir().unwrap();
    let lsm = open(dir.path(), 100);

    lsm.put("k", "v1").unwrap();
    lsm.flush().unwrap();
    lsm.put("k", "v2").unwrap();

    assert_eq!(lsm.search("k").unwrap().as_deref(), Some("v2"));
}

// =============================================================================
// Test 3: Tombstones mask older versions, wherever they live
// =============================================================================
#[test]
fn tombstone_masks_across_flushes() {
    let dir = tempfile::tempdir().unwrap();
    let lsm = open(dir.path(), 100);

    lsm.put("k", "v").unwrap();
    lsm.flush().unwrap();
    lsm.delete("k").unwrap();
    // Tombstone still in the MemTable.
    assert_eq!(lsm.search("k").unwrap(), None);

    lsm.flush().unwrap();
    // Tombstone now in the newer SSTable, value in the older one.
    assert_eq!(lsm.stats().sstable_count, 2);
    assert_eq!(lsm.search("k").unwrap(), None);

    lsm.put("k", "again").unwrap();
    assert_eq!(lsm.search("k").unwrap().as_deref(), Some("again"));
}

// =============================================================================
// Test 4: Reaching the threshold flushes and empties the WAL
// =============================================================================
#[test]
fn automatic_flush_at_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let lsm = open(dir.path(), 3);

    lsm.put("a", "1").unwrap();
    lsm.put("b", "2").unwrap();
    assert_eq!(lsm.stats().sstable_count, 0);
    assert!(wal_len(dir.path()) > 0);

    lsm.delete("c").unwrap();
    assert_eq!(
        lsm.stats(),
        kv_engines::Stats {
            memtable_entries: 0,
            sstable_count: 1,
            sstable_entries: 3,
        }
    );
    assert_eq!(wal_len(dir.path()), 0);

    let table = &lsm.sstable_paths()[0];
    assert_eq!(std::fs::read_to_string(table).unwrap(), "a 1\nb 2\nc NULL\n");
}

// =============================================================================
// Test 5: Compaction merges tables and removes the inputs
// =============================================================================
#[test]
fn compact_merges_and_deletes_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let lsm = open(dir.path(), 100);

    lsm.put("x", "1").unwrap();
    lsm.put("y", "1").unwrap();
    lsm.flush().unwrap();
    lsm.put("x", "2").unwrap();
    lsm.delete("y").unwrap();
    lsm.flush().unwrap();

    let before = lsm.sstable_paths();
    assert_eq!(before.len(), 2);

    lsm.compact().unwrap();

    let after = lsm.sstable_paths();
    assert_eq!(after.len(), 1);
    assert!(before.iter().all(|p| !p.exists()));
    assert_eq!(std::fs::read_to_string(&after[0]).unwrap(), "x 2\n");
    assert_eq!(lsm.search("x").unwrap().as_deref(), Some("2"));
    assert_eq!(lsm.search("y").unwrap(), None);
}

// =============================================================================
// Test 6: Compaction with fewer than two tables does nothing
// =============================================================================
#[test]
fn compact_noop_below_two_tables() {
    let dir = tempfile::tempdir().unwrap();
    let lsm = open(dir.path(), 100);

    lsm.compact().unwrap();
    assert_eq!(lsm.stats().sstable_count, 0);

    lsm.put("a", "1").unwrap();
    lsm.flush().unwrap();
    let before = lsm.sstable_paths();
    lsm.compact().unwrap();
    assert_eq!(lsm.sstable_paths(), before);
}

// =============================================================================
// Test 7: Flushing an empty MemTable creates nothing
// =============================================================================
#[test]
fn flush_empty_memtable_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let lsm = open(dir.path(), 100);

    lsm.flush().unwrap();
    assert_eq!(lsm.stats().sstable_count, 0);
    assert_eq!(std::fs::read_dir(paths(dir.path()).1).unwrap().count(), 0);
}

// =============================================================================
// Test 8: Close flushes; reopen loads the tables back
// =============================================================================
#[test]
fn close_then_reopen_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    {
        let lsm = open(dir.path(), 4);
        for i in 0..10 {
            lsm.put(&format!("key{i}"), &format!("value {i}")).unwrap();
        }
        lsm.delete("key3").unwrap();
        lsm.close().unwrap();
    }
    assert_eq!(wal_len(dir.path()), 0);

    let lsm = open(dir.path(), 4);
    let stats = lsm.stats();
    assert_eq!(stats.memtable_entries, 0);
    assert_eq!(stats.sstable_count, 3);

    for i in 0..10 {
        let expected = (i != 3).then(|| format!("value {i}"));
        assert_eq!(lsm.search(&format!("key{i}")).unwrap(), expected);
    }
}

// =============================================================================
// Test 9: Writes not yet flushed come back from the WAL after a crash
// =============================================================================
#[test]
fn unflushed_writes_recovered_from_wal() {
    let dir = tempfile::tempdir().unwrap();
    {
        let lsm = open(dir.path(), 100);
        lsm.put("a", "1").unwrap();
        lsm.flush().unwrap();
        lsm.put("b", "2").unwrap();
        lsm.delete("a").unwrap();
        // Dropped without close.
    }

    let lsm = open(dir.path(), 100);
    assert_eq!(lsm.stats().memtable_entries, 2);
    assert_eq!(lsm.search("a").unwrap(), None);
    assert_eq!(lsm.search("b").unwrap().as_deref(), Some("2"));
}

// =============================================================================
// Test 10: A replayed MemTable over the threshold is flushed on open
// =============================================================================
#[test]
fn oversized_replay_flushes_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let (wal, _) = paths(dir.path());
    std::fs::write(&wal, "PUT a 1\nPUT b 2\nPUT c 3\nPUT d 4\nPUT e 5\nPUT f 6\n").unwrap();

    let lsm = open(dir.path(), 5);

    let stats = lsm.stats();
    assert_eq!(stats.memtable_entries, 0);
    assert_eq!(stats.sstable_count, 1);
    assert_eq!(stats.sstable_entries, 6);
    assert_eq!(wal_len(dir.path()), 0);
    assert_eq!(lsm.search("f").unwrap().as_deref(), Some("6"));
}

// =============================================================================
// Test 11: Malformed WAL lines are skipped, the rest is replayed
// =============================================================================
#[test]
fn malformed_wal_lines_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let (wal, _) = paths(dir.path());
    std::fs::write(
        &wal,
        "PUT a 1\nPUT broken\nINSERT 5\nHELLO world\nPUT b two words\nDELETE a\n",
    )
    .unwrap();

    let lsm = open(dir.path(), 100);
    assert_eq!(lsm.search("a").unwrap(), None);
    assert_eq!(lsm.search("b").unwrap().as_deref(), Some("two words"));
    assert_eq!(lsm.stats().memtable_entries, 2);
}

// =============================================================================
// Test 12: Unrepresentable keys and values are rejected before logging
// =============================================================================
#[test]
fn invalid_input_rejected_without_logging() {
    let dir = tempfile::tempdir().unwrap();
    let lsm = open(dir.path(), 100);

    assert!(lsm.put("", "v").is_err());
    assert!(lsm.put("two words", "v").is_err());
    assert!(lsm.put("k", "").is_err());
    assert!(lsm.put("k", "line\nbreak").is_err());
    assert!(lsm.put("k", "NULL").is_err());
    assert!(lsm.delete("bad key").is_err());
    assert!(lsm.search("").is_err());

    assert_eq!(wal_len(dir.path()), 0);
    assert_eq!(lsm.stats().memtable_entries, 0);
}

// =============================================================================
// Test 13: Random workload, compacting along the way, matches a map
// =============================================================================
#[test]
fn random_workload_matches_model() {
    let dir = tempfile::tempdir().unwrap();
    let lsm = open(dir.path(), 16);
    let mut rng = StdRng::seed_from_u64(0x15A);
    let mut model: BTreeMap<String, String> = BTreeMap::new();

    for step in 0..1500 {
        let key = format!("key{:03}", rng.gen_range(0..120));
        if rng.gen_bool(0.7) {
            let value = format!("v{step} {}", rng.gen_range(0..1000));
            lsm.put(&key, &value).unwrap();
            model.insert(key, value);
        } else {
            lsm.delete(&key).unwrap();
            model.remove(&key);
        }
        if step % 400 == 399 {
            lsm.compact().unwrap();
            assert_eq!(lsm.stats().sstable_count, 1);
        }
    }

    let check = |lsm: &LsmTree| {
        for i in 0..120 {
            let key = format!("key{i:03}");
            assert_eq!(lsm.search(&key).unwrap(), model.get(&key).cloned(), "{key}");
        }
    };
    check(&lsm);
    lsm.close().unwrap();

    let lsm = open(dir.path(), 16);
    check(&lsm);
    lsm.compact().unwrap();
    check(&lsm);
}

// =============================================================================
// Test 14: Shared across threads, every write lands
// =============================================================================
#[test]
fn concurrent_puts_from_many_threads() {
    let dir = tempfile::tempdir().unwrap();
    let lsm = open(dir.path(), 50);

    std::thread::scope(|s| {
        for worker in 0..4 {
            let lsm = &lsm;
            s.spawn(move || {
                for i in 0..100 {
                    lsm.put(&format!("w{worker}_{i:03}"), &format!("{i}")).unwrap();
                }
            });
        }
    });

    for worker in 0..4 {
        for i in 0..100 {
            let key = format!("w{worker}_{i:03}");
            assert_eq!(lsm.search(&key).unwrap(), Some(i.to_string()));
        }
    }
    assert_eq!(lsm.stats().sstable_count, 8);
}

// =============================================================================
// Test 15: A torn WAL tail is dropped and later writes survive
// =============================================================================
#[test]
fn torn_wal_tail_does_not_eat_next_write() {
    let dir = tempfile::tempdir().unwrap();
    let (wal, _) = paths(dir.path());
    std::fs::create_dir_all(dir.path()).unwrap();
    std::fs::write(&wal, "PUT a 1\nPUT b tor").unwrap();

    {
        let lsm = open(dir.path(), 100);
        assert_eq!(lsm.search("b").unwrap(), None);
        lsm.put("c", "3").unwrap();
        // Dropped without close.
    }

    assert_eq!(std::fs::read_to_string(&wal).unwrap(), "PUT a 1\nPUT c 3\n");
    let lsm = open(dir.path(), 100);
    assert_eq!(lsm.search("a").unwrap().as_deref(), Some("1"));
    assert_eq!(lsm.search("b").unwrap(), None);
    assert_eq!(lsm.search("c").unwrap().as_deref(), Some("3"));
}

// =============================================================================
// Test 16: A table cut short on disk is skipped, not read as tombstones
// =============================================================================
#[test]
fn truncated_table_is_skipped_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let (_, tables) = paths(dir.path());
    {
        let lsm = open(dir.path(), 100);
        lsm.put("ke", "old").unwrap();
        lsm.close().unwrap();
    }
    // Newest id, last line cut after the key.
    std::fs::write(tables.join("sstable_09999999999999999999.sst"), "a 1\nke").unwrap();
    std::fs::write(tables.join("sstable_09999999999999999998.sst"), b"z 1\ny \xd0").unwrap();

    let lsm = open(dir.path(), 100);
    assert_eq!(lsm.stats().sstable_count, 1);
    assert_eq!(lsm.search("ke").unwrap().as_deref(), Some("old"));
    assert_eq!(lsm.search("a").unwrap(), None);

    // New tables still sort after the skipped ones.
    lsm.put("n", "new").unwrap();
    lsm.flush().unwrap();
    let newest = lsm.sstable_paths().pop().unwrap();
    assert!(newest.file_name().unwrap() > std::ffi::OsStr::new("sstable_09999999999999999999.sst"));
}

// =============================================================================
// Test 17: Temp files from an unfinished flush are cleaned up on open
// =============================================================================
#[test]
fn unfinished_table_temp_file_removed() {
    let dir = tempfile::tempdir().unwrap();
    let (_, tables) = paths(dir.path());
    std::fs::create_dir_all(&tables).unwrap();
    let leftover = tables.join("sstable_00000000000000000042.sst.tmp");
    std::fs::write(&leftover, "a 1\nb").unwrap();

    let lsm = open(dir.path(), 100);
    assert!(!leftover.exists());
    assert_eq!(lsm.stats().sstable_count, 0);
}
