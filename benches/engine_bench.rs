use criterion::{Criterion, black_box, criterion_group, criterion_main};
use kv_engines::{BTree, BTreeOptions, LsmOptions, LsmTree, SyncPolicy};
use tempfile::tempdir;

fn bench_btree(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let tree = BTree::open(
        BTreeOptions::new(dir.path().join("btree.wal"))
            .with_min_degree(16)
            .with_sync_policy(SyncPolicy::OsBuffered),
    )
    .unwrap();

    c.bench_function("btree_insert", |b| {
        let mut i = 0i64;
        b.iter(|| {
            tree.insert(black_box(i)).unwrap();
            i += 1;
        })
    });

    c.bench_function("btree_search", |b| {
        let mut i = 0i64;
        b.iter(|| {
            tree.search(black_box(i % 10_000));
            i += 1;
        })
    });
}

fn bench_lsm(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let lsm = LsmTree::open(
        LsmOptions::new(dir.path().join("lsm.wal"), dir.path().join("sstables"))
            .with_sync_policy(SyncPolicy::OsBuffered),
    )
    .unwrap();

    c.bench_function("lsm_put", |b| {
        let mut i = 0;
        b.iter(|| {
            let key = format!("key_{:010}", i);
            lsm.put(black_box(&key), black_box("value")).unwrap();
            i += 1;
        })
    });

    // Spread reads over several tables.
    for i in 0..5000 {
        lsm.put(&format!("read_{i:06}"), "value").unwrap();
    }
    lsm.flush().unwrap();

    c.bench_function("lsm_get_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            let key = format!("read_{:06}", i % 5000);
            lsm.search(black_box(&key)).unwrap();
            i += 1;
        })
    });

    c.bench_function("lsm_get_miss", |b| {
        b.iter(|| {
            lsm.search(black_box("non_existent_key")).unwrap();
        })
    });
}

criterion_group!(benches, bench_btree, bench_lsm);
criterion_main!(benches);
