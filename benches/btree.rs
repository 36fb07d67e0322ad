//! B+ tree benchmarks: insert throughput, point lookups, and leaf-chain
//! scans through a warm buffer pool.

use std::sync::Arc;

use crabdb::{BPlusTree, BufferPoolManager, DiskManager, PageId, RecordId};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::tempdir;

const LEAF_MAX: usize = 64;
const INTERNAL_MAX: usize = 64;

fn rid(n: u32) -> RecordId {
    RecordId::new(PageId::new(n), 0)
}

fn build_tree(keys: u32) -> (Arc<BPlusTree<u32>>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("bench.db")).unwrap();
    let bpm = Arc::new(BufferPoolManager::new(1024, dm));
    let tree = Arc::new(BPlusTree::new("bench", bpm, LEAF_MAX, INTERNAL_MAX).unwrap());
    for k in 0..keys {
        tree.insert(&k, &rid(k)).unwrap();
    }
    (tree, dir)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_insert");

    for count in [1_000u32, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("sequential", count), &count, |b, &count| {
            b.iter_with_setup(
                || {
                    let dir = tempdir().unwrap();
                    let dm = DiskManager::create(dir.path().join("bench.db")).unwrap();
                    let bpm = Arc::new(BufferPoolManager::new(1024, dm));
                    let tree = BPlusTree::<u32>::new("bench", bpm, LEAF_MAX, INTERNAL_MAX).unwrap();
                    (dir, tree)
                },
                |(dir, tree)| {
                    for k in 0..count {
                        tree.insert(&k, &rid(k)).unwrap();
                    }
                    (dir, tree)
                },
            );
        });

        group.bench_with_input(BenchmarkId::new("shuffled", count), &count, |b, &count| {
            b.iter_with_setup(
                || {
                    let dir = tempdir().unwrap();
                    let dm = DiskManager::create(dir.path().join("bench.db")).unwrap();
                    let bpm = Arc::new(BufferPoolManager::new(1024, dm));
                    let tree = BPlusTree::<u32>::new("bench", bpm, LEAF_MAX, INTERNAL_MAX).unwrap();
                    (dir, tree)
                },
                |(dir, tree)| {
                    // Coprime stride gives a repeatable pseudo-random order
                    for k in (0..count).map(|i| i.wrapping_mul(7919) % count) {
                        tree.insert(&k, &rid(k)).unwrap();
                    }
                    (dir, tree)
                },
            );
        });
    }

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_get");
    let (tree, _dir) = build_tree(100_000);

    group.throughput(Throughput::Elements(1));
    group.bench_function("hit", |b| {
        let mut k = 0u32;
        b.iter(|| {
            k = (k + 7919) % 100_000;
            black_box(tree.get(&k).unwrap())
        });
    });
    group.bench_function("miss", |b| {
        b.iter(|| black_box(tree.get(&200_000).unwrap()));
    });

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_scan");
    let (tree, _dir) = build_tree(100_000);

    group.throughput(Throughput::Elements(100_000));
    group.bench_function("full", |b| {
        b.iter(|| {
            let mut count = 0usize;
            for entry in tree.begin().unwrap() {
                black_box(entry.unwrap());
                count += 1;
            }
            count
        });
    });

    group.throughput(Throughput::Elements(1_000));
    group.bench_function("range_1k", |b| {
        b.iter(|| {
            tree.begin_at(&50_000)
                .unwrap()
                .take(1_000)
                .map(|entry| entry.unwrap().0 as u64)
                .sum::<u64>()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_get, bench_scan);
criterion_main!(benches);
