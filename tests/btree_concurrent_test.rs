//! Concurrency tests: latch crabbing under parallel inserts, removes,
//! lookups, and scans.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use crabdb::{BPlusTree, BufferPoolManager, DiskManager, PageId, RecordId};
use tempfile::tempdir;

const THREADS: u32 = 8;
const KEYS_PER_THREAD: u32 = 250;

fn rid(n: u32) -> RecordId {
    RecordId::new(PageId::new(n), 0)
}

fn create_tree(pool_size: usize) -> (Arc<BPlusTree<u32>>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("index.db")).unwrap();
    let bpm = Arc::new(BufferPoolManager::new(pool_size, dm));
    let tree = Arc::new(BPlusTree::new("concurrent", bpm, 8, 8).unwrap());
    (tree, dir)
}

#[test]
fn test_concurrent_disjoint_inserts() {
    let (tree, _dir) = create_tree(100);
    let mut handles = Vec::new();

    for t in 0..THREADS {
        let tree = Arc::clone(&tree);
        handles.push(thread::spawn(move || {
            let base = t * KEYS_PER_THREAD;
            for k in base..base + KEYS_PER_THREAD {
                assert!(tree.insert(&k, &rid(k)).unwrap(), "insert {k}");
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let total = THREADS * KEYS_PER_THREAD;
    for k in 0..total {
        assert_eq!(tree.get(&k).unwrap(), Some(rid(k)), "key {k}");
    }

    // The scan sees every key, in order
    let keys: Vec<u32> = tree.begin().unwrap().map(|e| e.unwrap().0).collect();
    assert_eq!(keys, (0..total).collect::<Vec<_>>());
}

#[test]
fn test_contended_inserts_exactly_one_winner() {
    // Every thread tries to insert the same key set; each key must be
    // claimed exactly once.
    let (tree, _dir) = create_tree(100);
    let successes = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();

    for _ in 0..THREADS {
        let tree = Arc::clone(&tree);
        let successes = Arc::clone(&successes);
        handles.push(thread::spawn(move || {
            for k in 0..KEYS_PER_THREAD {
                if tree.insert(&k, &rid(k)).unwrap() {
                    successes.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(successes.load(Ordering::Relaxed), KEYS_PER_THREAD as usize);
    let count = tree.begin().unwrap().count();
    assert_eq!(count, KEYS_PER_THREAD as usize);
}

#[test]
fn test_concurrent_insert_remove_disjoint_ranges() {
    let (tree, _dir) = create_tree(100);

    // Prepopulate the lower half, then removers drain it while inserters
    // fill the upper half.
    for k in 0..THREADS * KEYS_PER_THREAD / 2 {
        tree.insert(&k, &rid(k)).unwrap();
    }

    let mut handles = Vec::new();
    for t in 0..THREADS {
        let tree = Arc::clone(&tree);
        handles.push(thread::spawn(move || {
            let half = THREADS * KEYS_PER_THREAD / 2;
            if t % 2 == 0 {
                let base = t / 2 * (KEYS_PER_THREAD / 2);
                for k in base..base + KEYS_PER_THREAD / 2 {
                    assert!(tree.remove(&k).unwrap(), "remove {k}");
                }
            } else {
                let base = half + t / 2 * (KEYS_PER_THREAD / 2);
                for k in base..base + KEYS_PER_THREAD / 2 {
                    assert!(tree.insert(&k, &rid(k)).unwrap(), "insert {k}");
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let half = THREADS * KEYS_PER_THREAD / 2;
    let removed = THREADS / 2 * (KEYS_PER_THREAD / 2);
    let added = THREADS / 2 * (KEYS_PER_THREAD / 2);

    for k in 0..removed {
        assert_eq!(tree.get(&k).unwrap(), None, "key {k} should be gone");
    }
    for k in removed..half {
        assert_eq!(tree.get(&k).unwrap(), Some(rid(k)), "survivor {k}");
    }
    for k in half..half + added {
        assert_eq!(tree.get(&k).unwrap(), Some(rid(k)), "new key {k}");
    }
}

#[test]
fn test_readers_see_stable_keys_during_churn() {
    let (tree, _dir) = create_tree(100);

    // Stable keys live at even positions and are never touched
    for k in (0..1000u32).step_by(2) {
        tree.insert(&k, &rid(k)).unwrap();
    }

    let mut handles = Vec::new();

    // Writers churn the odd keys
    for t in 0..2u32 {
        let tree = Arc::clone(&tree);
        handles.push(thread::spawn(move || {
            for round in 0..5u32 {
                for k in (1..1000u32).step_by(2) {
                    if (t + round) % 2 == 0 {
                        tree.insert(&k, &rid(k)).unwrap();
                    } else {
                        tree.remove(&k).unwrap();
                    }
                }
            }
        }));
    }

    // Readers continuously verify the stable keys
    for _ in 0..4 {
        let tree = Arc::clone(&tree);
        handles.push(thread::spawn(move || {
            for _ in 0..10 {
                for k in (0..1000u32).step_by(2) {
                    assert_eq!(tree.get(&k).unwrap(), Some(rid(k)), "stable key {k}");
                }
            }
        }));
    }

    // Scanners walk the leaf chain while it is being restructured; every
    // yielded key must be valid and ascending.
    for _ in 0..2 {
        let tree = Arc::clone(&tree);
        handles.push(thread::spawn(move || {
            for _ in 0..10 {
                let mut last: Option<u32> = None;
                for entry in tree.begin().unwrap() {
                    let (key, _) = entry.unwrap();
                    if let Some(prev) = last {
                        assert!(key > prev, "scan out of order: {prev} then {key}");
                    }
                    last = Some(key);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // Churn settled: stable keys intact
    for k in (0..1000u32).step_by(2) {
        assert_eq!(tree.get(&k).unwrap(), Some(rid(k)));
    }
}

#[test]
fn test_concurrent_removes_to_empty() {
    let (tree, _dir) = create_tree(100);
    let total = THREADS * KEYS_PER_THREAD;

    for k in 0..total {
        tree.insert(&k, &rid(k)).unwrap();
    }

    let mut handles = Vec::new();
    for t in 0..THREADS {
        let tree = Arc::clone(&tree);
        handles.push(thread::spawn(move || {
            let base = t * KEYS_PER_THREAD;
            for k in base..base + KEYS_PER_THREAD {
                assert!(tree.remove(&k).unwrap(), "remove {k}");
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(tree.is_empty());
    assert!(tree.begin().unwrap().is_end());
}
