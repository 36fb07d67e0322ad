//! Cross-session and cross-thread buffer pool behavior.

use std::sync::Arc;
use std::thread;

use crabdb::{BufferPoolManager, DiskManager, PageId};
use tempfile::tempdir;

fn pool(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("pool.db")).unwrap();
    (BufferPoolManager::new(pool_size, dm), dir)
}

/// Writes survive eviction cycles: more pages than frames, all readable back.
#[test]
fn test_writes_survive_eviction() {
    let (bpm, _dir) = pool(2);

    let page_ids: Vec<PageId> = (0u8..5)
        .map(|i| {
            let mut guard = bpm.new_page().unwrap();
            guard.payload_mut()[0] = i;
            guard.payload_mut()[1] = i.wrapping_mul(3);
            guard.page_id()
        })
        .collect();

    for (i, &pid) in page_ids.iter().enumerate() {
        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(guard.payload()[0], i as u8);
        assert_eq!(guard.payload()[1], (i as u8).wrapping_mul(3));
    }
}

/// Flushed pages are visible to a fresh pool over the same file.
#[test]
fn test_flush_then_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pool.db");
    let data = b"persistent!";

    let pid;
    {
        let dm = DiskManager::create(&path).unwrap();
        let bpm = BufferPoolManager::new(10, dm);

        let mut guard = bpm.new_page().unwrap();
        pid = guard.page_id();
        guard.payload_mut()[..data.len()].copy_from_slice(data);
        drop(guard);

        bpm.flush_all_pages().unwrap();
    }
    {
        let dm = DiskManager::open(&path).unwrap();
        let bpm = BufferPoolManager::new(10, dm);

        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(&guard.payload()[..data.len()], data);
    }
}

/// One writer per page, all racing; every page ends at its writer's last value.
#[test]
fn test_parallel_writers_per_page() {
    let (bpm, _dir) = pool(10);
    let bpm = Arc::new(bpm);

    let page_ids: Vec<PageId> = (0..5).map(|_| bpm.new_page().unwrap().page_id()).collect();

    let handles: Vec<_> = page_ids
        .iter()
        .enumerate()
        .map(|(i, &pid)| {
            let bpm = Arc::clone(&bpm);
            thread::spawn(move || {
                for j in 0..50 {
                    let mut guard = bpm.fetch_page_write(pid).unwrap();
                    guard.payload_mut()[0] = ((i * 50 + j) % 256) as u8;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for (i, &pid) in page_ids.iter().enumerate() {
        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(guard.payload()[0], ((i * 50 + 49) % 256) as u8);
    }
}

#[test]
fn test_counters_track_hits_and_evictions() {
    let (bpm, _dir) = pool(2);

    let pid = bpm.new_page().unwrap().page_id();
    for _ in 0..5 {
        let _ = bpm.fetch_page_read(pid).unwrap();
    }
    assert!(bpm.stats().snapshot().cache_hits >= 5);

    // Two more pages than free frames forces at least one eviction.
    let _ = bpm.new_page().unwrap();
    let _ = bpm.new_page().unwrap();
    assert!(bpm.stats().snapshot().evictions >= 1);
}
