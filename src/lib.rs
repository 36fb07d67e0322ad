//! CrabDB - a disk-backed page store with a concurrent B+ tree index.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            CrabDB                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/)                        │   │
//! │  │   BPlusTree + latch crabbing + IndexIterator             │   │
//! │  │   leaf / internal node page views                        │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                       │   │
//! │  │   BufferPoolManager + Frame + LruReplacer + Statistics   │   │
//! │  │   RAII page guards for pin/unpin and latching            │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                    │   │
//! │  │   DiskManager + Page + PageHeader + header directory     │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, RecordId, Error, config)
//! - [`buffer`] - Buffer pool management and LRU eviction
//! - [`storage`] - Disk I/O, page format, header page directory
//! - [`index`] - Concurrent B+ tree index
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use crabdb::{BPlusTree, BufferPoolManager, DiskManager, PageId, RecordId};
//!
//! let dm = DiskManager::create("my_database.db").unwrap();
//! let bpm = Arc::new(BufferPoolManager::new(64, dm));
//!
//! let tree = BPlusTree::<u64>::new("orders", Arc::clone(&bpm), 255, 255).unwrap();
//! tree.insert(&42, &RecordId::new(PageId::new(7), 3)).unwrap();
//! assert!(tree.get(&42).unwrap().is_some());
//!
//! for entry in tree.begin().unwrap() {
//!     let (key, record) = entry.unwrap();
//!     println!("{key} -> {record}");
//! }
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{HEADER_PAGE_ID, PAGE_SIZE};
pub use common::{Error, FrameId, PageId, RecordId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, StatsSnapshot};
pub use index::{BPlusTree, IndexIterator, IndexKey};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
