//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`LruReplacer`] - Least-recently-unpinned eviction

mod lru;

pub use lru::LruReplacer;
