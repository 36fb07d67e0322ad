//! The page cache between the index layer and disk.
//!
//! [`BufferPoolManager`] owns a fixed set of [`Frame`]s and hands out
//! [`PageReadGuard`] / [`PageWriteGuard`] handles that keep a page pinned
//! while in use. The [`replacer`] module picks eviction victims among
//! unpinned frames, and [`BufferPoolStats`] counts what the pool did.

mod buffer_pool_manager;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub use frame::Frame;
pub use page_guard::{PageReadGuard, PageWriteGuard};
pub use stats::{BufferPoolStats, StatsSnapshot};