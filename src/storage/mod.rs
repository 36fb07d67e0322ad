//! Persistent storage: the page file and on-page formats.
//!
//! [`DiskManager`] moves whole pages between memory and a single backing
//! file; [`page`] defines what those pages contain, from the shared header
//! to the typed views layered on top.

mod disk_manager;
pub mod page;

pub use disk_manager::DiskManager;