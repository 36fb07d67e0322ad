//! Frame: one pool slot, sized for exactly one page.
//!
//! The pool allocates its frames once, up front, and never moves them. A
//! frame couples the page bytes with the bookkeeping the pool needs to
//! manage them: which page is resident, how many guards hold it, and
//! whether it diverged from disk.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// A buffer pool slot.
///
/// The page latch (`RwLock<Page>`) protects page content only. Which page
/// occupies the frame, and the pin count, are pool metadata; the pool's own
/// mutex serializes the transitions that matter (mapping, eviction), so the
/// fields here only need interior mutability, not a second lock protocol.
pub struct Frame {
    page: RwLock<Page>,
    /// Resident page id, `None` while the frame is free.
    page_id: Mutex<Option<PageId>>,
    pin_count: AtomicU32,
    /// Set when the resident page has changes not yet written to disk.
    is_dirty: AtomicBool,
}

impl Frame {
    /// An empty frame holding a zeroed page.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            page_id: Mutex::new(None),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// Read-latch the page content.
    ///
    /// Recursive: the acquisition never queues behind a waiting writer,
    /// so a thread that already holds this latch can take it again
    /// without deadlocking itself.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read_recursive()
    }

    /// Write-latch the page content.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// Id of the resident page, if any.
    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        *self.page_id.lock()
    }

    #[inline]
    pub fn set_page_id(&self, page_id: Option<PageId>) {
        *self.page_id.lock() = page_id;
    }

    /// Take a reference; returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Drop a reference; returns the new pin count.
    ///
    /// # Panics
    /// Panics if the pin count is already zero. An unmatched unpin means a
    /// guard was double-dropped somewhere and the pool state can no longer
    /// be trusted.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::Relaxed);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Relaxed)
    }

    /// A frame is a legal eviction victim when it holds a page nobody pins.
    #[inline]
    pub fn is_evictable(&self) -> bool {
        self.page_id().is_some() && !self.is_pinned()
    }

    /// Return the frame to its freshly-allocated state after eviction.
    pub fn reset(&self) {
        self.page_mut().reset();
        self.set_page_id(None);
        self.pin_count.store(0, Ordering::Relaxed);
        self.is_dirty.store(false, Ordering::Relaxed);
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
