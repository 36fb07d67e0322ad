//! The page cache proper.
//!
//! [`BufferPoolManager`] keeps hot pages in a fixed set of frames, tracks
//! who is using them with pin counts, writes dirty pages back with a fresh
//! checksum, and evicts the least-recently-unpinned frame when it needs
//! room.

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;

use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::DiskManager;

/// Pool metadata: which frame backs which page id, and what is evictable.
///
/// All of it lives behind one mutex so that a fetch racing an eviction can
/// never observe a half-updated mapping.
struct PoolState {
    /// Which frame holds which resident page.
    page_table: HashMap<PageId, FrameId>,

    /// Unoccupied frames, reused LIFO.
    free_list: Vec<FrameId>,

    /// Eviction order over unpinned frames.
    replacer: LruReplacer,
}

/// Manages a pool of buffer frames for caching disk pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌───────────────────────────┐  ┌────────────────────────┐  │
/// │  │   state: Mutex<PoolState> │  │   frames: Vec<Frame>   │  │
/// │  │  page_table  PageId→Fid   │─▶│ [Frame0] [Frame1] ...  │  │
/// │  │  free_list   Vec<FrameId> │  │  each: RwLock<Page>    │  │
/// │  │  replacer    LruReplacer  │  │        pin, dirty      │  │
/// │  └───────────────────────────┘  └────────────────────────┘  │
/// │  ┌──────────────────────┐  ┌─────────────────────────────┐  │
/// │  │ disk_manager: Mutex  │  │ stats: atomics (no lock)    │  │
/// │  └──────────────────────┘  └─────────────────────────────┘  │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// One pool mutex serializes every metadata mutation: page-table updates,
/// free-list pushes/pops, replacer changes, and pin-count transitions. The
/// per-frame page `RwLock` is orthogonal: it protects page *content* for
/// readers and writers, never pool bookkeeping. Lock order is always
/// pool state → disk manager, and a page latch is never acquired while the
/// pool mutex is held except on frames that are unmapped or pin-count zero
/// (which no guard can be latching).
///
/// # Usage
/// ```ignore
/// let dm = DiskManager::create("pages.db")?;
/// let bpm = BufferPoolManager::new(10, dm);
///
/// let mut guard = bpm.new_page()?;
/// guard.payload_mut()[0] = 0xAB;
/// drop(guard); // marked dirty, unpinned
///
/// let guard = bpm.fetch_page_read(PageId::new(0))?;
/// let data = guard.payload();
/// ```
pub struct BufferPoolManager {
    /// Frame array, fixed at construction.
    frames: Vec<Frame>,

    /// Page table, free list, and replacer behind the one pool mutex.
    state: Mutex<PoolState>,

    disk_manager: Mutex<DiskManager>,

    stats: BufferPoolStats,

    pool_size: usize,
}

impl BufferPoolManager {
    /// A pool of `pool_size` frames over `disk_manager`'s file.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..pool_size).map(FrameId::new).collect();

        Self {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                replacer: LruReplacer::new(),
            }),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Fetching
    // ========================================================================

    /// Pin a page for shared access, loading it from disk if it is not
    /// resident.
    ///
    /// The read latch is recursive: a thread may fetch a page it already
    /// holds read guards on. Fetching a page the thread holds a *write*
    /// guard on blocks until that guard drops, which from the same thread
    /// is a deadlock.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if every frame is pinned
    /// - `Error::Corrupted` if the on-disk bytes fail checksum verification
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Pin a page for exclusive access. Same loading behavior as
    /// [`fetch_page_read`](Self::fetch_page_read); the guard marks the page
    /// dirty when it drops.
    ///
    /// Blocks until every other guard on the page is gone. A thread must
    /// not request a write guard on a page it already holds any guard on;
    /// that wait can never finish.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Like [`fetch_page_read`](Self::fetch_page_read), but returns None
    /// instead of an error (typically: all frames pinned).
    pub fn checked_read_page(&self, page_id: PageId) -> Option<PageReadGuard<'_>> {
        self.fetch_page_read(page_id).ok()
    }

    /// Like [`fetch_page_write`](Self::fetch_page_write), but returns None
    /// instead of an error (typically: all frames pinned).
    pub fn checked_write_page(&self, page_id: PageId) -> Option<PageWriteGuard<'_>> {
        self.fetch_page_write(page_id).ok()
    }

    // ========================================================================
    // Page lifecycle
    // ========================================================================

    /// Allocate a page id on disk without bringing it into the pool.
    ///
    /// The block is zeroed; a later fetch materializes it in a frame.
    pub fn allocate_page_id(&self) -> Result<PageId> {
        let mut dm = self.disk_manager.lock();
        dm.allocate_page()
    }

    /// Allocate a fresh page and return it pinned for writing.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if every frame is pinned
    /// - I/O errors from disk allocation
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let (frame_id, page_id) = {
            let mut state = self.state.lock();
            let frame_id = self.acquire_frame(&mut state)?;

            let page_id = match self.disk_manager.lock().allocate_page() {
                Ok(pid) => pid,
                Err(e) => {
                    state.free_list.push(frame_id);
                    return Err(e);
                }
            };

            let frame = &self.frames[frame_id.0];
            frame.page_mut().reset();
            frame.set_page_id(Some(page_id));
            frame.pin();

            state.page_table.insert(page_id, frame_id);
            state.replacer.remove(frame_id);
            (frame_id, page_id)
        };

        // The frame is pinned, so it cannot be evicted between releasing the
        // pool mutex and latching the page here.
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Delete a page: drop it from the pool and deallocate its disk block.
    ///
    /// A page that is not resident is still deallocated on disk.
    ///
    /// # Errors
    /// - `Error::PagePinned` if the page is still pinned
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.0];

            if frame.is_pinned() {
                return Err(Error::PagePinned(page_id.0));
            }

            state.page_table.remove(&page_id);
            state.replacer.remove(frame_id);
            frame.set_page_id(None);
            frame.clear_dirty();
            state.free_list.push(frame_id);
        }

        self.disk_manager.lock().deallocate_page(page_id)
    }

    // ========================================================================
    // Writeback
    // ========================================================================

    /// Force a page to disk, dirty or not, and clear its dirty flag.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page is not resident
    /// - I/O errors from the disk write
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        // Pin the frame so it cannot be evicted, then write outside the
        // pool mutex (the write blocks on the page latch if a writer holds it).
        let frame_id = {
            let mut state = self.state.lock();
            let frame_id = state
                .page_table
                .get(&page_id)
                .copied()
                .ok_or(Error::PageNotFound(page_id.0))?;
            self.frames[frame_id.0].pin();
            state.replacer.set_evictable(frame_id, false);
            frame_id
        };

        let result = self.write_frame_to_disk(frame_id, page_id);
        self.unpin_page_internal(frame_id, false);
        result
    }

    /// Best-effort writeback of every resident page.
    ///
    /// Pages evicted concurrently are skipped.
    ///
    /// # Errors
    /// - I/O errors from disk writes
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<PageId> = {
            let state = self.state.lock();
            state.page_table.keys().copied().collect()
        };

        for page_id in pages {
            match self.flush_page(page_id) {
                Ok(()) => {}
                Err(Error::PageNotFound(_)) => {} // evicted in the meantime
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Frames not currently holding a page.
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Pages currently resident.
    pub fn page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Pin count of a resident page, or None if the page is not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&fid| self.frames[fid.0].pin_count())
    }

    /// Whether the page currently occupies a frame.
    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    // ========================================================================
    // Guard unpin path
    // ========================================================================

    /// Drop one pin, run by the guards on release.
    ///
    /// The pin transition happens under the pool mutex so that it cannot
    /// interleave with a concurrent fetch or eviction of the same frame.
    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        let mut state = self.state.lock();
        let new_pin_count = frame.unpin();

        if new_pin_count == 0 {
            state.replacer.set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Fetch internals
    // ========================================================================

    /// Make a page resident and pinned, returning its frame.
    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        let mut state = self.state.lock();

        // Cache hit: pin and withdraw from the replacer.
        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.frames[frame_id.0].pin();
            state.replacer.set_evictable(frame_id, false);
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(frame_id);
        }

        // Cache miss: get a frame and load from disk.
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.acquire_frame(&mut state)?;

        let page_data = match self.disk_manager.lock().read_page(page_id) {
            Ok(page) => page,
            Err(e) => {
                state.free_list.push(frame_id);
                return Err(e);
            }
        };

        // A zero stored checksum means the page was never flushed.
        let header = page_data.header();
        if header.checksum != 0 && !page_data.verify_checksum() {
            state.free_list.push(frame_id);
            return Err(Error::Corrupted(page_id.0));
        }

        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        // The frame is unmapped, so its latch is uncontended.
        let frame = &self.frames[frame_id.0];
        frame
            .page_mut()
            .as_mut_slice()
            .copy_from_slice(page_data.as_slice());
        frame.set_page_id(Some(page_id));
        frame.clear_dirty();
        frame.pin();

        state.page_table.insert(page_id, frame_id);
        state.replacer.remove(frame_id);

        Ok(frame_id)
    }

    // ========================================================================
    // Frame acquisition and eviction
    // ========================================================================

    /// A frame ready to receive a page, evicting if none is free. Caller
    /// holds the pool mutex.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let frame_id = state.replacer.evict().ok_or(Error::NoFreeFrames)?;
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);

        let frame = &self.frames[frame_id.0];
        let old_page_id = frame.page_id();

        // Write back a dirty victim. Its pin count is zero, so no guard can
        // hold its latch and the lock below cannot contend.
        if frame.is_dirty() {
            if let Some(pid) = old_page_id {
                let mut page = frame.page_mut();
                page.update_checksum();
                if let Err(e) = self.disk_manager.lock().write_page(pid, &page) {
                    drop(page);
                    state.replacer.set_evictable(frame_id, true);
                    return Err(e);
                }
                drop(page);
                frame.clear_dirty();
                self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(pid) = old_page_id {
            state.page_table.remove(&pid);
        }
        frame.set_page_id(None);
        frame.clear_dirty();

        Ok(frame_id)
    }

    /// Write a pinned frame's content to disk and clear its dirty flag.
    fn write_frame_to_disk(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        let mut page = frame.page_mut();
        page.update_checksum();
        {
            let mut dm = self.disk_manager.lock();
            dm.write_page(page_id, &page)?;
        }
        drop(page);

        frame.clear_dirty();
        self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
