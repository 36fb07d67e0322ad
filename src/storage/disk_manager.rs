//! Page-granular file I/O.
//!
//! The [`DiskManager`] owns the single backing file and moves whole pages
//! in and out of it. It also owns page id allocation, including recycling
//! of deallocated ids.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// I/O and id allocation for one page file.
///
/// Page `n` lives at byte offset `n * PAGE_SIZE`; the file is a flat array
/// of pages with no other framing. Every write is followed by `fsync`, so
/// a completed `write_page` is durable.
///
/// `allocate_page` prefers recycling a previously deallocated id before
/// extending the file. The free list is in-memory only; ids deallocated in
/// a previous process lifetime are not rediscovered on reopen (the blocks
/// stay in the file until an offline compaction, which is out of scope).
///
/// All methods take `&mut self`. Concurrency is the buffer pool's job; it
/// wraps the disk manager in its own mutex.
pub struct DiskManager {
    file: File,
    /// Pages in the file, allocated or free.
    page_count: u32,
    /// Deallocated ids available for reuse.
    free_pages: Vec<PageId>,
}

impl DiskManager {
    /// Create a fresh page file. Fails if the path already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            page_count: 0,
            free_pages: Vec::new(),
        })
    }

    /// Open an existing page file. The page count is derived from the file
    /// length.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self {
            file,
            page_count,
            free_pages: Vec::new(),
        })
    }

    /// Open the file at `path`, creating it first if necessary.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Read one page into a fresh buffer.
    ///
    /// # Errors
    /// `Error::PageNotFound` if `page_id` is beyond the end of the file.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;

        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    /// Write one page and fsync.
    ///
    /// # Errors
    /// `Error::PageNotFound` if `page_id` was never allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;

        Ok(())
    }

    /// Hand out a page id whose block is zeroed on disk.
    ///
    /// Recycles a deallocated id when one is available; otherwise the file
    /// grows by one page. The zeroing write is fsynced before the id is
    /// returned.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = match self.free_pages.pop() {
            Some(pid) => pid,
            None => {
                let pid = PageId::new(self.page_count);
                self.page_count += 1;
                pid
            }
        };

        let offset = (page_id.0 as u64) * (PAGE_SIZE as u64);
        self.file.seek(SeekFrom::Start(offset))?;

        let zeros = [0u8; PAGE_SIZE];
        self.file.write_all(&zeros)?;
        self.file.sync_all()?;

        Ok(page_id)
    }

    /// Return a page id to the allocator for reuse.
    ///
    /// The block remains in the file; only the id becomes reusable.
    /// Deallocating an id twice is a no-op.
    ///
    /// # Errors
    /// `Error::InvalidPageId` for the sentinel id or an id that was never
    /// allocated.
    pub fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() || page_id.0 >= self.page_count {
            return Err(Error::InvalidPageId(page_id.0));
        }
        if !self.free_pages.contains(&page_id) {
            self.free_pages.push(page_id);
        }
        Ok(())
    }

    /// Force a final sync. The file handle itself closes on drop.
    pub fn shut_down(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Pages in the file, allocated or free.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Deallocated ids awaiting reuse.
    #[inline]
    pub fn free_page_count(&self) -> usize {
        self.free_pages.len()
    }

    /// File length implied by the page count.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }
}
