//! Header page - the page-0 directory of index roots.
//!
//! The first page of every database file is a small append-growing
//! directory mapping each index name to its current root page id. An index
//! registers itself here when its first root is created and rewrites its
//! entry on every subsequent root change, so the tree can be reopened from
//! a cold file.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       13    PageHeader (type = Header)
//! 13      2     record_count (u16, little-endian)
//! 15      36×N  records: [name: 32 bytes, zero-padded][root page id: u32]
//! ```

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};

use super::page::Page;
use super::page_header::{PageHeader, PageType};

const OFFSET_RECORD_COUNT: usize = PageHeader::SIZE;
const OFFSET_RECORDS: usize = OFFSET_RECORD_COUNT + 2;

/// Maximum length of an index name, in bytes.
pub const MAX_INDEX_NAME_LEN: usize = 32;

const RECORD_SIZE: usize = MAX_INDEX_NAME_LEN + 4;

/// Maximum number of directory records a header page can hold.
pub const MAX_HEADER_RECORDS: usize = (PAGE_SIZE - OFFSET_RECORDS) / RECORD_SIZE;

fn record_offset(index: usize) -> usize {
    OFFSET_RECORDS + index * RECORD_SIZE
}

fn record_name(data: &[u8], index: usize) -> &[u8] {
    let off = record_offset(index);
    let name = &data[off..off + MAX_INDEX_NAME_LEN];
    let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
    &name[..end]
}

fn record_root(data: &[u8], index: usize) -> PageId {
    let off = record_offset(index) + MAX_INDEX_NAME_LEN;
    PageId::new(u32::from_le_bytes([
        data[off],
        data[off + 1],
        data[off + 2],
        data[off + 3],
    ]))
}

fn record_count(data: &[u8]) -> usize {
    u16::from_le_bytes([data[OFFSET_RECORD_COUNT], data[OFFSET_RECORD_COUNT + 1]]) as usize
}

/// Read-only view of the header page.
pub struct HeaderPage<'a> {
    data: &'a [u8],
}

impl<'a> HeaderPage<'a> {
    /// Construct a view over an existing header page.
    ///
    /// # Panics
    /// Panics if the page's type tag is not [`PageType::Header`].
    pub fn new(page: &'a Page) -> Self {
        let header = page.header();
        assert!(
            header.page_type == PageType::Header,
            "expected header page, found {:?}",
            header.page_type
        );
        Self {
            data: page.as_slice(),
        }
    }

    /// Number of directory records.
    pub fn record_count(&self) -> usize {
        record_count(self.data)
    }

    /// Look up the root page id registered under `name`.
    pub fn root_of(&self, name: &str) -> Option<PageId> {
        let count = self.record_count();
        (0..count)
            .find(|&i| record_name(self.data, i) == name.as_bytes())
            .map(|i| record_root(self.data, i))
    }
}

/// Mutable view of the header page.
pub struct HeaderPageMut<'a> {
    data: &'a mut [u8],
}

impl<'a> HeaderPageMut<'a> {
    /// Construct a mutable view over an existing header page.
    ///
    /// # Panics
    /// Panics if the page's type tag is not [`PageType::Header`].
    pub fn new(page: &'a mut Page) -> Self {
        let header = page.header();
        assert!(
            header.page_type == PageType::Header,
            "expected header page, found {:?}",
            header.page_type
        );
        Self {
            data: page.as_mut_slice(),
        }
    }

    /// Format a fresh (zeroed) page as an empty header page.
    pub fn init(page: &'a mut Page) -> Self {
        page.set_header(&PageHeader::new(PageType::Header));
        let data = page.as_mut_slice();
        data[OFFSET_RECORD_COUNT..OFFSET_RECORD_COUNT + 2].copy_from_slice(&0u16.to_le_bytes());
        Self { data }
    }

    fn set_record_count(&mut self, count: usize) {
        self.data[OFFSET_RECORD_COUNT..OFFSET_RECORD_COUNT + 2]
            .copy_from_slice(&(count as u16).to_le_bytes());
    }

    fn write_record(&mut self, index: usize, name: &str, root: PageId) {
        let off = record_offset(index);
        self.data[off..off + MAX_INDEX_NAME_LEN].fill(0);
        self.data[off..off + name.len()].copy_from_slice(name.as_bytes());
        self.data[off + MAX_INDEX_NAME_LEN..off + RECORD_SIZE]
            .copy_from_slice(&root.0.to_le_bytes());
    }

    fn find(&self, name: &str) -> Option<usize> {
        let count = record_count(self.data);
        (0..count).find(|&i| record_name(self.data, i) == name.as_bytes())
    }

    /// Append a new record. Fails if the name is too long, already present,
    /// or the directory is full.
    pub fn insert_record(&mut self, name: &str, root: PageId) -> Result<()> {
        if name.len() > MAX_INDEX_NAME_LEN {
            return Err(Error::IndexNameTooLong(name.to_string()));
        }
        if self.find(name).is_some() {
            // Registering twice is a caller bug; treat as an update.
            let updated = self.update_record(name, root);
            debug_assert!(updated);
            return Ok(());
        }
        let count = record_count(self.data);
        if count >= MAX_HEADER_RECORDS {
            return Err(Error::HeaderDirectoryFull);
        }
        self.write_record(count, name, root);
        self.set_record_count(count + 1);
        Ok(())
    }

    /// Rewrite the root of an existing record. Returns false if `name` has
    /// never been registered.
    pub fn update_record(&mut self, name: &str, root: PageId) -> bool {
        match self.find(name) {
            Some(i) => {
                let off = record_offset(i) + MAX_INDEX_NAME_LEN;
                self.data[off..off + 4].copy_from_slice(&root.0.to_le_bytes());
                true
            }
            None => false,
        }
    }
}
