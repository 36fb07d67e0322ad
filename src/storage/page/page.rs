//! Page: the 4 KiB unit everything else is built from.

use crate::common::config::PAGE_SIZE;

use super::page_header::PageHeader;

/// A raw page buffer, 4096 bytes at 4096-byte alignment.
///
/// The alignment matches SSD internal pages and the OS page cache, and
/// keeps the buffer eligible for `O_DIRECT` I/O. Every page begins with a
/// [`PageHeader`]; the bytes after it belong to whichever typed view owns
/// the page. Untyped users store their content through
/// [`payload`](Self::payload)/[`payload_mut`](Self::payload_mut), which
/// skip the header region.
///
/// `Page` deliberately does not implement `Clone` outside of tests.
/// Duplicating 4 KiB should be a visible decision at the call site, not
/// something a stray `.clone()` does silently.
///
/// # Example
/// ```
/// use crabdb::storage::page::Page;
///
/// let mut page = Page::new();
/// page.payload_mut()[0] = 0xFF;
/// assert_eq!(page.payload()[0], 0xFF);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// A zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The bytes after the header, where page content lives.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[PageHeader::SIZE..]
    }

    /// Mutable view of the content region.
    ///
    /// The first [`PageHeader::SIZE`] bytes belong to the storage layer:
    /// writeback stamps the checksum there, so content written into the
    /// header region does not survive a flush. Callers working with raw
    /// pages must keep their data inside the payload.
    #[inline]
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.data[PageHeader::SIZE..]
    }

    /// Zero the whole page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Decode the header from the first bytes.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    /// Encode a header into the first bytes.
    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    /// Recompute the CRC32 and store it in the header.
    ///
    /// Must run after the last modification and before the page goes to
    /// disk; the checksum covers every byte outside the checksum field
    /// itself.
    pub fn update_checksum(&mut self) {
        let checksum = PageHeader::compute_checksum(&self.data);
        let checksum_bytes = checksum.to_le_bytes();
        self.data[PageHeader::OFFSET_CHECKSUM..PageHeader::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&checksum_bytes);
    }

    /// Check the stored CRC32 against the page bytes.
    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(&self.data)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.data.copy_from_slice(&self.data);
        new_page
    }
}
