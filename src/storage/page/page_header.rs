//! The 13-byte header every page begins with.
//!
//! The header carries a [`PageType`] tag, a CRC32 over the page bytes,
//! and an LSN slot reserved for future write-ahead logging.

/// On-disk page type tag.
///
/// Stored as the first byte of every page; the typed views check it before
/// interpreting the rest of the page.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Never-written or unrecognized page.
    #[default]
    Invalid = 0,
    /// Generic data page.
    Data = 1,
    /// B+ tree internal node.
    BTreeInternal = 2,
    /// B+ tree leaf node.
    BTreeLeaf = 3,
    /// Deallocated, awaiting reuse.
    Free = 4,
    /// The page-0 directory mapping index names to root pages.
    Header = 5,
}

impl PageType {
    /// Decode a tag byte; anything unrecognized maps to `Invalid`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PageType::Data,
            2 => PageType::BTreeInternal,
            3 => PageType::BTreeLeaf,
            4 => PageType::Free,
            5 => PageType::Header,
            _ => PageType::Invalid,
        }
    }
}

/// Decoded form of the per-page header.
///
/// # Layout (13 bytes, all integers little-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     page_type
/// 1       4     checksum (CRC32)
/// 5       8     lsn
/// ```
///
/// The checksum covers the whole page with its own field treated as zero,
/// so a verifier needs no scratch copy. A stored checksum of zero means
/// the page was never checksummed; readers treat that as "not verified"
/// rather than as corruption.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub checksum: u32,
    /// Log sequence number of the last modification. Reserved; the index
    /// layer leaves it at zero.
    pub lsn: u64,
}

impl PageHeader {
    pub const SIZE: usize = 13;

    pub const OFFSET_PAGE_TYPE: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 1;
    pub const OFFSET_LSN: usize = 5;

    /// A header of the given type with zero checksum and LSN.
    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type,
            checksum: 0,
            lsn: 0,
        }
    }

    /// Decode a header from the front of a page buffer.
    ///
    /// # Panics
    /// Panics if `data` is shorter than [`PageHeader::SIZE`].
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        let page_type = PageType::from_u8(data[Self::OFFSET_PAGE_TYPE]);

        let mut checksum_bytes = [0u8; 4];
        checksum_bytes.copy_from_slice(&data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]);
        let checksum = u32::from_le_bytes(checksum_bytes);

        let mut lsn_bytes = [0u8; 8];
        lsn_bytes.copy_from_slice(&data[Self::OFFSET_LSN..Self::OFFSET_LSN + 8]);
        let lsn = u64::from_le_bytes(lsn_bytes);

        Self {
            page_type,
            checksum,
            lsn,
        }
    }

    /// Encode this header into the front of a page buffer.
    ///
    /// # Panics
    /// Panics if `data` is shorter than [`PageHeader::SIZE`].
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        data[Self::OFFSET_PAGE_TYPE] = self.page_type as u8;
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
        data[Self::OFFSET_LSN..Self::OFFSET_LSN + 8].copy_from_slice(&self.lsn.to_le_bytes());
    }

    /// CRC32 of a full page, with the checksum field hashed as zeros.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&page_data[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.update(&page_data[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// True when the stored checksum matches the page bytes.
    pub fn verify_checksum(&self, page_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(page_data)
    }
}
