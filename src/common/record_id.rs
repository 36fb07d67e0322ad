//! Record identifier type.

use std::fmt;

use crate::common::PageId;

/// Identifies a record (tuple) by its physical position: the page that
/// stores it and the slot within that page.
///
/// This is the value type stored in B+ tree leaves. It is not interpreted
/// by the index itself; the executor layer resolves it against data pages.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    /// Page holding the record.
    pub page_id: u32,
    /// Slot number within the page.
    pub slot: u32,
}

impl RecordId {
    /// Serialized size in bytes.
    pub const ENCODED_LEN: usize = 8;

    /// Create a new RecordId.
    #[inline]
    pub fn new(page_id: PageId, slot: u32) -> Self {
        Self {
            page_id: page_id.0,
            slot,
        }
    }

    /// Write the little-endian encoding into `buf` (must be 8 bytes).
    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.page_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.slot.to_le_bytes());
    }

    /// Read a RecordId back from its little-endian encoding.
    pub fn decode(buf: &[u8]) -> Self {
        let page_id = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let slot = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Self { page_id, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, {})", self.page_id, self.slot)
    }
}
