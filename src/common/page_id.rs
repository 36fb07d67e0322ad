//! Page identifier type.

use std::fmt;

/// Identifies one fixed-size page in the backing file.
///
/// A `u32` id addresses 16 TiB of 4 KiB pages, and it packs tightly into
/// on-page child pointers and leaf chain links, where width matters.
/// `u32::MAX` is reserved as the "no page" sentinel (end of a leaf chain,
/// root of an empty tree).
///
/// # Example
/// ```
/// use crabdb::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert!(!PageId::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// The "no page" sentinel.
    pub const INVALID: PageId = PageId(u32::MAX);

    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// True unless this is the sentinel.
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
