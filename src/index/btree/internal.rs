//! Internal page layout and typed views.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       13    PageHeader (type = BTreeInternal)
//! 13      2     size (child count)
//! 15      2     max_size
//! 17      ...   entries: (separator key, child page id) pairs
//! ```
//! Each entry is `K::ENCODED_LEN + 4` bytes. Slot 0's key is an unused
//! sentinel: the key at slot i (i > 0) is the smallest key reachable
//! through child i. Like leaves, the entry array reserves `max_size + 1`
//! slots for the transient overflow between insert and split.

use std::marker::PhantomData;

use crate::common::config::PAGE_SIZE;
use crate::common::PageId;
use crate::index::btree::key::IndexKey;
use crate::index::btree::node::{
    node_max_size, node_size, read_u32, write_u16, write_u32, INTERNAL_ENTRIES_OFFSET,
    OFFSET_MAX_SIZE, OFFSET_SIZE,
};
use crate::storage::page::{Page, PageHeader, PageType};

// ============================================================================
// Layout helpers
// ============================================================================

#[inline]
fn entry_size<K: IndexKey>() -> usize {
    K::ENCODED_LEN + 4
}

#[inline]
fn entry_offset<K: IndexKey>(index: usize) -> usize {
    INTERNAL_ENTRIES_OFFSET + index * entry_size::<K>()
}

#[inline]
fn read_key<K: IndexKey>(data: &[u8], index: usize) -> K {
    let off = entry_offset::<K>(index);
    K::decode(&data[off..off + K::ENCODED_LEN])
}

#[inline]
fn read_child<K: IndexKey>(data: &[u8], index: usize) -> PageId {
    PageId::new(read_u32(data, entry_offset::<K>(index) + K::ENCODED_LEN))
}

/// Slot holding `child`, or None if it is not a child of this node.
fn find_child<K: IndexKey>(data: &[u8], child: PageId) -> Option<usize> {
    (0..node_size(data)).find(|&i| read_child::<K>(data, i) == child)
}

/// Child whose key range contains `key`: the last slot i with
/// key_at(i) <= key (slot 0 catches everything below key_at(1)).
fn route<K: IndexKey>(data: &[u8], key: &K) -> PageId {
    let size = node_size(data);
    debug_assert!(size >= 1);
    let mut lo = 1;
    let mut hi = size;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if read_key::<K>(data, mid) <= *key {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    read_child::<K>(data, lo - 1)
}

// ============================================================================
// Read view
// ============================================================================

/// Read-only view of an internal page.
///
/// # Panics
/// Construction panics if the page is not typed `BTreeInternal`.
pub struct InternalPage<'a, K: IndexKey> {
    data: &'a [u8],
    _key: PhantomData<K>,
}

impl<'a, K: IndexKey> InternalPage<'a, K> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(
            PageHeader::from_bytes(data).page_type,
            PageType::BTreeInternal,
            "page is not a B+ tree internal node"
        );
        Self {
            data,
            _key: PhantomData,
        }
    }

    pub fn size(&self) -> usize {
        node_size(self.data)
    }

    pub fn max_size(&self) -> usize {
        node_max_size(self.data)
    }

    pub fn min_size(&self) -> usize {
        self.max_size() / 2
    }

    pub fn key_at(&self, index: usize) -> K {
        debug_assert!(index < self.size());
        read_key::<K>(self.data, index)
    }

    pub fn child_at(&self, index: usize) -> PageId {
        debug_assert!(index < self.size());
        read_child::<K>(self.data, index)
    }

    /// Child to descend into for `key`.
    pub fn lookup(&self, key: &K) -> PageId {
        route::<K>(self.data, key)
    }

    /// Slot holding `child`, or None if it is not a child of this node.
    pub fn child_index(&self, child: PageId) -> Option<usize> {
        find_child::<K>(self.data, child)
    }
}

// ============================================================================
// Write view
// ============================================================================

/// Mutable view of an internal page.
pub struct InternalPageMut<'a, K: IndexKey> {
    data: &'a mut [u8],
    _key: PhantomData<K>,
}

impl<'a, K: IndexKey> InternalPageMut<'a, K> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(
            PageHeader::from_bytes(data).page_type,
            PageType::BTreeInternal,
            "page is not a B+ tree internal node"
        );
        Self {
            data,
            _key: PhantomData,
        }
    }

    /// Format a fresh page as an empty internal node.
    ///
    /// # Panics
    /// Panics if `max_size + 1` entries do not fit in a page, or if
    /// `max_size < 3` (an internal node must hold at least two children
    /// plus split slack).
    pub fn init(page: &mut Page, max_size: usize) -> InternalPageMut<'_, K> {
        assert!(max_size >= 3, "internal max_size must be at least 3");
        assert!(
            INTERNAL_ENTRIES_OFFSET + (max_size + 1) * entry_size::<K>() <= PAGE_SIZE,
            "internal max_size too large for page"
        );

        page.set_header(&PageHeader::new(PageType::BTreeInternal));
        let data = page.as_mut_slice();
        write_u16(data, OFFSET_SIZE, 0);
        write_u16(data, OFFSET_MAX_SIZE, max_size as u16);

        InternalPageMut {
            data,
            _key: PhantomData,
        }
    }

    pub fn size(&self) -> usize {
        node_size(self.data)
    }

    pub fn max_size(&self) -> usize {
        node_max_size(self.data)
    }

    pub fn min_size(&self) -> usize {
        self.max_size() / 2
    }

    pub fn key_at(&self, index: usize) -> K {
        debug_assert!(index < self.size());
        read_key::<K>(self.data, index)
    }

    pub fn set_key_at(&mut self, index: usize, key: &K) {
        debug_assert!(index < self.size());
        let off = entry_offset::<K>(index);
        key.encode(&mut self.data[off..off + K::ENCODED_LEN]);
    }

    pub fn child_at(&self, index: usize) -> PageId {
        debug_assert!(index < self.size());
        read_child::<K>(self.data, index)
    }

    pub fn lookup(&self, key: &K) -> PageId {
        route::<K>(self.data, key)
    }

    /// Slot holding `child`, or None if it is not a child of this node.
    pub fn child_index(&self, child: PageId) -> Option<usize> {
        find_child::<K>(self.data, child)
    }

    fn set_size(&mut self, size: usize) {
        write_u16(self.data, OFFSET_SIZE, size as u16);
    }

    fn write_entry(&mut self, index: usize, key: &K, child: PageId) {
        let off = entry_offset::<K>(index);
        key.encode(&mut self.data[off..off + K::ENCODED_LEN]);
        write_u32(self.data, off + K::ENCODED_LEN, child.0);
    }

    /// Set up a fresh root over two children after the old root split.
    /// Slot 0's key is the sentinel; `key` separates `left` from `right`.
    pub fn populate_new_root(&mut self, left: PageId, key: &K, right: PageId) {
        debug_assert_eq!(self.size(), 0);
        self.set_size(2);
        self.write_entry(0, key, left); // slot 0 key is never read
        self.write_entry(1, key, right);
    }

    /// Insert `(key, new_child)` immediately after the slot holding
    /// `old_child`. Returns the new size, which may be `max_size + 1`;
    /// the caller must split afterwards.
    pub fn insert_node_after(&mut self, old_child: PageId, key: &K, new_child: PageId) -> usize {
        let size = self.size();
        let idx = self
            .child_index(old_child)
            .expect("split child is not present in its parent");

        let es = entry_size::<K>();
        let src = entry_offset::<K>(idx + 1);
        let end = entry_offset::<K>(size);
        self.data.copy_within(src..end, src + es);

        self.write_entry(idx + 1, key, new_child);
        self.set_size(size + 1);
        size + 1
    }

    /// Split an overflowed node: move the upper `size / 2` entries into
    /// `right` (freshly initialized, empty). Returns the separator key to
    /// push into the parent; it lands in `right`'s sentinel slot.
    pub fn split_into(&mut self, right: &mut InternalPageMut<'_, K>) -> K {
        let size = self.size();
        debug_assert!(size > self.max_size());
        debug_assert_eq!(right.size(), 0);

        let moved = size / 2;
        let kept = size - moved;

        let es = entry_size::<K>();
        let src = entry_offset::<K>(kept);
        right.data[INTERNAL_ENTRIES_OFFSET..INTERNAL_ENTRIES_OFFSET + moved * es]
            .copy_from_slice(&self.data[src..src + moved * es]);

        right.set_size(moved);
        self.set_size(kept);

        right.key_at(0)
    }

    /// Remove the entry at `index`, shifting later entries left.
    pub fn remove(&mut self, index: usize) {
        let size = self.size();
        debug_assert!(index < size);

        let es = entry_size::<K>();
        let dst = entry_offset::<K>(index);
        let end = entry_offset::<K>(size);
        self.data.copy_within(dst + es..end, dst);
        self.set_size(size - 1);
    }

    /// Merge this whole node into `recipient` (its left neighbor).
    /// `middle_key` is the parent separator between the two; it becomes
    /// the key of this node's first moved child.
    pub fn move_all_to(&mut self, recipient: &mut InternalPageMut<'_, K>, middle_key: &K) {
        self.set_key_at(0, middle_key);

        let size = self.size();
        let recipient_size = recipient.size();
        debug_assert!(recipient_size + size <= recipient.max_size());

        let es = entry_size::<K>();
        let dst = entry_offset::<K>(recipient_size);
        recipient.data[dst..dst + size * es].copy_from_slice(
            &self.data[INTERNAL_ENTRIES_OFFSET..INTERNAL_ENTRIES_OFFSET + size * es],
        );

        recipient.set_size(recipient_size + size);
        self.set_size(0);
    }

    /// Prepend `(key, child)`, shifting existing entries right. The caller
    /// is responsible for first rewriting slot 0's sentinel key so the
    /// shifted entry carries a real separator.
    pub fn insert_front(&mut self, key: &K, child: PageId) {
        let size = self.size();
        let es = entry_size::<K>();
        self.data.copy_within(
            INTERNAL_ENTRIES_OFFSET..entry_offset::<K>(size),
            INTERNAL_ENTRIES_OFFSET + es,
        );
        self.write_entry(0, key, child);
        self.set_size(size + 1);
    }

    /// Append `(key, child)` at the end.
    pub fn push_last(&mut self, key: &K, child: PageId) {
        let size = self.size();
        self.write_entry(size, key, child);
        self.set_size(size + 1);
    }
}
