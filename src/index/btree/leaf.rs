//! Leaf page layout and typed views.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       13    PageHeader (type = BTreeLeaf)
//! 13      2     size
//! 15      2     max_size
//! 17      4     next leaf page id (u32::MAX = none)
//! 21      ...   entries: (key, record id) pairs, strictly ascending
//! ```
//! Each entry is `K::ENCODED_LEN + 8` bytes. The entry array reserves room
//! for `max_size + 1` entries: an insert may transiently overflow the page
//! before the caller splits it.

use std::marker::PhantomData;

use crate::common::config::PAGE_SIZE;
use crate::common::{PageId, RecordId};
use crate::index::btree::key::IndexKey;
use crate::index::btree::node::{
    node_max_size, node_size, read_u32, write_u16, write_u32, LEAF_ENTRIES_OFFSET, OFFSET_LEAF_NEXT,
    OFFSET_MAX_SIZE, OFFSET_SIZE,
};
use crate::storage::page::{Page, PageHeader, PageType};

// ============================================================================
// Layout helpers
// ============================================================================

#[inline]
fn entry_size<K: IndexKey>() -> usize {
    K::ENCODED_LEN + RecordId::ENCODED_LEN
}

#[inline]
fn entry_offset<K: IndexKey>(index: usize) -> usize {
    LEAF_ENTRIES_OFFSET + index * entry_size::<K>()
}

#[inline]
fn read_key<K: IndexKey>(data: &[u8], index: usize) -> K {
    let off = entry_offset::<K>(index);
    K::decode(&data[off..off + K::ENCODED_LEN])
}

#[inline]
fn read_record<K: IndexKey>(data: &[u8], index: usize) -> RecordId {
    let off = entry_offset::<K>(index) + K::ENCODED_LEN;
    RecordId::decode(&data[off..off + RecordId::ENCODED_LEN])
}

/// First index whose key is >= `key`, or `size` if all keys are smaller.
fn lower_bound<K: IndexKey>(data: &[u8], key: &K) -> usize {
    let mut lo = 0;
    let mut hi = node_size(data);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if read_key::<K>(data, mid) < *key {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

// ============================================================================
// Read view
// ============================================================================

/// Read-only view of a leaf page.
///
/// # Panics
/// Construction panics if the page is not typed `BTreeLeaf`; reinterpreting
/// the wrong page kind is an implementation bug, not a runtime condition.
pub struct LeafPage<'a, K: IndexKey> {
    data: &'a [u8],
    _key: PhantomData<K>,
}

impl<'a, K: IndexKey> LeafPage<'a, K> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(
            PageHeader::from_bytes(data).page_type,
            PageType::BTreeLeaf,
            "page is not a B+ tree leaf"
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

    pub fn next_page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, OFFSET_LEAF_NEXT))
    }

    pub fn key_at(&self, index: usize) -> K {
        debug_assert!(index < self.size());
        read_key::<K>(self.data, index)
    }

    pub fn record_at(&self, index: usize) -> RecordId {
        debug_assert!(index < self.size());
        read_record::<K>(self.data, index)
    }

    /// Slot of the first key >= `key`, or `size()` if none.
    pub fn key_index(&self, key: &K) -> usize {
        lower_bound::<K>(self.data, key)
    }

    /// Exact-match lookup.
    pub fn lookup(&self, key: &K) -> Option<RecordId> {
        let idx = self.key_index(key);
        if idx < self.size() && self.key_at(idx) == *key {
            Some(self.record_at(idx))
        } else {
            None
        }
    }
}

// ============================================================================
// Write view
// ============================================================================

/// Mutable view of a leaf page.
pub struct LeafPageMut<'a, K: IndexKey> {
    data: &'a mut [u8],
    _key: PhantomData<K>,
}

impl<'a, K: IndexKey> LeafPageMut<'a, K> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(
            PageHeader::from_bytes(data).page_type,
            PageType::BTreeLeaf,
            "page is not a B+ tree leaf"
        );
        Self {
            data,
            _key: PhantomData,
        }
    }

    /// Format a fresh page as an empty leaf.
    ///
    /// # Panics
    /// Panics if `max_size + 1` entries do not fit in a page, or if
    /// `max_size < 2`.
    pub fn init(page: &mut Page, max_size: usize) -> LeafPageMut<'_, K> {
        assert!(max_size >= 2, "leaf max_size must be at least 2");
        assert!(
            LEAF_ENTRIES_OFFSET + (max_size + 1) * entry_size::<K>() <= PAGE_SIZE,
            "leaf max_size too large for page"
        );

        page.set_header(&PageHeader::new(PageType::BTreeLeaf));
        let data = page.as_mut_slice();
        write_u16(data, OFFSET_SIZE, 0);
        write_u16(data, OFFSET_MAX_SIZE, max_size as u16);
        write_u32(data, OFFSET_LEAF_NEXT, PageId::INVALID.0);

        LeafPageMut {
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

    pub fn next_page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, OFFSET_LEAF_NEXT))
    }

    pub fn set_next_page_id(&mut self, page_id: PageId) {
        write_u32(self.data, OFFSET_LEAF_NEXT, page_id.0);
    }

    pub fn key_at(&self, index: usize) -> K {
        debug_assert!(index < self.size());
        read_key::<K>(self.data, index)
    }

    pub fn record_at(&self, index: usize) -> RecordId {
        debug_assert!(index < self.size());
        read_record::<K>(self.data, index)
    }

    pub fn key_index(&self, key: &K) -> usize {
        lower_bound::<K>(self.data, key)
    }

    pub fn lookup(&self, key: &K) -> Option<RecordId> {
        let idx = self.key_index(key);
        if idx < self.size() && self.key_at(idx) == *key {
            Some(self.record_at(idx))
        } else {
            None
        }
    }

    fn set_size(&mut self, size: usize) {
        write_u16(self.data, OFFSET_SIZE, size as u16);
    }

    fn write_entry(&mut self, index: usize, key: &K, record: &RecordId) {
        let off = entry_offset::<K>(index);
        key.encode(&mut self.data[off..off + K::ENCODED_LEN]);
        record.encode(&mut self.data[off + K::ENCODED_LEN..off + entry_size::<K>()]);
    }

    /// Insert in sorted position. Returns false on duplicate key.
    ///
    /// May overflow the page to `max_size + 1` entries; the caller must
    /// split afterwards if `size() > max_size()`.
    pub fn insert(&mut self, key: &K, record: &RecordId) -> bool {
        let size = self.size();
        debug_assert!(size <= self.max_size());

        let idx = self.key_index(key);
        if idx < size && self.key_at(idx) == *key {
            return false;
        }

        // Shift entries [idx, size) one slot right
        let es = entry_size::<K>();
        let src = entry_offset::<K>(idx);
        let end = entry_offset::<K>(size);
        self.data.copy_within(src..end, src + es);

        self.write_entry(idx, key, record);
        self.set_size(size + 1);
        true
    }

    /// Remove a key. Returns false if absent (page bytes untouched).
    pub fn remove(&mut self, key: &K) -> bool {
        let size = self.size();
        let idx = self.key_index(key);
        if idx >= size || self.key_at(idx) != *key {
            return false;
        }

        let es = entry_size::<K>();
        let dst = entry_offset::<K>(idx);
        let end = entry_offset::<K>(size);
        self.data.copy_within(dst + es..end, dst);
        self.set_size(size - 1);
        true
    }

    /// Split an overflowed leaf: move the upper `(size + 1) / 2` entries
    /// into `right` (a freshly initialized empty leaf) and splice `right`
    /// into the leaf chain. Returns the separator key for the parent,
    /// which is `right`'s first key.
    pub fn split_into(&mut self, right: &mut LeafPageMut<'_, K>, right_page_id: PageId) -> K {
        let size = self.size();
        debug_assert!(size > self.max_size());
        debug_assert_eq!(right.size(), 0);

        let moved = (size + 1) / 2;
        let kept = size - moved;

        let es = entry_size::<K>();
        let src = entry_offset::<K>(kept);
        right.data[LEAF_ENTRIES_OFFSET..LEAF_ENTRIES_OFFSET + moved * es]
            .copy_from_slice(&self.data[src..src + moved * es]);

        right.set_size(moved);
        right.set_next_page_id(self.next_page_id());
        self.set_size(kept);
        self.set_next_page_id(right_page_id);

        right.key_at(0)
    }

    /// Merge this whole leaf into `recipient` (its left neighbor in the
    /// chain). The recipient inherits this leaf's next pointer.
    pub fn move_all_to(&mut self, recipient: &mut LeafPageMut<'_, K>) {
        let size = self.size();
        let recipient_size = recipient.size();
        debug_assert!(recipient_size + size <= recipient.max_size());

        let es = entry_size::<K>();
        let dst = entry_offset::<K>(recipient_size);
        recipient.data[dst..dst + size * es]
            .copy_from_slice(&self.data[LEAF_ENTRIES_OFFSET..LEAF_ENTRIES_OFFSET + size * es]);

        recipient.set_size(recipient_size + size);
        recipient.set_next_page_id(self.next_page_id());
        self.set_size(0);
    }

    /// Move this leaf's first entry to the end of `recipient` (the left
    /// neighbor). Used to redistribute from a right sibling.
    pub fn move_first_to_end_of(&mut self, recipient: &mut LeafPageMut<'_, K>) {
        let key = self.key_at(0);
        let record = self.record_at(0);

        let recipient_size = recipient.size();
        recipient.write_entry(recipient_size, &key, &record);
        recipient.set_size(recipient_size + 1);

        let size = self.size();
        self.data
            .copy_within(entry_offset::<K>(1)..entry_offset::<K>(size), LEAF_ENTRIES_OFFSET);
        self.set_size(size - 1);
    }

    /// Move this leaf's last entry to the front of `recipient` (the right
    /// neighbor). Used to redistribute from a left sibling.
    pub fn move_last_to_front_of(&mut self, recipient: &mut LeafPageMut<'_, K>) {
        let size = self.size();
        let key = self.key_at(size - 1);
        let record = self.record_at(size - 1);
        self.set_size(size - 1);

        let recipient_size = recipient.size();
        let es = entry_size::<K>();
        recipient.data.copy_within(
            LEAF_ENTRIES_OFFSET..entry_offset::<K>(recipient_size),
            LEAF_ENTRIES_OFFSET + es,
        );
        recipient.write_entry(0, &key, &record);
        recipient.set_size(recipient_size + 1);
    }
}
