//! Ordered cursor over the leaf chain.

use std::marker::PhantomData;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result};
use crate::index::btree::key::IndexKey;
use crate::index::btree::leaf::LeafPage;
use crate::storage::page::PageType;

/// Forward cursor over a B+ tree's leaf chain.
///
/// The iterator holds no page latch or pin between steps: each `next()`
/// fetches the current leaf, reads one entry, and releases the page before
/// returning. Scans are therefore weakly consistent - a concurrent insert
/// or remove may or may not be observed, but every entry yielded was
/// present in the tree at the moment it was read, and keys always come out
/// in strictly ascending order. A scan whose current leaf is deleted out
/// from under it (and the block recycled for another node) terminates
/// early instead of yielding foreign bytes.
///
/// Position is (leaf page id, slot index); an invalid page id is the
/// terminal end state, equal to [`IndexIterator::end`].
pub struct IndexIterator<'a, K: IndexKey> {
    bpm: &'a BufferPoolManager,
    page_id: PageId,
    index: usize,
    /// Leaf size as of the last fetch, refreshed on every step.
    size: usize,
    _key: PhantomData<K>,
}

impl<'a, K: IndexKey> IndexIterator<'a, K> {
    pub(crate) fn new(bpm: &'a BufferPoolManager, page_id: PageId, index: usize, size: usize) -> Self {
        Self {
            bpm,
            page_id,
            index,
            size,
            _key: PhantomData,
        }
    }

    /// The terminal sentinel.
    pub(crate) fn end(bpm: &'a BufferPoolManager) -> Self {
        Self::new(bpm, PageId::INVALID, 0, 0)
    }

    /// Whether the cursor has run off the end of the leaf chain.
    pub fn is_end(&self) -> bool {
        !self.page_id.is_valid()
    }
}

impl<K: IndexKey> Iterator for IndexIterator<'_, K> {
    type Item = Result<(K, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if !self.page_id.is_valid() {
                return None;
            }

            let guard = match self.bpm.fetch_page_read(self.page_id) {
                Ok(guard) => guard,
                Err(e) => {
                    self.page_id = PageId::INVALID;
                    return Some(Err(e));
                }
            };

            // The leaf may have been coalesced away and its block recycled
            // while the cursor was parked on it; a weakly consistent scan
            // simply ends there.
            if guard.header().page_type != PageType::BTreeLeaf {
                self.page_id = PageId::INVALID;
                return None;
            }

            let leaf = LeafPage::<K>::new(guard.as_slice());
            // A concurrent remove may have shrunk the leaf under us.
            self.size = leaf.size();

            if self.index < self.size {
                let item = (leaf.key_at(self.index), leaf.record_at(self.index));
                self.index += 1;
                return Some(Ok(item));
            }

            self.page_id = leaf.next_page_id();
            self.index = 0;
        }
    }
}

impl<K: IndexKey> PartialEq for IndexIterator<'_, K> {
    fn eq(&self, other: &Self) -> bool {
        self.page_id == other.page_id && (self.is_end() || self.index == other.index)
    }
}

impl<K: IndexKey> Eq for IndexIterator<'_, K> {}
