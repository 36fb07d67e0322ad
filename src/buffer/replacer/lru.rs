//! LRU replacement policy.
//!
//! Victims are chosen by recency of *unpin*, not of access: a frame enters
//! the queue when its pin count drops to zero and the least-recently-unpinned
//! frame is evicted first. Marking an already-tracked frame evictable again
//! does not reorder it.

use std::collections::{HashMap, VecDeque};

use crate::common::FrameId;

/// An LRU eviction policy over unpinned frames.
///
/// Queue removal is lazy: pinning a frame only invalidates its queue entry,
/// and `evict()` skips stale entries. Each entry carries an epoch so that a
/// frame that is pinned and later unpinned again re-enters at the
/// most-recently-unpinned position instead of resurrecting its old slot.
pub struct LruReplacer {
    /// Front = least recently unpinned.
    queue: VecDeque<(FrameId, u64)>,

    /// Evictable frames and the epoch of their live queue entry.
    evictable: HashMap<FrameId, u64>,

    /// Monotonic counter for queue-entry epochs.
    epoch: u64,
}

impl LruReplacer {
    /// Create a new LRU replacer.
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            evictable: HashMap::new(),
            epoch: 0,
        }
    }

    /// Mark a frame evictable (pin count dropped to 0) or pinned.
    ///
    /// Marking evictable inserts the frame as most-recently-unpinned; if it
    /// is already tracked this is a no-op. Marking pinned removes it from
    /// the evictable set.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            if !self.evictable.contains_key(&frame_id) {
                self.epoch += 1;
                self.evictable.insert(frame_id, self.epoch);
                self.queue.push_back((frame_id, self.epoch));
            }
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Select and remove the least-recently-unpinned frame.
    ///
    /// Returns None when no frame is evictable.
    pub fn evict(&mut self) -> Option<FrameId> {
        while let Some((frame_id, epoch)) = self.queue.pop_front() {
            match self.evictable.get(&frame_id) {
                Some(&live) if live == epoch => {
                    self.evictable.remove(&frame_id);
                    return Some(frame_id);
                }
                // Stale entry: the frame was pinned (and possibly re-unpinned
                // with a newer epoch) since this entry was queued.
                _ => {}
            }
        }
        None
    }

    /// Remove a frame from the replacer entirely.
    ///
    /// Called when a page is deleted from the buffer pool.
    pub fn remove(&mut self, frame_id: FrameId) {
        self.evictable.remove(&frame_id);
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fid(id: usize) -> FrameId {
        FrameId::new(id)
    }

    #[test]
    fn test_lru_order() {
        let mut replacer = LruReplacer::new();

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        replacer.set_evictable(fid(2), true);

        assert_eq!(replacer.size(), 3);
        assert_eq!(replacer.evict(), Some(fid(0)));
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_duplicate_unpin_keeps_position() {
        let mut replacer = LruReplacer::new();

        // Unpin 1,2,3,4,5,8,1: the second unpin of 1 is ignored.
        for id in [1, 2, 3, 4, 5, 8, 1] {
            replacer.set_evictable(fid(id), true);
        }
        assert_eq!(replacer.size(), 6);

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), Some(fid(3)));
        assert_eq!(replacer.size(), 3);
    }

    #[test]
    fn test_pin_then_reunpin_moves_to_back() {
        let mut replacer = LruReplacer::new();

        for id in [1, 2, 3, 4, 5, 8, 1] {
            replacer.set_evictable(fid(id), true);
        }
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), Some(fid(2)));
        assert_eq!(replacer.evict(), Some(fid(3)));

        // Pinning an evicted frame is a no-op; pinning a live one removes it.
        replacer.set_evictable(fid(3), false);
        replacer.set_evictable(fid(4), false);
        assert_eq!(replacer.size(), 2);

        // Re-unpinning 4 places it at the most-recent end.
        replacer.set_evictable(fid(4), true);
        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.evict(), Some(fid(5)));
        assert_eq!(replacer.evict(), Some(fid(8)));
        assert_eq!(replacer.evict(), Some(fid(4)));
        assert_eq!(replacer.evict(), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_remove() {
        let mut replacer = LruReplacer::new();

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);

        replacer.remove(fid(0));
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_pinned_not_evicted() {
        let mut replacer = LruReplacer::new();

        replacer.set_evictable(fid(0), true);
        replacer.set_evictable(fid(1), true);
        replacer.set_evictable(fid(0), false);

        assert_eq!(replacer.evict(), Some(fid(1)));
        assert_eq!(replacer.evict(), None);
    }
}
