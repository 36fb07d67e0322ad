//! Frame identifier type.

use std::fmt;

/// Index of a slot in the buffer pool's frame array.
///
/// Backed by `usize` so it indexes `Vec<Frame>` directly, without casts.
///
/// # Example
/// ```
/// use crabdb::FrameId;
///
/// let frame_id = FrameId::new(5);
/// assert_eq!(frame_id.0, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}
