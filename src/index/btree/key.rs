//! Fixed-width key encoding for B+ tree nodes.
//!
//! Tree pages store keys inline at fixed offsets, so every key type must
//! declare its encoded width up front. Comparison always happens on the
//! decoded value, never on raw bytes.

use std::fmt;

/// A key type storable in B+ tree pages.
///
/// Implementors must encode to exactly [`ENCODED_LEN`](Self::ENCODED_LEN)
/// bytes. Ordering comes from the `Ord` impl on the decoded value.
pub trait IndexKey: Copy + Ord + fmt::Debug + Send + Sync + 'static {
    /// Encoded width in bytes.
    const ENCODED_LEN: usize;

    /// Write the key into `buf` (exactly `ENCODED_LEN` bytes).
    fn encode(&self, buf: &mut [u8]);

    /// Read a key back out of `buf` (exactly `ENCODED_LEN` bytes).
    fn decode(buf: &[u8]) -> Self;
}

macro_rules! impl_index_key {
    ($ty:ty, $len:expr) => {
        impl IndexKey for $ty {
            const ENCODED_LEN: usize = $len;

            #[inline]
            fn encode(&self, buf: &mut [u8]) {
                buf[..$len].copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn decode(buf: &[u8]) -> Self {
                let mut bytes = [0u8; $len];
                bytes.copy_from_slice(&buf[..$len]);
                <$ty>::from_le_bytes(bytes)
            }
        }
    };
}

impl_index_key!(u32, 4);
impl_index_key!(u64, 8);
impl_index_key!(i64, 8);
