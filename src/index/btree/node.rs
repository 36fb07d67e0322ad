//! Shared on-page layout for B+ tree nodes.
//!
//! Both node kinds begin with the common [`PageHeader`] followed by:
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 13      2     size (entry count, little-endian)
//! 15      2     max_size (little-endian)
//! ```
//! Leaf pages add a next-leaf pointer before their entry array; internal
//! pages start their entry array right after `max_size`. A node's parent is
//! never stored: mutating operations keep the descent path latched, so the
//! parent is always in hand when it is needed.

use crate::storage::page::{PageHeader, PageType};

pub(crate) const OFFSET_SIZE: usize = PageHeader::SIZE;
pub(crate) const OFFSET_MAX_SIZE: usize = OFFSET_SIZE + 2;

/// Leaf-only: page id of the next leaf in the chain.
pub(crate) const OFFSET_LEAF_NEXT: usize = OFFSET_MAX_SIZE + 2;
pub(crate) const LEAF_ENTRIES_OFFSET: usize = OFFSET_LEAF_NEXT + 4;
pub(crate) const INTERNAL_ENTRIES_OFFSET: usize = OFFSET_MAX_SIZE + 2;

#[inline]
pub(crate) fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

#[inline]
pub(crate) fn write_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[inline]
pub(crate) fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// The node kind tag of a tree page.
#[inline]
pub(crate) fn node_kind(data: &[u8]) -> PageType {
    PageHeader::from_bytes(data).page_type
}

/// Whether a tree page is a leaf.
#[inline]
pub(crate) fn is_leaf(data: &[u8]) -> bool {
    node_kind(data) == PageType::BTreeLeaf
}

#[inline]
pub(crate) fn node_size(data: &[u8]) -> usize {
    read_u16(data, OFFSET_SIZE) as usize
}

#[inline]
pub(crate) fn node_max_size(data: &[u8]) -> usize {
    read_u16(data, OFFSET_MAX_SIZE) as usize
}
