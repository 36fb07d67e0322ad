//! Concurrent B+ tree index.
//!
//! # Components
//! - [`BPlusTree`] - the tree itself: lookup, insert, remove, range scan
//! - [`IndexKey`] - fixed-width key encoding trait
//! - [`LeafPage`] / [`InternalPage`] - typed views over node pages
//! - [`IndexIterator`] - forward cursor over the leaf chain

mod internal;
mod iterator;
mod key;
mod leaf;
mod node;
mod tree;

pub use internal::{InternalPage, InternalPageMut};
pub use iterator::IndexIterator;
pub use key::IndexKey;
pub use leaf::{LeafPage, LeafPageMut};
pub use tree::BPlusTree;
