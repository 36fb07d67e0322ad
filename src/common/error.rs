//! Error types for crabdb.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in crabdb.
///
/// A single crate-wide error type keeps error handling consistent across
/// the storage, buffer, and index layers.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("page {0} not found")]
    PageNotFound(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("no free frames available in buffer pool")]
    NoFreeFrames,

    /// The provided page ID is invalid (e.g., the sentinel value).
    #[error("invalid page ID: {0}")]
    InvalidPageId(u32),

    /// Page content read from disk failed checksum verification.
    #[error("page {0} is corrupted: checksum mismatch")]
    Corrupted(u32),

    /// Attempted to delete a page that is still pinned.
    #[error("page {0} is still pinned")]
    PagePinned(u32),

    /// Index name does not fit a header page directory slot.
    #[error("index name {0:?} exceeds the directory slot size")]
    IndexNameTooLong(String),

    /// The header page directory has no free slots left.
    #[error("header page directory is full")]
    HeaderDirectoryFull,
}
