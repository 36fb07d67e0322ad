//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - The raw 4KB data container
//! - [`PageHeader`] - Metadata at the start of every page
//! - [`PageType`] - Discriminator for different page formats
//! - [`HeaderPage`] / [`HeaderPageMut`] - Views of the page-0 root directory

mod header_page;
#[allow(clippy::module_inception)]
mod page;
mod page_header;

pub use header_page::{HeaderPage, HeaderPageMut, MAX_HEADER_RECORDS, MAX_INDEX_NAME_LEN};
pub use page::Page;
pub use page_header::{PageHeader, PageType};
