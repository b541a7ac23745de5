// ============================================================================
// Paging
// ============================================================================

pub mod pager;

pub use pager::{total_pages, PageRequest, PageWindow, PagedResult, Pager};
