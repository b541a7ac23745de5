use serde::{Deserialize, Serialize};

use crate::config::PagingConfig;
use crate::model::{Record, RepositoryError, RepositoryResult};
use crate::query::QueryHandle;

// ============================================================================
// Pager - Page windows over a QueryHandle
// ============================================================================
//
// 1. Count the filtered set (a counting terminal, no rows fetched)
// 2. Derive the window ((page - 1) * size, size)
// 3. Fetch only the window, and only when it can hold anything
//
// ============================================================================

/// The (skip, take) pair for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub skip: u64,
    pub take: u64,
}

impl PageWindow {
    /// `page_number` is 1-based.
    pub fn new(page_number: u64, page_size: u64) -> Self {
        Self {
            skip: page_number.saturating_sub(1).saturating_mul(page_size),
            take: page_size,
        }
    }
}

/// A pagination request as received from a caller; missing values take
/// the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page_number: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageRequest {
    pub fn new(page_number: i64, page_size: i64) -> Self {
        Self {
            page_number: Some(page_number),
            page_size: Some(page_size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_number: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

impl<T> PagedResult<T> {
    pub fn has_previous(&self) -> bool {
        self.page_number > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_number < self.total_pages
    }

    /// Convert the items while keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page_number: self.page_number,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}

/// ceil(total_count / page_size); 0 for an empty set.
pub fn total_pages(total_count: u64, page_size: u64) -> u64 {
    if total_count == 0 || page_size == 0 {
        return 0;
    }
    total_count.div_ceil(page_size)
}

#[derive(Debug, Clone, Default)]
pub struct Pager {
    config: PagingConfig,
}

impl Pager {
    pub fn new(config: PagingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PagingConfig {
        &self.config
    }

    /// Validate the request and clamp the page size to the configured maximum.
    pub fn window(&self, page_number: i64, page_size: i64) -> RepositoryResult<PageWindow> {
        if page_number < 1 {
            return Err(RepositoryError::validation(format!(
                "page number must be at least 1, got {}",
                page_number
            )));
        }
        if page_size < 1 {
            return Err(RepositoryError::validation(format!(
                "page size must be at least 1, got {}",
                page_size
            )));
        }

        let size = (page_size as u64).min(self.config.max_page_size);
        Ok(PageWindow::new(page_number as u64, size))
    }

    pub async fn paginate<T: Record>(
        &self,
        query: QueryHandle<T>,
        page_number: i64,
        page_size: i64,
    ) -> RepositoryResult<PagedResult<T>> {
        let window = self.window(page_number, page_size)?;
        let total_count = query.clone().count().await?;

        let items = if window.skip >= total_count {
            Vec::new()
        } else {
            query.skip(window.skip).take(window.take).to_list().await?
        };

        tracing::debug!(
            page_number,
            page_size = window.take,
            total_count,
            items = items.len(),
            "Paginated query"
        );

        Ok(PagedResult {
            items,
            total_count,
            page_number: page_number as u64,
            page_size: window.take,
            total_pages: total_pages(total_count, window.take),
        })
    }

    pub async fn paginate_request<T: Record>(
        &self,
        query: QueryHandle<T>,
        request: &PageRequest,
    ) -> RepositoryResult<PagedResult<T>> {
        let page_number = request.page_number.unwrap_or(1);
        let page_size = request
            .page_size
            .unwrap_or(self.config.default_page_size as i64);
        self.paginate(query, page_number, page_size).await
    }
}
