//! Offset pagination shared by every listing: `(page, page_size)` in,
//! `(items, total)` out.

use serde::{Deserialize, Serialize};

use hymnary_api_types::PageResponse;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Clamps `page` to at least 1 and `page_size` to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Builds a request from optional query parameters, applying defaults.
    pub fn from_query(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self::new(page.unwrap_or(1), page_size.unwrap_or(DEFAULT_PAGE_SIZE))
    }

    pub fn first(page_size: u32) -> Self {
        Self::new(1, page_size)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Rows to skip, saturating for absurdly large page numbers.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1).saturating_mul(u64::from(self.page_size))
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page(),
            page_size: request.page_size(),
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request)
    }

    pub fn total_pages(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let pages = self.total.div_ceil(u64::from(self.page_size.max(1)));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }

    pub fn into_response(self) -> PageResponse<T> {
        let total_pages = self.total_pages();
        PageResponse {
            items: self.items,
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            total_pages,
        }
    }
}

/// Applies a page request to an already materialized result set.
///
/// Follows the same contract as the repository queries so callers that must
/// filter in memory still page consistently.
pub fn paginate_slice<T: Clone>(items: &[T], request: PageRequest) -> Paginated<T> {
    let total = items.len() as u64;
    let start = usize::try_from(request.offset())
        .unwrap_or(usize::MAX)
        .min(items.len());
    let end = start
        .saturating_add(request.page_size() as usize)
        .min(items.len());
    Paginated::new(items[start..end].to_vec(), total, request)
}
