//! This module defines the common functionality for paging data.

use serde::{Deserialize, Serialize};

/// The page number to default to when not specified in a request.
const DEFAULT_PAGE: u64 = 1;
/// The page size to default to when not specified in a request.
const DEFAULT_PAGE_SIZE: u64 = 20;
/// The largest page size a request may ask for.
const MAX_PAGE_SIZE: u64 = 100;

/// The pagination parameters of a list request.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaginationQuery {
    /// The 1-based page number.
    #[serde(default = "default_page")]
    pub page: u64,
    /// How many rows to return per page.
    #[serde(default = "default_page_size", alias = "pageSize")]
    pub page_size: u64,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PaginationQuery {
    /// Clamp the query to sane bounds: pages start at 1 and the page size is
    /// capped at [MAX_PAGE_SIZE].
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }
}

fn default_page() -> u64 {
    DEFAULT_PAGE
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

/// One page of rows plus the bookkeeping a client needs to page through the
/// rest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginated<T> {
    /// The rows of the requested page.
    pub data: Vec<T>,
    /// The 1-based page number that was returned.
    pub page: u64,
    /// The page size that was applied.
    pub page_size: u64,
    /// How many rows exist across all pages.
    pub total: u64,
    /// How many pages exist at the applied page size.
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    /// Wrap one page of `data` with its paging bookkeeping.
    pub fn new(data: Vec<T>, query: PaginationQuery, total: u64) -> Self {
        Self {
            data,
            page: query.page,
            page_size: query.page_size,
            total,
            total_pages: total.div_ceil(query.page_size.max(1)),
        }
    }
}
