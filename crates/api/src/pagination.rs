//! Pagination query and response types.

use iblog_db::repositories::Paged;
use serde::{Deserialize, Serialize};

/// Query parameters for paginated listings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u64,
}

const fn default_page() -> u64 {
    1
}

impl Default for PageQuery {
    fn default() -> Self {
        Self { page: 1 }
    }
}

impl PageQuery {
    /// Clamp the page number to at least 1.
    #[must_use]
    pub const fn page(self) -> u64 {
        if self.page == 0 { 1 } else { self.page }
    }
}

/// One page of a JSON listing with navigation URLs.
///
/// `prev` and `next` are `null` at the boundaries. A page past the end
/// of the data carries empty `items` rather than an error.
#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: u64,
    pub prev: Option<String>,
    pub next: Option<String>,
}

impl<T: Serialize> Page<T> {
    /// Build a page response from repository output.
    pub fn build<M, F>(paged: Paged<M>, base: &str, page: u64, per_page: u64, f: F) -> Self
    where
        F: FnMut(M) -> T,
    {
        let prev = (page > 1).then(|| format!("{base}?page={}", page - 1));
        let next = (page.saturating_mul(per_page) < paged.total)
            .then(|| format!("{base}?page={}", page + 1));

        Self {
            items: paged.items.into_iter().map(f).collect(),
            total: paged.total,
            prev,
            next,
        }
    }
}
