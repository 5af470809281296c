//! Pagination controls derived from a transaction page

use serde::Serialize;

use crate::models::TransactionPage;

/// Totals at or below this many rows fit on the smallest page size
const SINGLE_PAGE_THRESHOLD: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
    pub page_size: u32,
}

impl Pagination {
    pub fn new(page: u32, total_pages: u32, total: u64, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            total_pages,
            total,
            page_size,
        }
    }

    pub fn from_page(result: &TransactionPage, page_size: u32) -> Self {
        Self::new(result.page, result.total_pages, result.total, page_size)
    }

    /// Last reachable page (at least 1)
    pub fn last_page(&self) -> u32 {
        self.total_pages.max(1)
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Controls are hidden when everything fits on one page
    pub fn is_visible(&self) -> bool {
        !(self.total_pages <= 1 && self.total <= SINGLE_PAGE_THRESHOLD)
    }

    /// Clamp a requested page into `[1, last_page]`
    pub fn clamp(&self, requested: u32) -> u32 {
        requested.clamp(1, self.last_page())
    }

    /// 1-based index range of rows shown on the current page
    pub fn showing(&self) -> Option<(u64, u64)> {
        if self.total == 0 {
            return None;
        }
        let start = u64::from(self.page - 1) * u64::from(self.page_size) + 1;
        let end = (u64::from(self.page) * u64::from(self.page_size)).min(self.total);
        (start <= end).then_some((start, end))
    }
}
