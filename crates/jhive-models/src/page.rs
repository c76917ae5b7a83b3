//! Page/limit pagination math.

use serde::{Deserialize, Serialize};

/// Default page size when the client does not ask for one.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Clamp a requested page number to >= 1.
pub fn normalize_page(page: Option<u32>) -> u32 {
    page.unwrap_or(1).max(1)
}

/// Clamp a requested limit to 1..=max.
pub fn normalize_limit(limit: Option<u32>, max: u32) -> u32 {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, max)
}

/// Pagination metadata returned with every list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl PageMeta {
    /// Build metadata from a total count and the normalized page/limit.
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        let total_pages = (total.div_ceil(limit as u64)).max(1);
        Self {
            total,
            page,
            limit,
            total_pages,
        }
    }

    /// Offset of the first document on this page.
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_and_limit_clamping() {
        assert_eq!(normalize_page(None), 1);
        assert_eq!(normalize_page(Some(0)), 1);
        assert_eq!(normalize_page(Some(7)), 7);

        assert_eq!(normalize_limit(None, 100), DEFAULT_PAGE_LIMIT);
        assert_eq!(normalize_limit(Some(0), 100), 1);
        assert_eq!(normalize_limit(Some(500), 100), 100);
    }

    #[test]
    fn total_pages_rounds_up_and_never_hits_zero() {
        assert_eq!(PageMeta::new(0, 1, 20).total_pages, 1);
        assert_eq!(PageMeta::new(20, 1, 20).total_pages, 1);
        assert_eq!(PageMeta::new(21, 1, 20).total_pages, 2);
    }

    #[test]
    fn offset_math() {
        assert_eq!(PageMeta::new(100, 1, 20).offset(), 0);
        assert_eq!(PageMeta::new(100, 3, 20).offset(), 40);
    }
}
