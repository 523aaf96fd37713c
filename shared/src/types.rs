//! Common types used across the inventory

use serde::{Deserialize, Serialize};

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

impl Pagination {
    /// Page size clamped to `max`, never zero
    pub fn limit(&self, max: u32) -> u32 {
        self.per_page.clamp(1, max.max(1))
    }

    /// Rows to skip for the requested page (pages start at 1)
    pub fn offset(&self, max: u32) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit(max))
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: u32, per_page: u32, total_items: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total_items.div_ceil(u64::from(per_page)) as u32
        };
        Self {
            data,
            pagination: PaginationMeta {
                page,
                per_page,
                total_items,
                total_pages,
            },
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_and_limit() {
        let p = Pagination { page: 3, per_page: 20 };
        assert_eq!(p.limit(100), 20);
        assert_eq!(p.offset(100), 40);

        let huge = Pagination { page: 0, per_page: 1000 };
        assert_eq!(huge.limit(100), 100);
        assert_eq!(huge.offset(100), 0);
    }

    #[test]
    fn test_total_pages() {
        let r = PaginatedResponse::new(vec![1, 2], 1, 2, 5);
        assert_eq!(r.pagination.total_pages, 3);
    }
}
