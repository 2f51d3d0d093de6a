/// Page parsing and pagination metadata for listing endpoints
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};

/// Raw `?page=&search=` query string
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub search: Option<String>,
}

/// A paginated read, either over everything or filtered by a search term
#[derive(Debug, Clone, PartialEq)]
pub enum ListQuery {
    All { page: i64 },
    Search { page: i64, search: String },
}

impl ListQuery {
    /// Unfiltered listing from a raw query string
    pub fn all(params: &PageParams) -> ApiResult<Self> {
        Ok(ListQuery::All {
            page: parse_page(params.page.as_deref())?,
        })
    }

    /// Search listing from a raw query string; a missing term matches everything
    pub fn search(params: &PageParams) -> ApiResult<Self> {
        Ok(ListQuery::Search {
            page: parse_page(params.page.as_deref())?,
            search: params.search.clone().unwrap_or_default(),
        })
    }

    pub fn page(&self) -> i64 {
        match self {
            ListQuery::All { page } | ListQuery::Search { page, .. } => *page,
        }
    }

    /// Row window for this page; fails when the offset does not fit in an i64
    pub fn window(&self, limit: i64) -> ApiResult<PageWindow> {
        let offset = (self.page() - 1)
            .checked_mul(limit)
            .ok_or_else(|| ApiError::BadRequest("invalid page number".to_string()))?;
        Ok(PageWindow { offset, limit })
    }
}

/// OFFSET/LIMIT pair for a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: i64,
    pub limit: i64,
}

/// Highest page number accepted from clients
pub const MAX_PAGE: i64 = i32::MAX as i64;

/// Parse a `page` value. Empty or "0" means the first page.
pub fn parse_page(raw: Option<&str>) -> ApiResult<i64> {
    let raw = raw.map(str::trim).unwrap_or("");
    if raw.is_empty() || raw == "0" {
        return Ok(1);
    }

    match raw.parse::<i64>() {
        Ok(page) if page > 0 && page <= MAX_PAGE => Ok(page),
        _ => Err(ApiError::BadRequest(format!("invalid page number: {}", raw))),
    }
}

/// Pagination metadata returned with every listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pagination {
    pub next: i64,
    pub current: i64,
    pub previous: i64,
    #[serde(rename = "totalPage")]
    pub total_page: i64,
    /// Total row count across all pages
    pub data: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_page = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            next: page.saturating_add(1),
            current: page,
            previous: page.saturating_sub(1),
            total_page,
            data: total,
        }
    }
}
