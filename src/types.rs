//! Wire types of the read API.
//!
//! The server serializes these and the infinite-scroll client deserializes
//! them, so both ends share one definition.

use crate::catalog::CatalogEntry;
use crate::pagination::Page;
use serde::{Deserialize, Serialize};

/// Body of `GET /api/photos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotosResponse {
    pub photos: Vec<CatalogEntry>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub page: i64,
    pub limit: i64,
    pub total: usize,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
    /// Items on this page.
    pub count: usize,
}

impl From<Page> for PhotosResponse {
    fn from(page: Page) -> Self {
        let pagination = PaginationInfo {
            page: page.page,
            limit: page.limit,
            total: page.total,
            total_pages: page.total_pages,
            has_next: page.has_next,
            has_prev: page.has_prev,
            count: page.items.len(),
        };
        Self {
            photos: page.items,
            pagination,
        }
    }
}

/// Error body, `{"statusCode": 404, "statusMessage": "Photo not found"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub status_message: String,
}
