//! Offset/limit pagination over a catalog snapshot.
//!
//! Pure functions: no I/O, no clock. Out-of-range input is clamped silently
//! (page to at least 1, limit to `1..=MAX_LIMIT`), so a request can never
//! fail validation here.

use crate::catalog::{Catalog, CatalogEntry};
use serde::Serialize;

/// Hard cap on page size.
pub const MAX_LIMIT: i64 = 50;

/// One page of catalog entries plus the numbers a client needs to continue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<CatalogEntry>,
    pub page: i64,
    pub limit: i64,
    pub total: usize,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Slice `catalog` into page `page` of size `limit`.
pub fn list(catalog: &Catalog, page: i64, limit: i64) -> Page {
    let page = page.max(1);
    let limit = limit.clamp(1, MAX_LIMIT);
    let total = catalog.entries.len();

    let total_pages = (total as i64 + limit - 1) / limit;
    let offset = (page - 1).saturating_mul(limit);
    let items = usize::try_from(offset)
        .ok()
        .and_then(|start| catalog.entries.get(start..))
        .map(|rest| rest.iter().take(limit as usize).cloned().collect())
        .unwrap_or_default();

    Page {
        items,
        page,
        limit,
        total,
        total_pages,
        has_next: page < total_pages,
        has_prev: page > 1,
    }
}

/// Query parameters as they arrive over HTTP, resolved to numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub page: i64,
    pub limit: i64,
}

impl PageQuery {
    /// Missing or unparseable values fall back (page 1, `default_limit`);
    /// parsed values are clamped.
    pub fn from_params(page: Option<&str>, limit: Option<&str>, default_limit: i64) -> Self {
        let parse = |raw: Option<&str>| raw.and_then(|s| parse_number(s.trim()));
        Self {
            page: parse(page).unwrap_or(1).max(1),
            limit: parse(limit).unwrap_or(default_limit).clamp(1, MAX_LIMIT),
        }
    }
}

/// Integers, or decimals truncated toward zero (`"2.7"` → 2).
fn parse_number(s: &str) -> Option<i64> {
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| f.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64)
}
