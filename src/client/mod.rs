//! Infinite-scroll client for the read API.
//!
//! [`Gallery`] holds the accumulated photos and the load state machine:
//!
//! ```text
//!            begin_load            complete(Ok, hasNext)
//!   Idle ───────────────▶ Loading ─────────────────────▶ Idle
//!    ▲                      │  │
//!    │       retry          │  └── complete(Ok, !hasNext) ──▶ Idle + exhausted
//!    └────── Errored ◀──────┘ complete(Err)
//! ```
//!
//! Loads are split in two halves so the caller decides how the request is
//! made: [`Gallery::begin_load`] hands out a [`LoadTicket`] naming the page to
//! fetch, and [`Gallery::complete`] applies the outcome. A ticket issued
//! before a [`Gallery::reset`] is stale and its result is dropped.
//! [`Gallery::load_more`] runs both halves against a [`PageFetcher`].
//!
//! Scroll events go through a [`ScrollTrigger`], which fires near the bottom
//! of the scroll region at most once per debounce window.

pub mod http;

use crate::catalog::CatalogEntry;
use crate::types::PhotosResponse;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Photos requested per page.
pub const PAGE_SIZE: i64 = 24;
/// Distance from the bottom, in pixels, at which the next page is requested.
pub const SCROLL_THRESHOLD: f64 = 200.0;
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(125);
/// Display size for entries whose dimensions are unknown.
pub const FALLBACK_DIMENSIONS: (u32, u32) = (300, 200);
/// Waterfall cell height for entries whose dimensions are unknown.
pub const FALLBACK_ITEM_HEIGHT: u32 = 250;

/// Load failure, classified for display. The message is shown as-is.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    #[error("No photos were found.")]
    NotFound,
    #[error("The server had a problem loading photos. Please try again later.")]
    Server,
    #[error("Could not reach the server. Check your connection and try again.")]
    Network,
}

impl ClientError {
    /// Classify an HTTP error status.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => ClientError::NotFound,
            500..=599 => ClientError::Server,
            _ => ClientError::Network,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Errored(ClientError),
}

/// Permission to fetch one page. Only the newest ticket's result is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub page: i64,
    epoch: u64,
}

/// Source of pages, usually [`http::HttpFetcher`].
pub trait PageFetcher {
    fn fetch_page(&mut self, page: i64, limit: i64) -> Result<PhotosResponse, ClientError>;
}

/// What a [`Gallery::load_more`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing was requested: a load is in flight or the catalog is exhausted.
    Skipped,
    /// A page arrived; holds the number of new photos appended.
    Loaded(usize),
    Failed(ClientError),
}

#[derive(Debug)]
pub struct Gallery {
    items: Vec<CatalogEntry>,
    seen: HashSet<String>,
    /// Next page to request.
    page: i64,
    page_size: i64,
    has_more: bool,
    state: LoadState,
    epoch: u64,
}

impl Default for Gallery {
    fn default() -> Self {
        Self::new(PAGE_SIZE)
    }
}

impl Gallery {
    pub fn new(page_size: i64) -> Self {
        Self {
            items: Vec::new(),
            seen: HashSet::new(),
            page: 1,
            page_size: page_size.max(1),
            has_more: true,
            state: LoadState::Idle,
            epoch: 0,
        }
    }

    pub fn items(&self) -> &[CatalogEntry] {
        &self.items
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// The page the next load will request.
    pub fn next_page(&self) -> i64 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    /// User-facing message for the last failed load.
    pub fn error_message(&self) -> Option<String> {
        match self.state {
            LoadState::Errored(e) => Some(e.to_string()),
            _ => None,
        }
    }

    /// Nothing loaded and nothing on the way.
    pub fn is_empty(&self) -> bool {
        !self.is_loading() && self.items.is_empty()
    }

    /// Start loading the next page, unless one is in flight or none remain.
    pub fn begin_load(&mut self) -> Option<LoadTicket> {
        if self.is_loading() || !self.has_more {
            return None;
        }
        self.state = LoadState::Loading;
        Some(LoadTicket {
            page: self.page,
            epoch: self.epoch,
        })
    }

    /// Apply the result of a load. Returns `false` when the ticket is stale.
    pub fn complete(
        &mut self,
        ticket: LoadTicket,
        result: Result<PhotosResponse, ClientError>,
    ) -> bool {
        if ticket.epoch != self.epoch || !self.is_loading() {
            debug!(page = ticket.page, "discarding stale page");
            return false;
        }
        match result {
            Ok(response) => {
                let received = response.photos.len();
                let before = self.items.len();
                for entry in response.photos {
                    if self.seen.insert(entry.id.clone()) {
                        self.items.push(entry);
                    }
                }
                let duplicates = received - (self.items.len() - before);
                if duplicates > 0 {
                    debug!(duplicates, "page overlapped already loaded photos");
                }
                self.page = ticket.page + 1;
                self.has_more = response.pagination.has_next;
                self.state = LoadState::Idle;
            }
            Err(e) => {
                warn!(page = ticket.page, error = %e, "failed to load photos");
                self.state = LoadState::Errored(e);
            }
        }
        true
    }

    /// Drop everything loaded and start over from page 1.
    pub fn reset(&mut self) {
        self.items.clear();
        self.seen.clear();
        self.page = 1;
        self.has_more = true;
        self.state = LoadState::Idle;
        self.epoch += 1;
    }

    /// Fetch and apply the next page.
    pub fn load_more(&mut self, fetcher: &mut impl PageFetcher) -> LoadOutcome {
        let Some(ticket) = self.begin_load() else {
            return LoadOutcome::Skipped;
        };
        let before = self.items.len();
        let result = fetcher.fetch_page(ticket.page, self.page_size);
        let failure = result.as_ref().err().copied();
        self.complete(ticket, result);
        match failure {
            Some(e) => LoadOutcome::Failed(e),
            None => LoadOutcome::Loaded(self.items.len() - before),
        }
    }

    /// Handle a scroll event; returns a ticket when a load should start.
    pub fn on_scroll(
        &mut self,
        trigger: &mut ScrollTrigger,
        metrics: ScrollMetrics,
        now: Instant,
    ) -> Option<LoadTicket> {
        if self.is_loading() || !self.has_more {
            return None;
        }
        if trigger.fire(metrics, now) {
            self.begin_load()
        } else {
            None
        }
    }
}

/// Geometry of the scroll container, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl ScrollMetrics {
    pub fn near_bottom(&self, threshold: f64) -> bool {
        self.scroll_top + self.client_height >= self.scroll_height - threshold
    }
}

/// Coalesces scroll bursts into at most one trigger per window.
#[derive(Debug, Clone)]
pub struct ScrollTrigger {
    threshold: f64,
    window: Duration,
    last_fired: Option<Instant>,
}

impl Default for ScrollTrigger {
    fn default() -> Self {
        Self::new(SCROLL_THRESHOLD, SCROLL_DEBOUNCE)
    }
}

impl ScrollTrigger {
    pub fn new(threshold: f64, window: Duration) -> Self {
        Self {
            threshold,
            window,
            last_fired: None,
        }
    }

    pub fn fire(&mut self, metrics: ScrollMetrics, now: Instant) -> bool {
        if !metrics.near_bottom(self.threshold) {
            return false;
        }
        if let Some(last) = self.last_fired
            && now.saturating_duration_since(last) < self.window
        {
            return false;
        }
        self.last_fired = Some(now);
        true
    }
}

/// Width and height to lay an entry out with.
pub fn display_dimensions(entry: &CatalogEntry) -> (u32, u32) {
    let (fw, fh) = FALLBACK_DIMENSIONS;
    (
        if entry.width == 0 { fw } else { entry.width },
        if entry.height == 0 { fh } else { entry.height },
    )
}

/// Height of an entry's waterfall cell at `item_width` pixels wide.
pub fn item_height(entry: &CatalogEntry, item_width: f64) -> u32 {
    if entry.width == 0 || entry.height == 0 {
        return FALLBACK_ITEM_HEIGHT;
    }
    let aspect = f64::from(entry.height) / f64::from(entry.width);
    (item_width * aspect).round().max(0.0) as u32
}
