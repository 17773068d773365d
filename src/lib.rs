//! # Photo Catalog
//!
//! Turns a directory of photographs into a paginated, infinite-scroll gallery
//! backend. The directory is the data source: every decodable image becomes a
//! catalog entry with its dimensions, camera metadata and a BlurHash
//! placeholder the client paints while the real image loads.
//!
//! # Architecture: Generate Offline, Serve Online
//!
//! ```text
//! photos/  ──build──▶  catalog.json  ──serve──▶  GET /api/photos?page=&limit=
//!    │                                                 │
//!    └──compress──▶  compressed/*_compressed.*         ▼
//!                    compressed/*_thumb.*        infinite-scroll client
//!                    compressed/compression-report.md
//! ```
//!
//! `build` and `compress` are independent batch jobs over the same photo
//! list. The server never scans the directory: it pages over the published
//! catalog, and picks up a rebuilt artifact on the next request.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Lists the photo files of the source directory |
//! | [`catalog`] | Entry model, parallel builder, snapshot store with atomic replace |
//! | [`placeholder`] | BlurHash encoder |
//! | [`imaging`] | Pure-Rust decode/encode backend, EXIF reading, the codec pool |
//! | [`compress`] | Derivative and thumbnail pipeline |
//! | [`cache`] | Content-addressed encode cache for `compress` |
//! | [`report`] | Markdown compression report |
//! | [`pagination`] | Offset/limit paging with silent clamping |
//! | [`server`] | axum read API |
//! | [`client`] | Infinite-scroll state machine and HTTP fetcher |
//! | [`types`] | Wire types shared by server and client |
//! | [`naming`] | Id and derivative filename conventions |
//! | [`config`] | `config.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Partial Failure Is Normal
//!
//! A corrupt file never fails a batch. The builder drops it with a warning
//! and the compressor lists it in the report; only an unreadable source
//! directory or an unwritable output stops a run.
//!
//! ## Immutable Snapshots
//!
//! The catalog is never edited in place. A rebuild writes a new artifact to a
//! temp file, renames it over the old one, and swaps an `Arc`. A request
//! that already holds the previous snapshot finishes on it.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding and encoding use the `image` crate and EXIF comes from
//! `kamadak-exif`. No system libraries are needed, so the binary runs
//! anywhere it compiles.

pub mod cache;
pub mod catalog;
pub mod client;
pub mod compress;
pub mod config;
pub mod imaging;
pub mod logging;
pub mod naming;
pub mod output;
pub mod pagination;
pub mod placeholder;
pub mod report;
pub mod scan;
pub mod server;
pub mod types;
