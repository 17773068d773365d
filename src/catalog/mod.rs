//! Photo catalog: the data model, the builder that produces it, and the store
//! that publishes it.
//!
//! A [`Catalog`] is built once per run by [`builder`], written as pretty JSON,
//! and swapped into a [`store::CatalogStore`] as a whole. Entries are never
//! mutated after construction. Readers clone an `Arc<Catalog>` and page over
//! it with [`crate::pagination`].
//!
//! The JSON shape is camelCase and matches what the read API returns:
//!
//! ```json
//! {
//!   "version": 1,
//!   "generatedAt": "2026-10-18T09:30:00Z",
//!   "entries": [
//!     {
//!       "id": "IMG_0001",
//!       "filename": "IMG_0001.jpg",
//!       "path": "/api/photos/IMG_0001.jpg",
//!       "originalPath": "/api/photos/IMG_0001.jpg",
//!       "size": 2480121,
//!       "sizeFormatted": "2.37 MB",
//!       "width": 4000,
//!       "height": 3000,
//!       "perceptualHash": "UBL_:rOpGG-oBUNG,qRj2so|=eE1w^n4S5NH",
//!       "createdAt": "2026-05-01T12:00:00Z",
//!       "modifiedAt": "2026-05-01T12:00:00Z",
//!       "captureTime": "2026-04-30T18:21:04Z",
//!       "exif": { "make": "FUJIFILM", "iso": 200 }
//!     }
//!   ]
//! }
//! ```

pub mod builder;
pub mod store;

use crate::imaging::{BackendError, CaptureMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub use builder::{BuildSummary, build, build_and_publish};
pub use store::CatalogStore;

/// Catalog artifact format version.
pub const CATALOG_VERSION: u32 = 1;

/// A fatal ingestion failure: the run as a whole could not proceed.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("cannot read source directory {path}: {source}")]
    SourceDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("codec pool: {0}")]
    Pool(#[from] BackendError),
    #[error("publishing catalog: {0}")]
    Publish(#[from] StoreError),
}

/// A single photo that could not be cataloged. Logged and dropped.
#[derive(Debug)]
pub struct ItemFailure {
    pub filename: String,
    pub error: BackendError,
}

/// Catalog persistence failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed catalog {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no catalog loaded")]
    Empty,
}

/// A cataloged photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Filename without extension.
    pub id: String,
    /// Basename with extension.
    pub filename: String,
    /// URL the client displays.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
    pub original_path: String,
    /// File size in bytes.
    pub size: u64,
    pub size_formatted: String,
    /// Orientation-corrected pixel width; 0 when unknown.
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub perceptual_hash: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exif: Option<ExifData>,
}

impl CatalogEntry {
    /// Timestamp entries are ordered by: capture time, else modification time.
    pub fn sort_time(&self) -> DateTime<Utc> {
        self.capture_time.unwrap_or(self.modified_at)
    }
}

/// Camera attributes shown alongside a photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExifData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f_number: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<Gps>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gps {
    pub latitude: f64,
    pub longitude: f64,
}

impl ExifData {
    /// `None` when the metadata carries no camera attributes.
    pub fn from_capture(meta: &CaptureMetadata) -> Option<Self> {
        if meta.is_empty() {
            return None;
        }
        Some(Self {
            make: meta.make.clone(),
            model: meta.model.clone(),
            exposure_time: meta.exposure_time,
            f_number: meta.f_number,
            iso: meta.iso,
            focal_length: meta.focal_length,
            lens: meta.lens.clone(),
            gps: meta.gps.map(|g| Gps {
                latitude: g.latitude,
                longitude: g.longitude,
            }),
        })
    }
}

/// The published catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            version: CATALOG_VERSION,
            generated_at: Utc::now(),
            entries,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Human-readable size: bytes below 1 KiB, then KB and MB with two decimals.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.2} KB", b / KB)
    } else {
        format!("{:.2} MB", b / (KB * KB))
    }
}
