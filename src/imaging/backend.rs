//! Codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three capabilities the pipelines
//! need from a codec library: decode, read capture metadata, and encode.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): the `image` crate for
//! pixels and `kamadak-exif` for metadata.

use super::params::EncodeParams;
use chrono::{DateTime, Utc};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Metadata extraction warning: {0}")]
    Metadata(String),
    #[error("Codec pool unavailable: {0}")]
    Pool(String),
}

/// GPS position in signed decimal degrees (south and west are negative).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// Capture metadata extracted from EXIF.
///
/// Every field is optional; an image without EXIF yields the default value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureMetadata {
    pub make: Option<String>,
    pub model: Option<String>,
    /// Exposure time in seconds.
    pub exposure_time: Option<f64>,
    pub f_number: Option<f64>,
    pub iso: Option<u32>,
    /// Focal length in millimetres.
    pub focal_length: Option<f64>,
    pub lens: Option<String>,
    /// `DateTimeOriginal`, falling back to `DateTime`.
    pub captured_at: Option<DateTime<Utc>>,
    pub gps: Option<GpsPosition>,
}

impl CaptureMetadata {
    /// True when no camera attribute was found (capture time aside).
    pub fn is_empty(&self) -> bool {
        self.make.is_none()
            && self.model.is_none()
            && self.exposure_time.is_none()
            && self.f_number.is_none()
            && self.iso.is_none()
            && self.focal_length.is_none()
            && self.lens.is_none()
            && self.gps.is_none()
    }
}

/// Trait for codec backends.
///
/// `Sync` so a single backend can be shared across the codec pool workers.
pub trait ImageBackend: Sync {
    /// Decode an image, applying any embedded orientation.
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError>;

    /// Read capture metadata. Missing EXIF is `Ok(CaptureMetadata::default())`;
    /// malformed EXIF is `Err(BackendError::Metadata)`.
    fn read_metadata(&self, path: &Path) -> Result<CaptureMetadata, BackendError>;

    /// Encode an image with the given codec settings.
    fn encode(&self, image: &DynamicImage, params: &EncodeParams)
    -> Result<Vec<u8>, BackendError>;
}
