//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{PLACEHOLDER_LONG_EDGE, fit_within, placeholder_dimensions};
use super::params::{Codec, EncodeParams, PngEffort, Quality};
use crate::placeholder::{self, COMPONENTS};
use image::DynamicImage;
use image::imageops::FilterType;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Encoder settings for the compression pipeline, one per codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub jpeg_quality: Quality,
    pub webp_quality: Quality,
    pub png_effort: PngEffort,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            jpeg_quality: Quality::new(80),
            webp_quality: Quality::new(80),
            png_effort: PngEffort::new(3),
        }
    }
}

/// Plan the encode for a source file without executing it.
///
/// The codec follows the source extension; unknown or missing extensions
/// fall back to WebP.
pub fn plan_encode(source: &Path, settings: &EncoderSettings) -> EncodeParams {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let codec = Codec::for_extension(ext);
    let quality = match codec {
        Codec::Jpeg => settings.jpeg_quality,
        Codec::WebP => settings.webp_quality,
        Codec::Png => Quality::default(),
    };
    EncodeParams {
        codec,
        quality,
        effort: settings.png_effort,
    }
}

/// Downsample to the RGBA raster the placeholder is computed from.
pub fn placeholder_raster(image: &DynamicImage) -> image::RgbaImage {
    let (w, h) = placeholder_dimensions(image.width(), image.height(), PLACEHOLDER_LONG_EDGE);
    image::imageops::resize(&image.to_rgba8(), w, h, FilterType::Triangle)
}

/// Compute the placeholder hash of a decoded image.
pub fn perceptual_hash(image: &DynamicImage) -> Result<String> {
    let raster = placeholder_raster(image);
    let (cx, cy) = COMPONENTS;
    placeholder::encode(raster.as_raw(), raster.width(), raster.height(), cx, cy)
        .map_err(|e| BackendError::ProcessingFailed(e.to_string()))
}

/// Shrink an image to fit within a `max_edge` square. Never upscales.
pub fn thumbnail(image: &DynamicImage, max_edge: u32) -> DynamicImage {
    let (w, h) = fit_within((image.width(), image.height()), max_edge);
    if (w, h) == (image.width(), image.height()) {
        return image.clone();
    }
    image.resize_exact(w, h, FilterType::Lanczos3)
}

/// Encode an image and its thumbnail with the same codec settings.
pub fn encode_with_thumbnail(
    backend: &impl ImageBackend,
    image: &DynamicImage,
    params: &EncodeParams,
    thumbnail_size: u32,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let full = backend.encode(image, params)?;
    let thumb = backend.encode(&thumbnail(image, thumbnail_size), params)?;
    Ok((full, thumb))
}
