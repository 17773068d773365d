//! Image processing, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` + orientation |
//! | **Capture metadata** | `kamadak-exif` |
//! | **Placeholder raster** | `imageops::resize` (Triangle) to 32px long edge |
//! | **Thumbnail** | `resize_exact` (Lanczos3), no upscaling |
//! | **Encode** | JPEG / PNG / WebP encoders from `image` |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and ratio math (unit testable)
//! - **Parameters**: Data structures describing encodes
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend
//! - **Pool**: the scoped [`CodecPool`] both pipelines run on

pub mod backend;
pub mod calculations;
pub mod capture;
pub mod operations;
mod params;
pub mod pool;
pub mod rust_backend;

pub use backend::{BackendError, CaptureMetadata, GpsPosition, ImageBackend};
pub use operations::{EncoderSettings, perceptual_hash, plan_encode};
pub use params::{Codec, EncodeParams, PngEffort, Quality};
pub use pool::{CodecPool, PoolMonitor};
pub use rust_backend::{RustBackend, is_supported_image, supported_input_extensions};
