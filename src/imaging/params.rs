//! Parameter types for codec operations.
//!
//! These structs describe *what* to encode, not *how*. They are the interface
//! between the high-level [`operations`](super::operations) module (which
//! decides which derivative to produce for a source file) and the
//! [`backend`](super::backend) (which does the actual pixel work). Keeping
//! them separate lets tests swap in a mock backend without touching the
//! selection logic.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`PngEffort`]: Lossless recompression effort (0–6, default 3). Clamped on construction.
//! - [`Codec`]: Output codec chosen from the source extension.
//! - [`EncodeParams`]: Everything one encode needs: codec plus its settings.

use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Effort level for lossless PNG recompression (0-6).
///
/// The pure-Rust PNG encoder exposes three deflate presets, so levels are
/// bucketed: 0–1 fast, 2–4 default, 5–6 best.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngEffort(pub u8);

impl PngEffort {
    pub fn new(level: u8) -> Self {
        Self(level.min(6))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn compression(self) -> image::codecs::png::CompressionType {
        use image::codecs::png::CompressionType;
        match self.0 {
            0..=1 => CompressionType::Fast,
            2..=4 => CompressionType::Default,
            _ => CompressionType::Best,
        }
    }
}

impl Default for PngEffort {
    fn default() -> Self {
        Self(3)
    }
}

/// Output codec for a derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Jpeg,
    Png,
    WebP,
}

impl Codec {
    /// Select the codec for a source extension (case-insensitive).
    ///
    /// Anything that is not JPEG, PNG or WebP is re-encoded as WebP.
    pub fn for_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Codec::Jpeg,
            "png" => Codec::Png,
            _ => Codec::WebP,
        }
    }

    /// File extension written for this codec.
    pub fn extension(self) -> &'static str {
        match self {
            Codec::Jpeg => "jpg",
            Codec::Png => "png",
            Codec::WebP => "webp",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Codec::Jpeg => "JPEG",
            Codec::Png => "PNG",
            Codec::WebP => "WebP",
        };
        f.write_str(name)
    }
}

/// Parameters for a single encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    pub codec: Codec,
    /// Used by the lossy codecs; ignored for PNG.
    pub quality: Quality,
    /// Used by PNG only.
    pub effort: PngEffort,
}
