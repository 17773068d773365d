//! Pure Rust codec backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP, BMP) | `image` crate decoders |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Encode JPEG | `image::codecs::jpeg::JpegEncoder` (baseline, quality 1–100) |
//! | Encode PNG | `image::codecs::png::PngEncoder` (adaptive filter, deflate preset) |
//! | Encode WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Capture metadata | `kamadak-exif` via [`capture`](super::capture) |

use super::backend::{BackendError, CaptureMetadata, ImageBackend};
use super::capture::read_capture_metadata;
use super::params::{Codec, EncodeParams};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageFormat, ImageReader};
use std::path::Path;
use std::sync::LazyLock;

/// Photo extensions and the decoder each one needs.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("webp", ImageFormat::WebP),
    ("bmp", ImageFormat::Bmp),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// True when `path` has one of the [`supported_input_extensions`] (case-insensitive).
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_error(path: &Path, err: impl std::fmt::Display) -> BackendError {
    BackendError::Decode {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

fn encode_error(codec: Codec, err: impl std::fmt::Display) -> BackendError {
    BackendError::ProcessingFailed(format!("{codec} encode failed: {err}"))
}

impl ImageBackend for RustBackend {
    fn decode(&self, path: &Path) -> Result<DynamicImage, BackendError> {
        let reader = ImageReader::open(path)?
            .with_guessed_format()
            .map_err(BackendError::Io)?;
        let mut decoder = reader.into_decoder().map_err(|e| decode_error(path, e))?;
        let orientation = decoder
            .orientation()
            .unwrap_or(image::metadata::Orientation::NoTransforms);
        let mut img = DynamicImage::from_decoder(decoder).map_err(|e| decode_error(path, e))?;
        img.apply_orientation(orientation);
        Ok(img)
    }

    fn read_metadata(&self, path: &Path) -> Result<CaptureMetadata, BackendError> {
        read_capture_metadata(path)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        params: &EncodeParams,
    ) -> Result<Vec<u8>, BackendError> {
        let mut buf = Vec::new();
        let (w, h) = (image.width(), image.height());
        match params.codec {
            Codec::Jpeg => {
                let rgb = image.to_rgb8();
                let quality = params.quality.value().clamp(1, 100) as u8;
                JpegEncoder::new_with_quality(&mut buf, quality)
                    .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                    .map_err(|e| encode_error(params.codec, e))?;
            }
            Codec::Png => {
                let encoder =
                    PngEncoder::new_with_quality(&mut buf, params.effort.compression(), FilterType::Adaptive);
                if image.color().has_alpha() {
                    let rgba = image.to_rgba8();
                    encoder.write_image(rgba.as_raw(), w, h, ExtendedColorType::Rgba8)
                } else {
                    let rgb = image.to_rgb8();
                    encoder.write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                }
                .map_err(|e| encode_error(params.codec, e))?;
            }
            Codec::WebP => {
                let encoder = WebPEncoder::new_lossless(&mut buf);
                if image.color().has_alpha() {
                    let rgba = image.to_rgba8();
                    encoder.write_image(rgba.as_raw(), w, h, ExtendedColorType::Rgba8)
                } else {
                    let rgb = image.to_rgb8();
                    encoder.write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                }
                .map_err(|e| encode_error(params.codec, e))?;
            }
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::{PngEffort, Quality};
    use image::RgbImage;

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "gif", "webp", "bmp"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    #[test]
    fn is_supported_image_ignores_case_and_rejects_others() {
        assert!(is_supported_image(Path::new("a.JPG")));
        assert!(is_supported_image(Path::new("dir/b.webp")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("README")));
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        })
    }

    /// Create a small valid JPEG file with the given dimensions.
    fn create_test_jpeg(path: &Path, width: u32, height: u32) {
        let img = gradient(width, height);
        let file = std::fs::File::create(path).unwrap();
        let writer = std::io::BufWriter::new(file);
        JpegEncoder::new(writer)
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
    }

    /// JPEG bytes carrying an APP1 Exif segment whose only tag is
    /// `Orientation = orientation`.
    fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
        let mut plain = Vec::new();
        JpegEncoder::new(&mut plain)
            .write_image(gradient(width, height).as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();

        // Big-endian TIFF: header, one IFD with a single SHORT entry, no next IFD.
        let mut tiff = b"MM\x00\x2a\x00\x00\x00\x08".to_vec();
        tiff.extend_from_slice(&1u16.to_be_bytes());
        tiff.extend_from_slice(&0x0112u16.to_be_bytes());
        tiff.extend_from_slice(&3u16.to_be_bytes());
        tiff.extend_from_slice(&1u32.to_be_bytes());
        tiff.extend_from_slice(&orientation.to_be_bytes());
        tiff.extend_from_slice(&[0, 0]);
        tiff.extend_from_slice(&0u32.to_be_bytes());

        let mut payload = b"Exif\x00\x00".to_vec();
        payload.extend_from_slice(&tiff);
        let segment_len = (payload.len() + 2) as u16;

        let mut out = plain[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&segment_len.to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&plain[2..]);
        out
    }

    fn params(codec: Codec) -> EncodeParams {
        EncodeParams {
            codec,
            quality: Quality::new(80),
            effort: PngEffort::default(),
        }
    }

    #[test]
    fn decode_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let img = RustBackend::new().decode(&path).unwrap();
        assert_eq!((img.width(), img.height()), (200, 150));
    }

    #[test]
    fn decode_applies_exif_orientation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let rotated = tmp.path().join("rotated.jpg");
        let upright = tmp.path().join("upright.jpg");
        std::fs::write(&rotated, jpeg_with_orientation(40, 20, 6)).unwrap();
        std::fs::write(&upright, jpeg_with_orientation(40, 20, 1)).unwrap();

        let backend = RustBackend::new();
        let img = backend.decode(&rotated).unwrap();
        assert_eq!((img.width(), img.height()), (20, 40));
        let img = backend.decode(&upright).unwrap();
        assert_eq!((img.width(), img.height()), (40, 20));
    }

    #[test]
    fn decode_garbage_is_decode_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        let result = RustBackend::new().decode(&path);
        assert!(matches!(result, Err(BackendError::Decode { .. })));
    }

    #[test]
    fn decode_nonexistent_file_is_io_error() {
        let result = RustBackend::new().decode(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(BackendError::Io(_))));
    }

    #[test]
    fn read_metadata_synthetic_returns_default() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 100, 100);

        let meta = RustBackend::new().read_metadata(&path).unwrap();
        assert_eq!(meta, CaptureMetadata::default());
    }

    #[test]
    fn encode_each_codec_produces_decodable_bytes() {
        let backend = RustBackend::new();
        let img = DynamicImage::ImageRgb8(gradient(64, 48));

        for (codec, format) in [
            (Codec::Jpeg, ImageFormat::Jpeg),
            (Codec::Png, ImageFormat::Png),
            (Codec::WebP, ImageFormat::WebP),
        ] {
            let bytes = backend.encode(&img, &params(codec)).unwrap();
            assert!(!bytes.is_empty(), "{codec} produced no bytes");
            let decoded = image::load_from_memory_with_format(&bytes, format).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (64, 48));
        }
    }

    #[test]
    fn encode_png_keeps_alpha() {
        let backend = RustBackend::new();
        let img = crate::imaging::backend::tests::solid(8, 8, [10, 20, 30]);

        let bytes = backend.encode(&img, &params(Codec::Png)).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn lower_jpeg_quality_yields_fewer_bytes() {
        let backend = RustBackend::new();
        let img = DynamicImage::ImageRgb8(gradient(256, 256));

        let high = backend
            .encode(
                &img,
                &EncodeParams {
                    quality: Quality::new(100),
                    ..params(Codec::Jpeg)
                },
            )
            .unwrap();
        let low = backend
            .encode(
                &img,
                &EncodeParams {
                    quality: Quality::new(30),
                    ..params(Codec::Jpeg)
                },
            )
            .unwrap();
        assert!(low.len() < high.len());
    }
}
