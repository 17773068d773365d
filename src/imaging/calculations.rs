//! Pure calculation functions for image dimensions and sizes.
//!
//! All functions here are pure and testable without any I/O or images.

/// Long edge of the raster fed to the placeholder encoder.
pub const PLACEHOLDER_LONG_EDGE: u32 = 32;

/// Calculate the placeholder raster size for an image.
///
/// The long edge becomes `long_edge`; the short edge keeps the aspect ratio,
/// rounded, and never drops below one pixel. Zero-sized input yields a
/// `long_edge` square.
///
/// # Examples
/// ```
/// # use photo_catalog::imaging::calculations::placeholder_dimensions;
/// // 4000x3000 landscape → 32x24
/// assert_eq!(placeholder_dimensions(4000, 3000, 32), (32, 24));
///
/// // 1080x1920 portrait → 18x32
/// assert_eq!(placeholder_dimensions(1080, 1920, 32), (18, 32));
/// ```
pub fn placeholder_dimensions(width: u32, height: u32, long_edge: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (long_edge, long_edge);
    }
    if width >= height {
        let h = (long_edge as f64 * height as f64 / width as f64).round() as u32;
        (long_edge, h.max(1))
    } else {
        let w = (long_edge as f64 * width as f64 / height as f64).round() as u32;
        (w.max(1), long_edge)
    }
}

/// Calculate dimensions that fit within a `max_edge` square.
///
/// Aspect ratio is preserved. Images already inside the box are returned
/// unchanged (no upscaling).
pub fn fit_within(source: (u32, u32), max_edge: u32) -> (u32, u32) {
    let (w, h) = source;
    if w <= max_edge && h <= max_edge {
        return (w, h);
    }
    if w >= h {
        let nh = (max_edge as f64 * h as f64 / w as f64).round() as u32;
        (max_edge, nh.max(1))
    } else {
        let nw = (max_edge as f64 * w as f64 / h as f64).round() as u32;
        (nw.max(1), max_edge)
    }
}

/// Percentage of bytes saved, rounded to two decimals.
///
/// Negative when the output is larger than the input; `0.0` for an empty input.
pub fn compression_ratio(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let ratio = (original as f64 - compressed as f64) / original as f64 * 100.0;
    (ratio * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // placeholder_dimensions
    // =========================================================================

    #[test]
    fn placeholder_landscape() {
        assert_eq!(placeholder_dimensions(4000, 3000, 32), (32, 24));
        assert_eq!(placeholder_dimensions(1920, 1080, 32), (32, 18));
    }

    #[test]
    fn placeholder_portrait() {
        assert_eq!(placeholder_dimensions(3000, 4000, 32), (24, 32));
        assert_eq!(placeholder_dimensions(1080, 1920, 32), (18, 32));
    }

    #[test]
    fn placeholder_square() {
        assert_eq!(placeholder_dimensions(500, 500, 32), (32, 32));
    }

    #[test]
    fn placeholder_extreme_panorama_keeps_one_pixel() {
        assert_eq!(placeholder_dimensions(10000, 100, 32), (32, 1));
        assert_eq!(placeholder_dimensions(100, 10000, 32), (1, 32));
    }

    #[test]
    fn placeholder_upsamples_tiny_images() {
        assert_eq!(placeholder_dimensions(4, 2, 32), (32, 16));
    }

    #[test]
    fn placeholder_zero_dimensions() {
        assert_eq!(placeholder_dimensions(0, 10, 32), (32, 32));
    }

    // =========================================================================
    // fit_within
    // =========================================================================

    #[test]
    fn fit_within_scales_long_edge() {
        assert_eq!(fit_within((4000, 3000), 400), (400, 300));
        assert_eq!(fit_within((3000, 4000), 400), (300, 400));
    }

    #[test]
    fn fit_within_never_upscales() {
        assert_eq!(fit_within((200, 100), 400), (200, 100));
        assert_eq!(fit_within((400, 400), 400), (400, 400));
    }

    // =========================================================================
    // compression_ratio
    // =========================================================================

    #[test]
    fn ratio_rounded_to_two_decimals() {
        assert_eq!(compression_ratio(1_000_000, 123_456), 87.65);
        assert_eq!(compression_ratio(3, 1), 66.67);
    }

    #[test]
    fn ratio_negative_when_output_grows() {
        assert_eq!(compression_ratio(100, 150), -50.0);
    }

    #[test]
    fn ratio_zero_for_empty_input() {
        assert_eq!(compression_ratio(0, 10), 0.0);
    }
}
