//! Centralized derivative naming.
//!
//! The compression pipeline writes derivatives and the catalog builder links
//! to them, so both sides must agree on the names. Everything goes through
//! this module:
//!
//! - `sunset.jpg` → `sunset.jpg_compressed.jpg`, `sunset.jpg_thumb.jpg`
//! - `diagram.PNG` → `diagram.PNG_compressed.png`, `diagram.PNG_thumb.png`
//! - `anim.gif` → `anim.gif_compressed.webp`, `anim.gif_thumb.webp` (WebP fallback)
//!
//! Names start with the whole source filename, extension included, so two
//! photos that share a stem (`a.gif`, `a.webp`) never share a derivative.
//! The output extension comes from the codec chosen for the source.

use crate::imaging::Codec;

/// Split `filename` into stem and extension.
///
/// Only the last dot counts, and a leading dot is part of the stem:
/// - `"a.b.jpg"` → `("a.b", "jpg")`
/// - `".hidden"` → `(".hidden", "")`
/// - `"noext"` → `("noext", "")`
pub fn split_filename(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(0) | None => (filename, ""),
        Some(pos) => (&filename[..pos], &filename[pos + 1..]),
    }
}

/// Catalog id for a photo: its filename without the extension.
pub fn photo_id(filename: &str) -> &str {
    split_filename(filename).0
}

/// Codec a source file is re-encoded with.
pub fn derivative_codec(filename: &str) -> Codec {
    Codec::for_extension(split_filename(filename).1)
}

/// `<filename>_compressed.<codec ext>`
pub fn compressed_filename(filename: &str) -> String {
    derivative_name(filename, "compressed")
}

/// `<filename>_thumb.<codec ext>`
pub fn thumbnail_filename(filename: &str) -> String {
    derivative_name(filename, "thumb")
}

fn derivative_name(filename: &str, suffix: &str) -> String {
    format!("{filename}_{suffix}.{}", derivative_codec(filename).extension())
}

/// Join a URL prefix and a filename with exactly one slash between them.
pub fn public_url(prefix: &str, filename: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), filename)
}
