//! CLI output formatting for every subcommand.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Each photo leads with
//! its positional index and id, with sizes and dimensions alongside; the
//! source filename follows as an indented `Source:` line. The output reads as
//! an inventory of the catalog while still tracing back to files.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Catalog
//! 001 IMG_0042 (4032x3024, 2.31 MB)
//!     Source: IMG_0042.jpg
//!     Captured: 2024-05-01 12:00:00
//! 002 diagram (800x600, 120.00 KB)
//!     Source: diagram.png
//!
//! Dropped
//!     broken.jpg: failed to decode broken.jpg: ...
//!
//! Cataloged 2 of 3 photos → photos/catalog.json
//! ```
//!
//! ## Compress
//!
//! ```text
//! Compressing 3 photos
//!     IMG_0042.jpg: 2.31 MB → 612.40 KB (74.11%)
//!     diagram.png: cached
//!     broken.jpg: failed (failed to decode broken.jpg: ...)
//! Compressed 2 photos, 1 failed, saved 1.72 MB (74.11%)
//!     Cache: 1 cached, 1 encoded (2 total)
//!     Report: photos/compressed/compression-report.md
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::catalog::{BuildSummary, Catalog, CatalogEntry, format_size};
use crate::compress::{CompressEvent, CompressionRun};
use std::net::SocketAddr;
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Entry header: index, id, and what is known about the image.
///
/// ```text
/// 001 IMG_0042 (4032x3024, 2.31 MB)
/// 002 scan (unknown size, 96 B)
/// ```
fn entry_header(index: usize, entry: &CatalogEntry) -> String {
    let dims = if entry.width > 0 && entry.height > 0 {
        format!("{}x{}", entry.width, entry.height)
    } else {
        "unknown size".to_string()
    };
    format!(
        "{} {} ({}, {})",
        format_index(index),
        entry.id,
        dims,
        entry.size_formatted
    )
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Build output
// ============================================================================

/// Format the result of a catalog build.
pub fn format_build_output(
    catalog: &Catalog,
    summary: &BuildSummary,
    catalog_path: &Path,
) -> Vec<String> {
    let mut lines = vec!["Catalog".to_string()];
    for (i, entry) in catalog.entries.iter().enumerate() {
        lines.push(entry_header(i + 1, entry));
        lines.push(format!("{}Source: {}", indent(1), entry.filename));
        if let Some(captured) = entry.capture_time {
            lines.push(format!(
                "{}Captured: {}",
                indent(1),
                captured.format("%Y-%m-%d %H:%M:%S")
            ));
        }
        if let Some(model) = entry.exif.as_ref().and_then(|e| e.model.as_deref()) {
            lines.push(format!("{}Camera: {}", indent(1), model));
        }
        if let Some(thumb) = &entry.thumbnail_path {
            lines.push(format!("{}Thumbnail: {}", indent(1), thumb));
        }
    }

    if !summary.dropped.is_empty() {
        lines.push(String::new());
        lines.push("Dropped".to_string());
        for failure in &summary.dropped {
            lines.push(format!(
                "{}{}: {}",
                indent(1),
                failure.filename,
                truncate(&failure.error.to_string(), 100)
            ));
        }
    }

    lines.push(String::new());
    let mut footer = format!(
        "Cataloged {} of {} photos \u{2192} {}",
        summary.cataloged,
        summary.scanned,
        catalog_path.display()
    );
    if summary.metadata_warnings > 0 {
        footer.push_str(&format!(
            " ({} without readable metadata)",
            summary.metadata_warnings
        ));
    }
    lines.push(footer);
    lines
}

/// Print build output to stdout.
pub fn print_build_output(catalog: &Catalog, summary: &BuildSummary, catalog_path: &Path) {
    print_lines(format_build_output(catalog, summary, catalog_path));
}

// ============================================================================
// Compress output
// ============================================================================

/// Format a single compression progress event as display lines.
pub fn format_compress_event(event: &CompressEvent) -> Vec<String> {
    match event {
        CompressEvent::Started { total } => vec![format!("Compressing {} photos", total)],
        CompressEvent::Compressed {
            filename,
            original_size,
            compressed_size,
            ratio,
        } => vec![format!(
            "{}{}: {} \u{2192} {} ({:.2}%)",
            indent(1),
            filename,
            format_size(*original_size),
            format_size(*compressed_size),
            ratio
        )],
        CompressEvent::Cached { filename } => vec![format!("{}{}: cached", indent(1), filename)],
        CompressEvent::Failed { filename, reason } => vec![format!(
            "{}{}: failed ({})",
            indent(1),
            filename,
            truncate(reason, 100)
        )],
    }
}

/// Format the closing summary of a compression run.
pub fn format_compress_summary(run: &CompressionRun, report_path: Option<&Path>) -> Vec<String> {
    let original = run.total_original();
    let compressed = run.total_compressed();
    let saved = original.saturating_sub(compressed);

    let mut headline = format!("Compressed {} photos", run.results.len());
    if !run.failures.is_empty() {
        headline.push_str(&format!(", {} failed", run.failures.len()));
    }
    headline.push_str(&format!(
        ", saved {} ({:.2}%)",
        format_size(saved),
        run.overall_ratio()
    ));

    let mut lines = vec![headline, format!("{}Cache: {}", indent(1), run.cache)];
    if let Some(path) = report_path {
        lines.push(format!("{}Report: {}", indent(1), path.display()));
    }
    lines
}

/// Print the compression summary to stdout.
pub fn print_compress_summary(run: &CompressionRun, report_path: Option<&Path>) {
    print_lines(format_compress_summary(run, report_path));
}

// ============================================================================
// Serve output
// ============================================================================

/// Format the startup banner of the read API.
pub fn format_serve_banner(addr: SocketAddr, catalog_path: &Path, entries: usize) -> Vec<String> {
    vec![
        format!("Serving {} photos from {}", entries, catalog_path.display()),
        format!("{}http://{}/api/photos", indent(1), addr),
    ]
}

/// Print the startup banner to stdout.
pub fn print_serve_banner(addr: SocketAddr, catalog_path: &Path, entries: usize) {
    print_lines(format_serve_banner(addr, catalog_path, entries));
}

// ============================================================================
// Tests
// ============================================================================
