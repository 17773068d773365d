//! Markdown comparison report for a compression run.
//!
//! Sections, in order: overall totals, a per-photo table ranked by ratio,
//! a histogram of ratios, the top performers, failures (when any), and the
//! encoder settings the run used.

use crate::catalog::format_size;
use crate::compress::{CompressionResult, CompressionRun};
use crate::imaging::EncoderSettings;
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::Path;

/// Histogram buckets as (label, lower bound inclusive, upper bound exclusive).
const BUCKETS: [(&str, f64, f64); 4] = [
    ("Very high (95%+)", 95.0, f64::INFINITY),
    ("High (90-95%)", 90.0, 95.0),
    ("Medium (80-90%)", 80.0, 90.0),
    ("Low (below 80%)", f64::NEG_INFINITY, 80.0),
];

/// Everything the report renders besides the run itself.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub settings: &'a EncoderSettings,
    pub thumbnail_size: u32,
    pub top_n: usize,
    pub generated_at: DateTime<Local>,
}

/// Render the report as Markdown.
pub fn render_report(run: &CompressionRun, ctx: &ReportContext<'_>) -> String {
    let ranked = ranked(&run.results);

    let mut lines = vec![
        "# Image Compression Report".to_string(),
        String::new(),
        format!("> Generated: {}", ctx.generated_at.format("%Y-%m-%d %H:%M:%S")),
        String::new(),
    ];
    lines.extend(summary_section(run));
    lines.extend(details_section(&ranked));
    lines.extend(analysis_section(&run.results, &ranked, ctx.top_n));
    lines.extend(failures_section(run));
    lines.extend(settings_section(ctx));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn summary_section(run: &CompressionRun) -> Vec<String> {
    let original = run.total_original();
    let compressed = run.total_compressed();
    vec![
        "## Summary".to_string(),
        String::new(),
        "| Metric | Value |".to_string(),
        "|--------|-------|".to_string(),
        format!("| Photos compressed | {} |", run.results.len()),
        format!("| Photos failed | {} |", run.failures.len()),
        format!("| Original total | {} |", format_size(original)),
        format!("| Compressed total | {} |", format_size(compressed)),
        format!("| Saved | {} |", signed_size(original, compressed)),
        format!("| Overall ratio | {:.2}% |", run.overall_ratio()),
        format!("| Cache | {} |", run.cache),
        String::new(),
    ]
}

fn details_section(ranked: &[&CompressionResult]) -> Vec<String> {
    let mut lines = vec!["## Details".to_string(), String::new()];
    if ranked.is_empty() {
        lines.push("No photos were compressed.".to_string());
    } else {
        lines.push("| File | Original | Compressed | Saved | Ratio |".to_string());
        lines.push("|------|----------|------------|-------|-------|".to_string());
        lines.extend(ranked.iter().map(|r| {
            format!(
                "| {} | {} | {} | {} | {:.2}% |",
                r.filename,
                format_size(r.original_size),
                format_size(r.compressed_size),
                signed_size(r.original_size, r.compressed_size),
                r.compression_ratio
            )
        }));
    }
    lines.push(String::new());
    lines
}

fn analysis_section(
    results: &[CompressionResult],
    ranked: &[&CompressionResult],
    top_n: usize,
) -> Vec<String> {
    let mut lines = vec![
        "## Analysis".to_string(),
        String::new(),
        "### By ratio".to_string(),
        String::new(),
    ];
    lines.extend(
        histogram(results)
            .into_iter()
            .map(|(label, count)| format!("- **{label}**: {count}")),
    );
    lines.push(String::new());

    lines.push(format!("### Top {top_n}"));
    lines.push(String::new());
    lines.extend(ranked.iter().take(top_n).enumerate().map(|(i, r)| {
        format!(
            "{}. **{}** - {:.2}% ({} → {})",
            i + 1,
            r.filename,
            r.compression_ratio,
            format_size(r.original_size),
            format_size(r.compressed_size)
        )
    }));
    lines.push(String::new());
    lines
}

/// Empty when every photo compressed.
fn failures_section(run: &CompressionRun) -> Vec<String> {
    if run.failures.is_empty() {
        return Vec::new();
    }
    let mut lines = vec!["## Failures".to_string(), String::new()];
    lines.extend(
        run.failures
            .iter()
            .map(|f| format!("- `{}`: {}", f.filename, f.reason)),
    );
    lines.push(String::new());
    lines
}

fn settings_section(ctx: &ReportContext<'_>) -> Vec<String> {
    let s = ctx.settings;
    vec![
        "## Settings".to_string(),
        String::new(),
        format!("- **JPEG**: quality {}", s.jpeg_quality.value()),
        format!("- **WebP**: quality {} (lossless encoder)", s.webp_quality.value()),
        format!("- **PNG**: effort level {}", s.png_effort.value()),
        format!("- **Thumbnails**: fit within {}px", ctx.thumbnail_size),
    ]
}

/// Render and write the report, creating parent directories.
pub fn write_report(path: &Path, run: &CompressionRun, ctx: &ReportContext<'_>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_report(run, ctx))
}

/// Results by ratio, best first. Ties keep filename order.
fn ranked(results: &[CompressionResult]) -> Vec<&CompressionResult> {
    let mut ranked: Vec<_> = results.iter().collect();
    ranked.sort_by(|a, b| b.compression_ratio.total_cmp(&a.compression_ratio));
    ranked
}

fn histogram(results: &[CompressionResult]) -> Vec<(&'static str, usize)> {
    BUCKETS
        .iter()
        .map(|&(label, min, max)| {
            let count = results
                .iter()
                .filter(|r| r.compression_ratio >= min && r.compression_ratio < max)
                .count();
            (label, count)
        })
        .collect()
}

/// Bytes saved, prefixed with `-` when the output grew.
fn signed_size(original: u64, compressed: u64) -> String {
    if compressed > original {
        format!("-{}", format_size(compressed - original))
    } else {
        format_size(original - compressed)
    }
}
