//! Catalog builder.
//!
//! Scans one directory (non-recursive) for photos, extracts each photo's
//! dimensions, capture metadata and placeholder hash on the codec pool, and
//! assembles the result into a [`Catalog`] sorted newest first.
//!
//! ## Failure semantics
//!
//! | Failure | Effect |
//! |---|---|
//! | Source directory missing or unreadable | [`IngestError::SourceDir`], run aborts |
//! | A photo cannot be decoded | `warn!`, photo dropped, listed in [`BuildSummary::dropped`] |
//! | A photo's EXIF cannot be parsed | `warn!`, photo kept without `exif`/`captureTime` |
//! | Nothing survives | valid empty catalog, `warn!` |
//!
//! ## Ordering
//!
//! Candidates are enumerated in byte-wise filename order, processed in
//! parallel, and collected back into that order. The final sort is by
//! capture time (else modification time), descending and stable, so equal
//! timestamps keep filename order regardless of how the filesystem lists
//! the directory.

use super::store::CatalogStore;
use super::{Catalog, CatalogEntry, ExifData, IngestError, ItemFailure, format_size};
use crate::config::{AppConfig, effective_threads};
use crate::imaging::{BackendError, CodecPool, ImageBackend, PoolMonitor, perceptual_hash};
use crate::naming;
use crate::scan::list_photos;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How entry URLs are formed and how much parallelism to use.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub public_prefix: String,
    pub derivatives_prefix: String,
    /// Point `path` at the compressed derivative when it exists.
    pub link_derivatives: bool,
    /// Where derivatives live; thumbnails found here are linked.
    pub derivatives_dir: Option<PathBuf>,
    pub threads: usize,
}

impl BuildOptions {
    pub fn from_config(config: &AppConfig, source: &Path) -> Self {
        Self {
            public_prefix: config.catalog.public_prefix.clone(),
            derivatives_prefix: config.catalog.derivatives_prefix.clone(),
            link_derivatives: config.catalog.link_derivatives,
            derivatives_dir: Some(config.output_dir(source)),
            threads: effective_threads(&config.processing),
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        let config = AppConfig::default();
        Self {
            public_prefix: config.catalog.public_prefix,
            derivatives_prefix: config.catalog.derivatives_prefix,
            link_derivatives: false,
            derivatives_dir: None,
            threads: effective_threads(&config.processing),
        }
    }
}

/// What a build did.
#[derive(Debug, Default)]
pub struct BuildSummary {
    /// Candidate photo files found.
    pub scanned: usize,
    /// Entries in the resulting catalog.
    pub cataloged: usize,
    /// Photos that could not be decoded.
    pub dropped: Vec<ItemFailure>,
    /// Photos kept despite unreadable EXIF.
    pub metadata_warnings: usize,
}

/// Per-photo outcome from a worker.
enum ItemOutcome {
    Cataloged {
        entry: Box<CatalogEntry>,
        metadata_error: Option<BackendError>,
    },
    Dropped(ItemFailure),
}

/// Build a catalog from `source` using the given codec backend.
pub fn build(
    source: &Path,
    backend: &impl ImageBackend,
    options: &BuildOptions,
    monitor: &PoolMonitor,
) -> Result<(Catalog, BuildSummary), IngestError> {
    let candidates = list_photos(source).map_err(|e| IngestError::SourceDir {
        path: e.path,
        source: e.source,
    })?;
    info!(source = %source.display(), candidates = candidates.len(), "building catalog");

    let outcomes: Vec<ItemOutcome> = {
        let pool = CodecPool::acquire("catalog", options.threads, monitor)?;
        pool.install(|| {
            candidates
                .par_iter()
                .map(|path| catalog_item(path, backend, options))
                .collect()
        })
    };

    let mut summary = BuildSummary {
        scanned: candidates.len(),
        ..Default::default()
    };
    let mut entries = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            ItemOutcome::Cataloged {
                entry,
                metadata_error,
            } => {
                if let Some(error) = metadata_error {
                    warn!(file = %entry.filename, %error, "metadata extraction failed; entry kept");
                    summary.metadata_warnings += 1;
                }
                entries.push(*entry);
            }
            ItemOutcome::Dropped(failure) => {
                warn!(file = %failure.filename, error = %failure.error, "photo dropped");
                summary.dropped.push(failure);
            }
        }
    }

    assign_unique_ids(&mut entries);
    entries.sort_by(|a, b| b.sort_time().cmp(&a.sort_time()));
    summary.cataloged = entries.len();

    if entries.is_empty() {
        warn!(
            scanned = summary.scanned,
            dropped = summary.dropped.len(),
            "catalog is empty"
        );
    } else {
        info!(
            cataloged = summary.cataloged,
            dropped = summary.dropped.len(),
            "catalog built"
        );
    }

    Ok((Catalog::new(entries), summary))
}

/// Build a catalog and publish it into `store` in one atomic replace.
pub fn build_and_publish(
    source: &Path,
    backend: &impl ImageBackend,
    options: &BuildOptions,
    monitor: &PoolMonitor,
    store: &CatalogStore,
) -> Result<(Arc<Catalog>, BuildSummary), IngestError> {
    let (catalog, summary) = build(source, backend, options, monitor)?;
    let published = store.replace(catalog)?;
    Ok((published, summary))
}

fn catalog_item(path: &Path, backend: &impl ImageBackend, options: &BuildOptions) -> ItemOutcome {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match extract_entry(path, &filename, backend, options) {
        Ok((entry, metadata_error)) => ItemOutcome::Cataloged {
            entry: Box::new(entry),
            metadata_error,
        },
        Err(error) => ItemOutcome::Dropped(ItemFailure { filename, error }),
    }
}

fn extract_entry(
    path: &Path,
    filename: &str,
    backend: &impl ImageBackend,
    options: &BuildOptions,
) -> Result<(CatalogEntry, Option<BackendError>), BackendError> {
    let stat = fs::metadata(path)?;
    let modified_at: DateTime<Utc> = stat.modified()?.into();
    let created_at: DateTime<Utc> = stat.created().map(Into::into).unwrap_or(modified_at);

    let image = backend.decode(path)?;
    let hash = perceptual_hash(&image)?;

    let (metadata, metadata_error) = match backend.read_metadata(path) {
        Ok(meta) => (meta, None),
        Err(e) => (Default::default(), Some(e)),
    };

    let original_path = naming::public_url(&options.public_prefix, filename);
    let compressed = naming::compressed_filename(filename);
    let thumb = naming::thumbnail_filename(filename);
    let derivative_exists = |name: &str| {
        options
            .derivatives_dir
            .as_ref()
            .is_some_and(|dir| dir.join(name).is_file())
    };

    let entry_path = if options.link_derivatives && derivative_exists(&compressed) {
        naming::public_url(&options.derivatives_prefix, &compressed)
    } else {
        if options.link_derivatives {
            debug!(file = filename, "no compressed derivative; linking original");
        }
        original_path.clone()
    };
    let thumbnail_path = derivative_exists(&thumb)
        .then(|| naming::public_url(&options.derivatives_prefix, &thumb));

    debug!(
        file = filename,
        width = image.width(),
        height = image.height(),
        "cataloged"
    );

    let entry = CatalogEntry {
        id: naming::photo_id(filename).to_string(),
        filename: filename.to_string(),
        path: entry_path,
        thumbnail_path,
        original_path,
        size: stat.len(),
        size_formatted: format_size(stat.len()),
        width: image.width(),
        height: image.height(),
        perceptual_hash: hash,
        created_at,
        modified_at,
        capture_time: metadata.captured_at,
        exif: ExifData::from_capture(&metadata),
    };
    Ok((entry, metadata_error))
}

/// Photos sharing a stem (`a.jpg`, `a.png`) would share an id. The first in
/// filename order keeps the stem; later ones fall back to their filename.
fn assign_unique_ids(entries: &mut [CatalogEntry]) {
    let mut seen = HashSet::new();
    for entry in entries.iter_mut() {
        if !seen.insert(entry.id.clone()) {
            warn!(file = %entry.filename, id = %entry.id, "duplicate id; using filename");
            entry.id = entry.filename.clone();
            seen.insert(entry.id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::CaptureMetadata;
    use crate::imaging::backend::tests::{MockBackend, solid};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"stub").unwrap();
    }

    fn options() -> BuildOptions {
        BuildOptions {
            threads: 2,
            ..Default::default()
        }
    }

    // =========================================================================
    // build
    // =========================================================================

    #[test]
    fn build_missing_directory_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let result = build(
            &tmp.path().join("missing"),
            &MockBackend::new(),
            &options(),
            &PoolMonitor::new(),
        );
        assert!(matches!(result, Err(IngestError::SourceDir { .. })));
    }

    #[test]
    fn build_drops_undecodable_and_keeps_the_rest() {
        let tmp = TempDir::new().unwrap();
        let mut backend = MockBackend::new();
        for i in 0..10 {
            let name = format!("p{i}.jpg");
            touch(tmp.path(), &name);
            if i != 4 {
                backend = backend.with_image(&name, solid(40, 30, [i * 20, 0, 0]));
            }
        }

        let monitor = PoolMonitor::new();
        let (catalog, summary) = build(tmp.path(), &backend, &options(), &monitor).unwrap();

        assert_eq!(catalog.len(), 9);
        assert_eq!(summary.scanned, 10);
        assert_eq!(summary.cataloged, 9);
        assert_eq!(summary.dropped.len(), 1);
        assert_eq!(summary.dropped[0].filename, "p4.jpg");
        assert!(catalog.entries.iter().all(|e| e.id != "p4"));
        assert_eq!(monitor.outstanding(), 0);
    }

    #[test]
    fn build_fills_entry_fields() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "sunset.jpg");
        let backend = MockBackend::new().with_image("sunset.jpg", solid(400, 300, [255, 0, 0]));

        let (catalog, _) = build(tmp.path(), &backend, &options(), &PoolMonitor::new()).unwrap();
        let entry = &catalog.entries[0];
        assert_eq!(entry.id, "sunset");
        assert_eq!(entry.filename, "sunset.jpg");
        assert_eq!(entry.path, "/api/photos/sunset.jpg");
        assert_eq!(entry.original_path, entry.path);
        assert_eq!(entry.size, 4);
        assert_eq!(entry.size_formatted, "4 B");
        assert_eq!((entry.width, entry.height), (400, 300));
        assert_eq!(entry.perceptual_hash.len(), 36);
        assert!(entry.exif.is_none());
        assert!(entry.capture_time.is_none());
    }

    #[test]
    fn build_orders_by_capture_time_then_modified() {
        let tmp = TempDir::new().unwrap();
        let mut backend = MockBackend::new();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            touch(tmp.path(), name);
            backend = backend.with_image(name, solid(8, 8, [0, 0, 0]));
        }
        // b was captured long ago, c in the far future; a has only its mtime.
        backend = backend
            .with_metadata(
                "b.jpg",
                CaptureMetadata {
                    captured_at: Some(Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap()),
                    ..Default::default()
                },
            )
            .with_metadata(
                "c.jpg",
                CaptureMetadata {
                    captured_at: Some(Utc.with_ymd_and_hms(2999, 1, 1, 0, 0, 0).unwrap()),
                    make: Some("Canon".into()),
                    ..Default::default()
                },
            );

        let (catalog, _) = build(tmp.path(), &backend, &options(), &PoolMonitor::new()).unwrap();
        let ids: Vec<&str> = catalog.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        assert_eq!(
            catalog.entries[0].exif.as_ref().unwrap().make.as_deref(),
            Some("Canon")
        );
    }

    #[test]
    fn build_keeps_entry_when_metadata_fails() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "x.jpg");
        let mut backend = MockBackend::new().with_image("x.jpg", solid(8, 8, [1, 2, 3]));
        backend.broken_metadata.push("x.jpg".into());

        let (catalog, summary) =
            build(tmp.path(), &backend, &options(), &PoolMonitor::new()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(summary.metadata_warnings, 1);
        assert!(catalog.entries[0].exif.is_none());
    }

    #[test]
    fn build_empty_directory_is_valid_empty_catalog() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "readme.md");
        let (catalog, summary) =
            build(tmp.path(), &MockBackend::new(), &options(), &PoolMonitor::new()).unwrap();
        assert!(catalog.is_empty());
        assert_eq!(summary.scanned, 0);
    }

    #[test]
    fn build_is_reproducible() {
        let tmp = TempDir::new().unwrap();
        let mut backend = MockBackend::new();
        for (i, name) in ["a.jpg", "b.png", "c.gif"].iter().enumerate() {
            touch(tmp.path(), name);
            backend = backend.with_image(name, solid(60 + i as u32, 40, [10, 100, 200]));
        }

        let monitor = PoolMonitor::new();
        let (first, _) = build(tmp.path(), &backend, &options(), &monitor).unwrap();
        let (second, _) = build(tmp.path(), &backend, &options(), &monitor).unwrap();
        assert_eq!(first.entries, second.entries);
        assert_eq!(monitor.acquired(), 2);
        assert_eq!(monitor.outstanding(), 0);
    }

    #[test]
    fn duplicate_stems_get_unique_ids() {
        let tmp = TempDir::new().unwrap();
        let mut backend = MockBackend::new();
        for name in ["a.jpg", "a.png"] {
            touch(tmp.path(), name);
            backend = backend.with_image(name, solid(8, 8, [0, 0, 0]));
        }

        let (catalog, _) = build(tmp.path(), &backend, &options(), &PoolMonitor::new()).unwrap();
        let mut ids: Vec<&str> = catalog.entries.iter().map(|e| e.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, ["a", "a.png"]);
    }

    #[test]
    fn link_derivatives_uses_existing_compressed_files() {
        let tmp = TempDir::new().unwrap();
        let derivatives = tmp.path().join("compressed");
        fs::create_dir(&derivatives).unwrap();
        touch(tmp.path(), "a.jpg");
        touch(tmp.path(), "b.gif");
        touch(&derivatives, "a.jpg_compressed.jpg");
        touch(&derivatives, "a.jpg_thumb.jpg");

        let backend = MockBackend::new()
            .with_image("a.jpg", solid(8, 8, [0, 0, 0]))
            .with_image("b.gif", solid(8, 8, [0, 0, 0]));
        let opts = BuildOptions {
            link_derivatives: true,
            derivatives_dir: Some(derivatives),
            ..options()
        };

        let (catalog, _) = build(tmp.path(), &backend, &opts, &PoolMonitor::new()).unwrap();
        let a = catalog.entries.iter().find(|e| e.id == "a").unwrap();
        assert_eq!(a.path, "/api/derivatives/a.jpg_compressed.jpg");
        assert_eq!(a.original_path, "/api/photos/a.jpg");
        assert_eq!(a.thumbnail_path.as_deref(), Some("/api/derivatives/a.jpg_thumb.jpg"));

        let b = catalog.entries.iter().find(|e| e.id == "b").unwrap();
        assert_eq!(b.path, "/api/photos/b.gif");
        assert!(b.thumbnail_path.is_none());
    }

    #[test]
    fn shared_stems_link_their_own_derivatives() {
        let tmp = TempDir::new().unwrap();
        let derivatives = tmp.path().join("compressed");
        fs::create_dir(&derivatives).unwrap();
        let mut backend = MockBackend::new();
        for name in ["a.gif", "a.webp"] {
            touch(tmp.path(), name);
            touch(&derivatives, &naming::compressed_filename(name));
            touch(&derivatives, &naming::thumbnail_filename(name));
            backend = backend.with_image(name, solid(8, 8, [0, 0, 0]));
        }
        let opts = BuildOptions {
            link_derivatives: true,
            derivatives_dir: Some(derivatives),
            ..options()
        };

        let (catalog, _) = build(tmp.path(), &backend, &opts, &PoolMonitor::new()).unwrap();
        let entry = |filename: &str| catalog.entries.iter().find(|e| e.filename == filename).unwrap();
        let (gif, webp) = (entry("a.gif"), entry("a.webp"));
        assert_eq!(gif.path, "/api/derivatives/a.gif_compressed.webp");
        assert_eq!(webp.path, "/api/derivatives/a.webp_compressed.webp");
        assert_ne!(gif.thumbnail_path, webp.thumbnail_path);
    }

    #[test]
    fn build_and_publish_replaces_store() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.jpg");
        let backend = MockBackend::new().with_image("a.jpg", solid(8, 8, [0, 0, 0]));
        let store = CatalogStore::at(tmp.path().join("catalog.json"));

        let (catalog, summary) =
            build_and_publish(tmp.path(), &backend, &options(), &PoolMonitor::new(), &store)
                .unwrap();
        assert_eq!(summary.cataloged, 1);
        assert_eq!(catalog.len(), 1);
        assert!(tmp.path().join("catalog.json").exists());
        assert_eq!(store.snapshot().unwrap().len(), 1);
    }
}
