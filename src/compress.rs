//! Compression pipeline.
//!
//! Re-encodes every photo in the source directory into a size-optimised
//! derivative plus a thumbnail, independently of the catalog build:
//!
//! | Source | Codec | Output |
//! |---|---|---|
//! | `.jpg`, `.jpeg` | JPEG, quality 80 | `<file>_compressed.jpg`, `<file>_thumb.jpg` |
//! | `.png` | PNG, effort 3 | `<file>_compressed.png`, `<file>_thumb.png` |
//! | `.webp` | WebP | `<file>_compressed.webp`, `<file>_thumb.webp` |
//! | `.gif`, `.bmp` | WebP fallback | `<file>_compressed.webp`, `<file>_thumb.webp` |
//!
//! Every photo settles on its own: a photo that fails to decode, encode or
//! write becomes a [`CompressionFailure`] and the rest carry on. Only an
//! unreadable source directory or an output directory that cannot be
//! created fails the run.
//!
//! Work runs on a [`CodecPool`] acquired for the duration of
//! [`compress_all`] and released when it returns, on success or error.
//!
//! Unchanged photos are skipped through the content-addressed
//! [`cache`](crate::cache) unless caching is disabled.

use crate::cache::{self, CacheManifest, CacheStats, DerivativeKind, DerivativeRecord, SourceRecord};
use crate::config::{AppConfig, effective_threads};
use crate::imaging::calculations::compression_ratio;
use crate::imaging::operations::encode_with_thumbnail;
use crate::imaging::{
    BackendError, CodecPool, EncodeParams, EncoderSettings, ImageBackend, PoolMonitor, plan_encode,
};
use crate::naming;
use crate::scan::list_photos;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("cannot read source directory {path}: {source}")]
    SourceDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("output directory must differ from the source directory: {0}")]
    OutputIsSource(PathBuf),
    #[error("codec pool: {0}")]
    Pool(#[from] BackendError),
}

/// Settings for one compression run.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    pub settings: EncoderSettings,
    /// Long edge of thumbnails.
    pub thumbnail_size: u32,
    pub threads: usize,
    pub use_cache: bool,
}

impl CompressOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            settings: config.encoder_settings(),
            thumbnail_size: config.compression.thumbnail_size,
            threads: effective_threads(&config.processing),
            use_cache: true,
        }
    }
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// A successfully compressed photo.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    pub filename: String,
    pub original_size: u64,
    pub compressed_size: u64,
    /// Percent saved, two decimals; negative when the derivative grew.
    pub compression_ratio: f64,
    /// The `_compressed` derivative.
    pub output: PathBuf,
    pub thumbnail: PathBuf,
    pub params: EncodeParams,
    /// Served from the cache instead of re-encoded.
    pub cached: bool,
}

/// A photo that could not be compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionFailure {
    pub filename: String,
    pub reason: String,
}

/// Everything a run produced, in filename order.
#[derive(Debug, Default)]
pub struct CompressionRun {
    pub results: Vec<CompressionResult>,
    pub failures: Vec<CompressionFailure>,
    pub cache: CacheStats,
}

impl CompressionRun {
    pub fn total_original(&self) -> u64 {
        self.results.iter().map(|r| r.original_size).sum()
    }

    pub fn total_compressed(&self) -> u64 {
        self.results.iter().map(|r| r.compressed_size).sum()
    }

    /// Overall percent saved across all successful results.
    pub fn overall_ratio(&self) -> f64 {
        compression_ratio(self.total_original(), self.total_compressed())
    }
}

/// Progress events, sent as photos settle.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressEvent {
    Started {
        total: usize,
    },
    Compressed {
        filename: String,
        original_size: u64,
        compressed_size: u64,
        ratio: f64,
    },
    Cached {
        filename: String,
    },
    Failed {
        filename: String,
        reason: String,
    },
}

/// How the cache took part in one photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheOutcome {
    Hit,
    Copied,
    Miss,
}

struct ItemOutput {
    result: CompressionResult,
    cache: CacheOutcome,
    /// Recorded into the manifest after the parallel phase.
    record: SourceRecord,
}

/// Compress every photo in `source` into `output_dir`.
pub fn compress_all(
    source: &Path,
    output_dir: &Path,
    backend: &impl ImageBackend,
    options: &CompressOptions,
    monitor: &PoolMonitor,
    events: Option<&Sender<CompressEvent>>,
) -> Result<CompressionRun, CompressError> {
    let photos = list_photos(source).map_err(|e| CompressError::SourceDir {
        path: e.path,
        source: e.source,
    })?;
    fs::create_dir_all(output_dir).map_err(|source| CompressError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    })?;
    if same_dir(source, output_dir) {
        return Err(CompressError::OutputIsSource(output_dir.to_path_buf()));
    }

    let mut manifest = if options.use_cache {
        CacheManifest::load(output_dir)
    } else {
        CacheManifest::empty()
    };

    info!(photos = photos.len(), output = %output_dir.display(), "compressing");
    emit(events, CompressEvent::Started { total: photos.len() });

    let outcomes: Vec<(String, Result<ItemOutput, BackendError>)> = {
        let pool = CodecPool::acquire("compress", options.threads, monitor)?;
        let manifest = &manifest;
        pool.install(|| {
            photos
                .par_iter()
                .map(|path| {
                    let filename = file_name(path);
                    let outcome = compress_one(path, &filename, output_dir, backend, options, manifest);
                    match &outcome {
                        Ok(item) if item.cache == CacheOutcome::Miss => emit(
                            events,
                            CompressEvent::Compressed {
                                filename: filename.clone(),
                                original_size: item.result.original_size,
                                compressed_size: item.result.compressed_size,
                                ratio: item.result.compression_ratio,
                            },
                        ),
                        Ok(_) => emit(
                            events,
                            CompressEvent::Cached {
                                filename: filename.clone(),
                            },
                        ),
                        Err(e) => emit(
                            events,
                            CompressEvent::Failed {
                                filename: filename.clone(),
                                reason: e.to_string(),
                            },
                        ),
                    }
                    (filename, outcome)
                })
                .collect()
        })
    };

    let mut run = CompressionRun::default();
    for (filename, outcome) in outcomes {
        match outcome {
            Ok(item) => {
                match item.cache {
                    CacheOutcome::Hit => run.cache.hit(),
                    CacheOutcome::Copied => run.cache.copy(),
                    CacheOutcome::Miss => run.cache.miss(),
                }
                manifest.record(&filename, item.record);
                run.results.push(item.result);
            }
            Err(error) => {
                warn!(file = %filename, %error, "compression failed");
                run.failures.push(CompressionFailure {
                    filename,
                    reason: error.to_string(),
                });
            }
        }
    }

    let present: HashSet<String> = photos.iter().map(|p| file_name(p)).collect();
    let pruned = manifest.prune(&present);
    if pruned > 0 {
        debug!(pruned, "dropped cache records for removed photos");
    }
    if let Err(e) = manifest.save(output_dir) {
        warn!(error = %e, "could not save cache manifest");
    }

    info!(
        compressed = run.results.len(),
        failed = run.failures.len(),
        cache = %run.cache,
        "compression finished"
    );
    Ok(run)
}

fn compress_one(
    source: &Path,
    filename: &str,
    output_dir: &Path,
    backend: &impl ImageBackend,
    options: &CompressOptions,
    manifest: &CacheManifest,
) -> Result<ItemOutput, BackendError> {
    let bytes = fs::read(source)?;
    let original_size = bytes.len() as u64;
    let source_hash = cache::hash_bytes(&bytes);
    drop(bytes);

    let params = plan_encode(source, &options.settings);
    let compressed_name = naming::compressed_filename(filename);
    let thumb_name = naming::thumbnail_filename(filename);
    let full_hash = cache::hash_encode_params(DerivativeKind::Compressed, &params);
    let thumb_hash =
        cache::hash_encode_params(DerivativeKind::Thumbnail(options.thumbnail_size), &params);

    let output = output_dir.join(&compressed_name);
    let thumbnail = output_dir.join(&thumb_name);
    let cached = (
        manifest.lookup(&source_hash, &full_hash, output_dir),
        manifest.lookup(&source_hash, &thumb_hash, output_dir),
    );
    let cache = match cached {
        (Some(full), Some(thumb)) => {
            let mut outcome = CacheOutcome::Hit;
            for (stored, wanted) in [(full, &compressed_name), (thumb, &thumb_name)] {
                if stored != wanted.as_str() {
                    fs::copy(output_dir.join(stored), output_dir.join(wanted))?;
                    outcome = CacheOutcome::Copied;
                }
            }
            debug!(file = filename, "cache hit");
            outcome
        }
        _ => {
            let image = backend.decode(source)?;
            let (full, thumb) =
                encode_with_thumbnail(backend, &image, &params, options.thumbnail_size)?;
            fs::write(&output, &full)?;
            fs::write(&thumbnail, &thumb)?;
            CacheOutcome::Miss
        }
    };

    let compressed_size = fs::metadata(&output)?.len();
    Ok(ItemOutput {
        result: CompressionResult {
            filename: filename.to_string(),
            original_size,
            compressed_size,
            compression_ratio: compression_ratio(original_size, compressed_size),
            output,
            thumbnail,
            params,
            cached: cache != CacheOutcome::Miss,
        },
        cache,
        record: SourceRecord {
            source_hash,
            derivatives: vec![
                DerivativeRecord {
                    file: compressed_name,
                    params_hash: full_hash,
                },
                DerivativeRecord {
                    file: thumb_name,
                    params_hash: thumb_hash,
                },
            ],
        },
    })
}

fn emit(events: Option<&Sender<CompressEvent>>, event: CompressEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is listening.
        let _ = tx.send(event);
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
