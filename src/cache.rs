//! Encode cache for `compress`.
//!
//! A derivative only depends on the bytes of its source photo and on the
//! encoder settings, so a rerun can skip any photo whose two hashes match
//! what the previous run recorded.
//!
//! The manifest lives at `<output_dir>/.cache-manifest.json` and is grouped
//! by source filename:
//!
//! ```json
//! {
//!   "version": 1,
//!   "sources": {
//!     "IMG_0001.jpg": {
//!       "source_hash": "9f2c…",
//!       "derivatives": [
//!         { "file": "IMG_0001.jpg_compressed.jpg", "params_hash": "41aa…" },
//!         { "file": "IMG_0001.jpg_thumb.jpg", "params_hash": "07d3…" }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! Lookups ignore the filename and go by `(source_hash, params_hash)`, so a
//! renamed photo reuses the derivative written under its old name. Sources
//! that disappear from the directory are pruned after each run.
//!
//! A record only counts while its file is still in the output directory;
//! deleting a derivative by hand forces that photo to re-encode.

use crate::imaging::EncodeParams;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const MANIFEST_FILENAME: &str = ".cache-manifest.json";

/// Bumped whenever the layout or the hash inputs change; older manifests
/// are discarded on load.
const FORMAT_VERSION: u32 = 1;

/// Which derivative a params hash describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeKind {
    Compressed,
    /// Thumbnail fitted within the given edge.
    Thumbnail(u32),
}

/// One derivative file written for a source photo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DerivativeRecord {
    pub file: String,
    pub params_hash: String,
}

/// Everything the last run wrote for one source photo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRecord {
    pub source_hash: String,
    pub derivatives: Vec<DerivativeRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    version: u32,
    sources: BTreeMap<String, SourceRecord>,
    /// source_hash → params_hash → file. Rebuilt on load.
    #[serde(skip)]
    by_content: HashMap<String, HashMap<String, String>>,
}

impl CacheManifest {
    pub fn empty() -> Self {
        Self {
            version: FORMAT_VERSION,
            sources: BTreeMap::new(),
            by_content: HashMap::new(),
        }
    }

    /// Read the manifest from `output_dir`. Anything unusable (missing,
    /// malformed, other version) yields an empty manifest.
    pub fn load(output_dir: &Path) -> Self {
        let path = manifest_path(output_dir);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => return Self::empty(),
        };
        match serde_json::from_str::<Self>(&text) {
            Ok(mut manifest) if manifest.version == FORMAT_VERSION => {
                manifest.reindex();
                manifest
            }
            Ok(manifest) => {
                debug!(found = manifest.version, "cache manifest version changed, starting over");
                Self::empty()
            }
            Err(e) => {
                debug!(error = %e, "unreadable cache manifest, starting over");
                Self::empty()
            }
        }
    }

    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(manifest_path(output_dir), json)
    }

    /// The stored derivative for this content, if its file still exists.
    ///
    /// The returned name can belong to a different source filename than the
    /// caller's when the photo was renamed.
    pub fn lookup(&self, source_hash: &str, params_hash: &str, output_dir: &Path) -> Option<&str> {
        let file = self.by_content.get(source_hash)?.get(params_hash)?;
        output_dir.join(file).is_file().then_some(file.as_str())
    }

    /// Replace whatever was recorded for `source`.
    pub fn record(&mut self, source: &str, record: SourceRecord) {
        self.index(&record);
        self.sources.insert(source.to_string(), record);
    }

    /// Drop records for sources not in `present`. Returns how many went.
    pub fn prune(&mut self, present: &HashSet<String>) -> usize {
        let before = self.sources.len();
        self.sources.retain(|name, _| present.contains(name));
        let removed = before - self.sources.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    pub fn source(&self, name: &str) -> Option<&SourceRecord> {
        self.sources.get(name)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn reindex(&mut self) {
        self.by_content.clear();
        let records: Vec<SourceRecord> = self.sources.values().cloned().collect();
        for record in &records {
            self.index(record);
        }
    }

    fn index(&mut self, record: &SourceRecord) {
        let slot = self.by_content.entry(record.source_hash.clone()).or_default();
        for d in &record.derivatives {
            slot.insert(d.params_hash.clone(), d.file.clone());
        }
    }
}

/// Hex SHA-256 of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Hex SHA-256 over every setting that changes the bytes of one derivative.
pub fn hash_encode_params(kind: DerivativeKind, params: &EncodeParams) -> String {
    let mut hasher = Sha256::new();
    match kind {
        DerivativeKind::Compressed => hasher.update(b"compressed\0"),
        DerivativeKind::Thumbnail(edge) => {
            hasher.update(b"thumbnail\0");
            hasher.update(edge.to_le_bytes());
        }
    }
    hasher.update(params.codec.extension().as_bytes());
    hasher.update(b"\0");
    hasher.update(params.quality.value().to_le_bytes());
    hasher.update([params.effort.value()]);
    format!("{:x}", hasher.finalize())
}

/// Per-photo cache outcome counts for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn copy(&mut self) {
        self.copies += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits + self.copies == 0 {
            return write!(f, "{} encoded", self.misses);
        }
        write!(f, "{} cached", self.hits)?;
        if self.copies > 0 {
            write!(f, ", {} copied", self.copies)?;
        }
        write!(f, ", {} encoded ({} total)", self.misses, self.total())
    }
}

pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MANIFEST_FILENAME)
}
