//! Photo directory listing.
//!
//! Both pipelines start from the same list: the regular files directly inside
//! the source directory whose extension has a decoder compiled in.
//!
//! ```text
//! photos/
//! ├── config.toml          # ignored (not a photo)
//! ├── IMG_0001.jpg         # listed
//! ├── diagram.PNG          # listed (extension match is case-insensitive)
//! ├── notes.txt            # ignored
//! └── compressed/          # ignored (subdirectories are never entered)
//! ```
//!
//! The list is sorted byte-wise by filename so every run sees the same order
//! regardless of how the filesystem enumerates the directory.

use crate::imaging::is_supported_image;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

#[derive(Error, Debug)]
#[error("cannot read directory {path}: {source}")]
pub struct ScanError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// List photo files directly inside `dir`, sorted by filename.
///
/// A missing, unreadable or non-directory `dir` is an error; an unreadable
/// individual entry is skipped with a warning.
pub fn list_photos(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    // Fails for missing, non-directory and unreadable paths alike.
    fs::read_dir(dir).map_err(|source| ScanError {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut photos = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            photos.push(entry.into_path());
        }
    }
    Ok(photos)
}
