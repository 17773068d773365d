//! Catalog store: the persisted artifact plus the in-memory snapshot.
//!
//! Writers publish a whole [`Catalog`] with [`CatalogStore::replace`]:
//! the JSON goes to a sibling temp file, is fsynced, and is renamed over the
//! artifact; only then is the in-memory `Arc` swapped. Readers take a
//! snapshot (`Arc<Catalog>`) under a brief read lock and keep a fully formed
//! catalog for as long as they hold it, whatever happens to the store after.
//!
//! A store bound to a path also picks up catalogs written by another process
//! (an offline `build` while the server runs): every snapshot checks the
//! artifact's modification time and size and reloads when they change. A
//! failed reload keeps serving the last good snapshot.

use super::{Catalog, StoreError};
use crate::pagination::{self, Page};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Identity of the artifact on disk when it was last read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl Fingerprint {
    fn of(path: &Path) -> std::io::Result<Self> {
        let meta = fs::metadata(path)?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

struct Loaded {
    catalog: Arc<Catalog>,
    fingerprint: Option<Fingerprint>,
}

pub struct CatalogStore {
    path: Option<PathBuf>,
    state: RwLock<Option<Loaded>>,
}

impl CatalogStore {
    /// A store with no backing file.
    pub fn in_memory(catalog: Catalog) -> Self {
        Self {
            path: None,
            state: RwLock::new(Some(Loaded {
                catalog: Arc::new(catalog),
                fingerprint: None,
            })),
        }
    }

    /// A store bound to `path`. Nothing is read until the first snapshot.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            state: RwLock::new(None),
        }
    }

    /// A store bound to `path`, loaded eagerly.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::at(path);
        store.snapshot()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The current catalog.
    ///
    /// Errors only when no catalog was ever loaded and the artifact cannot be
    /// read.
    pub fn snapshot(&self) -> Result<Arc<Catalog>, StoreError> {
        let current = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            state
                .as_ref()
                .map(|l| (Arc::clone(&l.catalog), l.fingerprint))
        };

        let Some(path) = &self.path else {
            return current.map(|(catalog, _)| catalog).ok_or(StoreError::Empty);
        };

        let on_disk = Fingerprint::of(path);
        if let (Some((catalog, seen)), Ok(now)) = (&current, &on_disk)
            && *seen == Some(*now)
        {
            return Ok(Arc::clone(catalog));
        }

        match read_catalog(path) {
            Ok(catalog) => {
                let catalog = Arc::new(catalog);
                let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
                *state = Some(Loaded {
                    catalog: Arc::clone(&catalog),
                    fingerprint: on_disk.ok(),
                });
                info!(path = %path.display(), entries = catalog.len(), "catalog loaded");
                Ok(catalog)
            }
            Err(e) => match current {
                Some((catalog, _)) => {
                    warn!(error = %e, "catalog reload failed; serving previous snapshot");
                    Ok(catalog)
                }
                None => Err(e),
            },
        }
    }

    /// Persist `catalog` atomically, then make it the current snapshot.
    pub fn replace(&self, catalog: Catalog) -> Result<Arc<Catalog>, StoreError> {
        let fingerprint = match &self.path {
            Some(path) => {
                write_atomic(path, &catalog)?;
                Fingerprint::of(path).ok()
            }
            None => None,
        };
        let catalog = Arc::new(catalog);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = Some(Loaded {
            catalog: Arc::clone(&catalog),
            fingerprint,
        });
        debug!(entries = catalog.len(), "catalog snapshot replaced");
        Ok(catalog)
    }

    /// One page of the current snapshot.
    pub fn get_page(&self, page: i64, limit: i64) -> Result<Page, StoreError> {
        let catalog = self.snapshot()?;
        Ok(pagination::list(&catalog, page, limit))
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read and parse a catalog artifact.
pub fn read_catalog(path: &Path) -> Result<Catalog, StoreError> {
    let content = fs::read_to_string(path).map_err(io_err(path))?;
    serde_json::from_str(&content).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_atomic(path: &Path, catalog: &Catalog) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let json = serde_json::to_string_pretty(catalog).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "catalog.json".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    let mut file = File::create(&tmp).map_err(io_err(&tmp))?;
    file.write_all(json.as_bytes()).map_err(io_err(&tmp))?;
    file.write_all(b"\n").map_err(io_err(&tmp))?;
    file.sync_all().map_err(io_err(&tmp))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    })
}
