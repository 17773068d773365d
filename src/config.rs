//! Settings for every subcommand, read from `config.toml` in the photo
//! source directory.
//!
//! The file is sparse. Built-in defaults form the bottom layer, the user's
//! table is merged over them key by key, and the result is validated once
//! before any work starts.
//!
//! ## Config File Location
//!
//! ```text
//! photos/
//! ├── config.toml       # Optional overrides
//! ├── IMG_0001.jpg
//! └── ...
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [catalog]
//! path = "catalog.json"                 # Catalog artifact (relative to the source dir)
//! public_prefix = "/api/photos"         # URL prefix for originals
//! derivatives_prefix = "/api/derivatives" # URL prefix for compressed derivatives
//! link_derivatives = false              # Point entry paths at the compressed derivative
//!
//! [compression]
//! output_dir = "compressed"             # Derivative directory (relative to the source dir)
//! jpeg_quality = 80
//! webp_quality = 80
//! png_level = 3                         # 0-6
//! thumbnail_size = 400                  # Long edge of `_thumb` derivatives
//! report = "compression-report.md"      # Written inside output_dir
//! top_n = 5
//!
//! [server]
//! bind = "127.0.0.1:3000"
//! default_limit = 12
//! # photos_root = "photos"              # Defaults to the source dir
//!
//! [processing]
//! max_processes = 4         # Max parallel codec workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{EncoderSettings, PngEffort, Quality};
use crate::pagination::MAX_LIMIT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config.toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("bad config value: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Catalog artifact location and URL layout.
    pub catalog: CatalogConfig,
    /// Derivative encoding settings.
    pub compression: CompressionConfig,
    /// Read API settings.
    pub server: ServerConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.compression;
        for (key, value) in [("jpeg_quality", c.jpeg_quality), ("webp_quality", c.webp_quality)] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "compression.{key} must be 1-100"
                )));
            }
        }
        if c.png_level > 6 {
            return Err(ConfigError::Validation(
                "compression.png_level must be 0-6".into(),
            ));
        }
        if c.thumbnail_size == 0 {
            return Err(ConfigError::Validation(
                "compression.thumbnail_size must be non-zero".into(),
            ));
        }
        if !(1..=MAX_LIMIT as u32).contains(&self.server.default_limit) {
            return Err(ConfigError::Validation(format!(
                "server.default_limit must be 1-{MAX_LIMIT}"
            )));
        }
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "server.bind is not a socket address: {}",
                self.server.bind
            )));
        }
        if self.catalog.path.is_empty() {
            return Err(ConfigError::Validation(
                "catalog.path must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Catalog artifact path, resolved against the source directory.
    pub fn catalog_path(&self, source: &Path) -> PathBuf {
        resolve_path(source, &self.catalog.path)
    }

    /// Derivative output directory, resolved against the source directory.
    pub fn output_dir(&self, source: &Path) -> PathBuf {
        resolve_path(source, &self.compression.output_dir)
    }

    /// Report file path, resolved against the output directory.
    pub fn report_path(&self, source: &Path) -> PathBuf {
        resolve_path(&self.output_dir(source), &self.compression.report)
    }

    /// Directory the read API serves original photos from.
    pub fn photos_root(&self, source: &Path) -> PathBuf {
        match &self.server.photos_root {
            Some(root) => resolve_path(source, root),
            None => source.to_path_buf(),
        }
    }

    /// Encoder settings for the compression pipeline.
    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings {
            jpeg_quality: Quality::new(self.compression.jpeg_quality),
            webp_quality: Quality::new(self.compression.webp_quality),
            png_effort: PngEffort::new(self.compression.png_level),
        }
    }
}

fn resolve_path(base: &Path, configured: &str) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Catalog artifact and URL layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// Where the catalog JSON is written, relative to the source directory.
    pub path: String,
    /// URL prefix for original photos.
    pub public_prefix: String,
    /// URL prefix for compressed derivatives.
    pub derivatives_prefix: String,
    /// When true, entry `path` points at `<filename>_compressed.<ext>`.
    pub link_derivatives: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: "catalog.json".to_string(),
            public_prefix: "/api/photos".to_string(),
            derivatives_prefix: "/api/derivatives".to_string(),
            link_derivatives: false,
        }
    }
}

/// Derivative encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// Derivative directory, relative to the source directory.
    pub output_dir: String,
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub jpeg_quality: u32,
    /// WebP encoding quality (1 = worst, 100 = best).
    pub webp_quality: u32,
    /// PNG recompression effort (0 = fastest, 6 = smallest).
    pub png_level: u8,
    /// Long edge of thumbnails in pixels.
    pub thumbnail_size: u32,
    /// Markdown report file name, relative to `output_dir`.
    pub report: String,
    /// Number of best results listed in the report.
    pub top_n: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            output_dir: "compressed".to_string(),
            jpeg_quality: 80,
            webp_quality: 80,
            png_level: 3,
            thumbnail_size: 400,
            report: "compression-report.md".to_string(),
            top_n: 5,
        }
    }
}

/// Read API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
    /// Page size when the request has no usable `limit`.
    pub default_limit: u32,
    /// Directory originals are served from. Defaults to the source directory.
    pub photos_root: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            default_limit: 12,
            photos_root: None,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel codec workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Worker count for the codec pool: every core unless `max_processes`
/// asks for fewer. Never zero, never more than the machine has.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = available_cores();
    match config.max_processes {
        Some(requested) => requested.clamp(1, cores),
        None => cores,
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// The built-in defaults as a TOML table, the bottom layer of every load.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AppConfig::default()).expect("default config must serialize")
}

/// Lay `overlay` over `base`. Tables merge per key at every depth; any other
/// overlay value wins outright.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(lower), toml::Value::Table(upper)) => {
            toml::Value::Table(upper.into_iter().fold(lower, |mut table, (key, value)| {
                let next = match table.remove(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => value,
                };
                table.insert(key, next);
                table
            }))
        }
        (_, overlay) => overlay,
    }
}

/// Parse `<dir>/config.toml` without interpreting it. `None` when the
/// directory has no config file.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let path = dir.join(CONFIG_FILENAME);
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path)?;
    Ok(Some(toml::from_str(&text)?))
}

pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AppConfig, ConfigError> {
    let merged = overlay.into_iter().fold(base, merge_toml);
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Effective settings for a source directory: defaults, then the user's
/// `config.toml`, then validation.
pub fn load_config(source: &Path) -> Result<AppConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(source)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Photo Catalog Configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file in the photo source directory as config.toml.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Catalog
# ---------------------------------------------------------------------------
[catalog]
# Where the catalog JSON is written. Relative paths resolve against the
# source directory.
path = "catalog.json"

# URL prefix for original photos in catalog entries.
public_prefix = "/api/photos"

# URL prefix for compressed derivatives in catalog entries.
derivatives_prefix = "/api/derivatives"

# Point each entry's `path` at its compressed derivative instead of the
# original. Run `compress` before `build` when enabling this.
link_derivatives = false

# ---------------------------------------------------------------------------
# Compression
# ---------------------------------------------------------------------------
[compression]
# Derivative directory. Relative paths resolve against the source directory.
output_dir = "compressed"

# Lossy encoding quality (1 = worst, 100 = best).
jpeg_quality = 80
webp_quality = 80

# PNG recompression effort (0 = fastest, 6 = smallest).
png_level = 3

# Long edge of `_thumb` derivatives in pixels. Smaller images are not upscaled.
thumbnail_size = 400

# Markdown report, written inside output_dir.
report = "compression-report.md"

# Number of best results listed in the report.
top_n = 5

# ---------------------------------------------------------------------------
# Read API
# ---------------------------------------------------------------------------
[server]
bind = "127.0.0.1:3000"

# Page size when a request has no usable `limit` (1-50).
default_limit = 12

# Directory originals are served from. Defaults to the source directory.
# photos_root = "photos"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel codec workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, text: &str) {
        fs::write(dir.join(CONFIG_FILENAME), text).unwrap();
    }

    fn cores() -> usize {
        available_cores()
    }

    // =========================================================================
    // Defaults and layering
    // =========================================================================

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.catalog.path, "catalog.json");
        assert_eq!(config.catalog.public_prefix, "/api/photos");
        assert!(!config.catalog.link_derivatives);
        assert_eq!(config.compression.jpeg_quality, 80);
        assert_eq!(config.compression.png_level, 3);
        assert_eq!(config.compression.thumbnail_size, 400);
        assert_eq!(config.compression.top_n, 5);
        assert_eq!(config.server.default_limit, 12);
        assert!(config.server.photos_root.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.compression.jpeg_quality, 80);
        assert_eq!(config.server.bind, "127.0.0.1:3000");
    }

    #[test]
    fn sparse_file_overrides_only_named_keys() {
        let tmp = TempDir::new().unwrap();
        write_config(
            tmp.path(),
            "[catalog]\nlink_derivatives = true\n\n[server]\ndefault_limit = 24\n",
        );

        let config = load_config(tmp.path()).unwrap();
        assert!(config.catalog.link_derivatives);
        assert_eq!(config.server.default_limit, 24);
        assert_eq!(config.catalog.path, "catalog.json");
        assert_eq!(config.server.bind, "127.0.0.1:3000");
    }

    #[test]
    fn merge_recurses_into_tables() {
        let base: toml::Value =
            toml::from_str("top = 1\n[compression]\njpeg_quality = 80\nwebp_quality = 80\n")
                .unwrap();
        let upper: toml::Value =
            toml::from_str("top = 2\n[compression]\njpeg_quality = 60\n").unwrap();

        let merged = merge_toml(base, upper);
        assert_eq!(merged["top"].as_integer(), Some(2));
        assert_eq!(merged["compression"]["jpeg_quality"].as_integer(), Some(60));
        assert_eq!(merged["compression"]["webp_quality"].as_integer(), Some(80));
    }

    #[test]
    fn defaults_table_has_every_section() {
        let value = stock_defaults_value();
        for section in ["catalog", "compression", "server", "processing"] {
            assert!(value.get(section).is_some(), "missing {section}");
        }
    }

    // =========================================================================
    // Rejections
    // =========================================================================

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        write_config(tmp.path(), "jpeg_quality = [[[");
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn misspelled_keys_and_sections_are_rejected() {
        for text in [
            "[compression]\njpeg_qualty = 70\n",
            "[server]\nport = 80\n",
            "[theme]\ncolor = \"red\"\n",
        ] {
            let tmp = TempDir::new().unwrap();
            write_config(tmp.path(), text);
            assert!(load_config(tmp.path()).is_err(), "{text}");
        }
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let cases: [fn(&mut AppConfig); 7] = [
            |c| c.compression.jpeg_quality = 0,
            |c| c.compression.webp_quality = 101,
            |c| c.compression.png_level = 7,
            |c| c.compression.thumbnail_size = 0,
            |c| c.server.default_limit = 51,
            |c| c.server.bind = "localhost".into(),
            |c| c.catalog.path.clear(),
        ];
        for (i, mutate) in cases.into_iter().enumerate() {
            let mut config = AppConfig::default();
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(ConfigError::Validation(_))),
                "case {i}"
            );
        }
    }

    #[test]
    fn range_edges_are_accepted() {
        let mut config = AppConfig::default();
        config.compression.jpeg_quality = 100;
        config.compression.webp_quality = 1;
        config.compression.png_level = 0;
        config.server.default_limit = 50;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_runs_on_load() {
        let tmp = TempDir::new().unwrap();
        write_config(tmp.path(), "[compression]\nthumbnail_size = 0\n");
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // Derived values
    // =========================================================================

    #[test]
    fn relative_paths_resolve_against_source() {
        let config = AppConfig::default();
        let source = Path::new("/srv/photos");
        assert_eq!(config.catalog_path(source), PathBuf::from("/srv/photos/catalog.json"));
        assert_eq!(config.output_dir(source), PathBuf::from("/srv/photos/compressed"));
        assert_eq!(
            config.report_path(source),
            PathBuf::from("/srv/photos/compressed/compression-report.md")
        );
        assert_eq!(config.photos_root(source), PathBuf::from("/srv/photos"));
    }

    #[test]
    fn absolute_paths_are_kept() {
        let mut config = AppConfig::default();
        config.catalog.path = "/var/lib/catalog.json".into();
        config.server.photos_root = Some("/mnt/originals".into());
        let source = Path::new("/srv/photos");
        assert_eq!(config.catalog_path(source), PathBuf::from("/var/lib/catalog.json"));
        assert_eq!(config.photos_root(source), PathBuf::from("/mnt/originals"));
    }

    #[test]
    fn encoder_settings_follow_compression_section() {
        let mut config = AppConfig::default();
        config.compression.jpeg_quality = 65;
        config.compression.png_level = 6;
        let settings = config.encoder_settings();
        assert_eq!(settings.jpeg_quality.value(), 65);
        assert_eq!(settings.webp_quality.value(), 80);
        assert_eq!(settings.png_effort.value(), 6);
    }

    #[test]
    fn thread_count_is_capped_by_cores_and_floored_at_one() {
        let with = |max_processes| effective_threads(&ProcessingConfig { max_processes });
        assert_eq!(with(None), cores());
        assert_eq!(with(Some(0)), 1);
        assert_eq!(with(Some(1)), 1);
        assert_eq!(with(Some(cores() + 100)), cores());
    }

    // =========================================================================
    // gen-config output
    // =========================================================================

    #[test]
    fn stock_file_parses_to_the_defaults() {
        let text = stock_config_toml();
        for section in ["[catalog]", "[compression]", "[server]", "[processing]"] {
            assert!(text.contains(section), "missing {section}");
        }

        let config: AppConfig = toml::from_str(text).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.catalog.path, defaults.catalog.path);
        assert_eq!(config.catalog.derivatives_prefix, defaults.catalog.derivatives_prefix);
        assert_eq!(config.compression.output_dir, defaults.compression.output_dir);
        assert_eq!(config.compression.report, defaults.compression.report);
        assert_eq!(config.server.bind, defaults.server.bind);
        assert_eq!(config.server.default_limit, defaults.server.default_limit);
        assert!(config.processing.max_processes.is_none());
    }
}
