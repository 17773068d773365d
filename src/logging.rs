//! Diagnostic logging.
//!
//! Diagnostics go to stderr through `tracing`; the human-readable run output
//! in [`output`](crate::output) goes to stdout, so the two never interleave in
//! a pipe.
//!
//! Level is controlled by the `PHOTO_CATALOG_LOG` environment variable, using
//! `EnvFilter` directives:
//! - `PHOTO_CATALOG_LOG=debug` for per-photo detail
//! - `PHOTO_CATALOG_LOG=info` for run milestones (default)
//! - `PHOTO_CATALOG_LOG=warn,photo_catalog::server=debug` to trace requests only

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "PHOTO_CATALOG_LOG";
const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
