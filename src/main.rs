use chrono::Local;
use clap::{Parser, Subcommand};
use photo_catalog::catalog::builder::BuildOptions;
use photo_catalog::catalog::{self, CatalogStore};
use photo_catalog::compress::{self, CompressOptions};
use photo_catalog::config::{self, AppConfig};
use photo_catalog::imaging::{PoolMonitor, RustBackend};
use photo_catalog::report::{self, ReportContext};
use photo_catalog::server::{self, AppState};
use photo_catalog::{logging, output};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

#[derive(Parser)]
#[command(name = "photo-catalog")]
#[command(about = "Photo catalog generator and paginated read API")]
#[command(long_about = "\
Photo catalog generator and paginated read API

The source directory is the data source. Every decodable image directly
inside it becomes a catalog entry; subdirectories are ignored.

  photos/
  ├── config.toml                  # Optional settings (see gen-config)
  ├── IMG_0001.jpg                 # Cataloged
  ├── diagram.png                  # Cataloged
  ├── catalog.json                 # Written by `build`
  └── compressed/                  # Written by `compress`
      ├── IMG_0001.jpg_compressed.jpg
      ├── IMG_0001.jpg_thumb.jpg
      └── compression-report.md

Typical use:
  photo-catalog build       # write catalog.json
  photo-catalog compress    # write derivatives and the report
  photo-catalog serve       # GET /api/photos?page=1&limit=12

Set PHOTO_CATALOG_LOG=debug for per-photo diagnostics on stderr.")]
#[command(version)]
struct Cli {
    /// Photo source directory
    #[arg(long, default_value = "photos", global = true)]
    source: PathBuf,

    /// Catalog artifact path (overrides [catalog] path)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the source directory and publish the catalog
    Build,
    /// Write compressed derivatives, thumbnails and a report
    Compress {
        /// Disable the encode cache and re-encode every photo
        #[arg(long)]
        no_cache: bool,
    },
    /// Serve the catalog over HTTP
    Serve {
        /// Listen address (overrides [server] bind)
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Build => {
            let (config, catalog_path) = load(&cli)?;
            let options = BuildOptions::from_config(&config, &cli.source);
            let store = CatalogStore::at(&catalog_path);
            let (published, summary) = catalog::build_and_publish(
                &cli.source,
                &RustBackend::new(),
                &options,
                &PoolMonitor::new(),
                &store,
            )?;
            output::print_build_output(&published, &summary, &catalog_path);
        }
        Command::Compress { no_cache } => {
            let (config, _) = load(&cli)?;
            let output_dir = config.output_dir(&cli.source);
            let options = CompressOptions {
                use_cache: !no_cache,
                ..CompressOptions::from_config(&config)
            };

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_compress_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = compress::compress_all(
                &cli.source,
                &output_dir,
                &RustBackend::new(),
                &options,
                &PoolMonitor::new(),
                Some(&tx),
            );
            drop(tx);
            printer
                .join()
                .map_err(|_| "progress printer panicked")?;
            let run = result?;

            let report_path = config.report_path(&cli.source);
            let ctx = ReportContext {
                settings: &options.settings,
                thumbnail_size: options.thumbnail_size,
                top_n: config.compression.top_n,
                generated_at: Local::now(),
            };
            let written = match report::write_report(&report_path, &run, &ctx) {
                Ok(()) => Some(report_path.as_path()),
                Err(e) => {
                    warn!(path = %report_path.display(), error = %e, "could not write report");
                    None
                }
            };
            output::print_compress_summary(&run, written);
        }
        Command::Serve { bind } => {
            let (config, catalog_path) = load(&cli)?;
            let addr = match bind {
                Some(addr) => addr,
                None => config.server.bind.parse()?,
            };
            let store = Arc::new(CatalogStore::at(&catalog_path));
            let entries = match store.snapshot() {
                Ok(catalog) => catalog.len(),
                Err(e) => {
                    warn!(error = %e, "no catalog yet; /api/photos answers 500 until one is built");
                    0
                }
            };
            let state = AppState::from_config(&config, &cli.source, store);
            output::print_serve_banner(addr, &catalog_path, entries);

            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::serve(addr, state))?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Start logging, then load config and resolve the catalog path.
fn load(cli: &Cli) -> Result<(AppConfig, PathBuf), config::ConfigError> {
    logging::init();
    let config = config::load_config(&cli.source)?;
    let catalog_path = cli
        .catalog
        .clone()
        .unwrap_or_else(|| config.catalog_path(&cli.source));
    Ok((config, catalog_path))
}
