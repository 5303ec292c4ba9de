//! Server binary for edgequake-pdfserver.
//!
//! A thin shim over the library crate: read the JSON config, install
//! logging, start the worker pool and the HTTP listener.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfserver::{serve, Backends, ServerConfig, DEFAULT_CONFIG_FILE};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Defaults (reads ./pdfserver.json when present)
  pdfserver

  # Explicit config and address
  pdfserver --config /etc/pdfserver.json --listen 0.0.0.0:8091

  # Submit a document
  curl 'http://127.0.0.1:8091/convert?url=https%3A%2F%2Fexample.com%2Fa.pdf&id=42&callback=https%3A%2F%2Fapp%2Fhook'

CONFIG FILE (all keys optional):
  {
    "MaxFileSize": 104857600,
    "MaxPages": 400,
    "NumWorkers": 4,
    "QueueCapacity": 1024,
    "SubmitTimeoutSecs": 10,
    "TempPath": "tmp",
    "RenderCommand": "pdf2svg",
    "RasterCommand": "convert",
    "RasterDensity": 80,
    "UploadChunkSize": 1048576,
    "UploadMaxRetries": 3,
    "UploadRetryBackoffMs": 500,
    "HttpTimeoutSecs": null,
    "KeepFiles": false
  }

REQUIREMENTS:
  pdf2svg and ImageMagick's convert must be on PATH (or set RenderCommand /
  RasterCommand).
"#;

/// Queue-backed PDF page conversion server.
#[derive(Parser, Debug)]
#[command(
    name = "pdfserver",
    version,
    about = "Convert remote PDFs page by page, upload the pages and report by callback",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to JSON config file.
    #[arg(long, env = "PDFSERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen to.
    #[arg(long, env = "PDFSERVER_LISTEN", default_value = "127.0.0.1:8091")]
    listen: String,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFSERVER_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Config ───────────────────────────────────────────────────────────
    let config = load_config(cli.config.as_deref())?;
    info!(
        workers = config.num_workers,
        queue = config.queue_capacity,
        max_pages = config.max_pages,
        "Configuration loaded"
    );

    let backends = Backends::from_config(&config).context("Failed to set up backends")?;

    serve(&cli.listen, config, backends)
        .await
        .context("Server stopped")?;

    Ok(())
}

/// An explicitly named file must load; the default file is optional.
fn load_config(explicit: Option<&Path>) -> Result<ServerConfig> {
    if let Some(path) = explicit {
        return ServerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {:?}", path));
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        return ServerConfig::from_json_file(default_path)
            .with_context(|| format!("Failed to load config {:?}", default_path));
    }

    info!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
    Ok(ServerConfig::default())
}
