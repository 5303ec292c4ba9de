//! Configuration types for the conversion server.
//!
//! All limits and knobs live in one immutable [`ServerConfig`], handed to the
//! pool and the pipeline at construction time. It is built either with
//! [`ServerConfig::builder()`] or read from a JSON file whose keys mirror the
//! field names in PascalCase (`MaxFileSize`, `NumWorkers`, …). Missing keys
//! fall back to the documented defaults.

use crate::error::PdfServerError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name looked up by the `pdfserver` binary.
pub const DEFAULT_CONFIG_FILE: &str = "pdfserver.json";

/// Configuration for the conversion server.
///
/// # Example
/// ```rust
/// use edgequake_pdfserver::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .num_workers(8)
///     .max_pages(200)
///     .temp_path("/var/tmp/pdfserver")
///     .build()
///     .unwrap();
/// assert_eq!(config.num_workers, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServerConfig {
    /// Maximum size of a downloaded source document in bytes. Default: 100 MiB.
    pub max_file_size: u64,

    /// Maximum number of pages a document may have. Default: 400.
    ///
    /// Also bounds the number of concurrent uploads a single task spawns.
    pub max_pages: usize,

    /// Number of long-lived conversion workers. Default: 4.
    pub num_workers: usize,

    /// Admission queue capacity. Default: 1024.
    pub queue_capacity: usize,

    /// How long a submission may wait for queue space before it is rejected.
    /// Default: 10.
    pub submit_timeout_secs: u64,

    /// Root under which each task gets its `<id>/` working directory. Default: `tmp`.
    pub temp_path: PathBuf,

    /// Program that renders a PDF into one SVG per page. Default: `pdf2svg`.
    pub render_command: String,

    /// Program that rasterises an SVG page. Default: ImageMagick `convert`.
    pub raster_command: String,

    /// Density (DPI) passed to the rasteriser. Default: 80.
    pub raster_density: u32,

    /// Bytes sent per resumable-upload request. Default: 1 MiB.
    pub upload_chunk_size: usize,

    /// Retries per page after a transient upload failure. Default: 3.
    pub upload_max_retries: u32,

    /// Initial upload retry delay in milliseconds, doubled per attempt. Default: 500.
    pub upload_retry_backoff_ms: u64,

    /// Optional timeout applied to every outbound HTTP request. Default: none.
    ///
    /// Without it fetches, callbacks and uploads rely on the transport's own
    /// behaviour, and a stalled peer can hold a worker indefinitely.
    pub http_timeout_secs: Option<u64>,

    /// Keep working directories after a task finishes. Default: false.
    pub keep_files: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024,
            max_pages: 400,
            num_workers: 4,
            queue_capacity: 1024,
            submit_timeout_secs: 10,
            temp_path: PathBuf::from("tmp"),
            render_command: "pdf2svg".to_string(),
            raster_command: "convert".to_string(),
            raster_density: 80,
            upload_chunk_size: 1024 * 1024,
            upload_max_retries: 3,
            upload_retry_backoff_ms: 500,
            http_timeout_secs: None,
            keep_files: false,
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read a JSON config file. Keys not present keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PdfServerError> {
        let path = path.as_ref();
        let blob = std::fs::read(path).map_err(|e| PdfServerError::io(path, e))?;
        let config = Self::from_json_slice(&blob).map_err(|e| match e {
            PdfServerError::InvalidConfig(msg) => PdfServerError::InvalidConfig(format!(
                "failed parsing config {}: {}",
                path.display(),
                msg
            )),
            other => other,
        })?;
        Ok(config)
    }

    /// Parse a JSON config document. Keys not present keep their defaults.
    pub fn from_json_slice(blob: &[u8]) -> Result<Self, PdfServerError> {
        let config: ServerConfig = serde_json::from_slice(blob)
            .map_err(|e| PdfServerError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Submission wait as a `Duration`.
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }

    fn validate(&self) -> Result<(), PdfServerError> {
        if self.num_workers == 0 {
            return Err(PdfServerError::InvalidConfig(
                "NumWorkers must be ≥ 1".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PdfServerError::InvalidConfig(
                "QueueCapacity must be ≥ 1".into(),
            ));
        }
        if self.upload_chunk_size == 0 {
            return Err(PdfServerError::InvalidConfig(
                "UploadChunkSize must be ≥ 1".into(),
            ));
        }
        if self.max_file_size == 0 {
            return Err(PdfServerError::InvalidConfig(
                "MaxFileSize must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.config.num_workers = n;
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.config.queue_capacity = n;
        self
    }

    pub fn submit_timeout_secs(mut self, secs: u64) -> Self {
        self.config.submit_timeout_secs = secs;
        self
    }

    pub fn temp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.temp_path = path.into();
        self
    }

    pub fn render_command(mut self, cmd: impl Into<String>) -> Self {
        self.config.render_command = cmd.into();
        self
    }

    pub fn raster_command(mut self, cmd: impl Into<String>) -> Self {
        self.config.raster_command = cmd.into();
        self
    }

    pub fn raster_density(mut self, dpi: u32) -> Self {
        self.config.raster_density = dpi.max(1);
        self
    }

    pub fn upload_chunk_size(mut self, bytes: usize) -> Self {
        self.config.upload_chunk_size = bytes;
        self
    }

    pub fn upload_max_retries(mut self, n: u32) -> Self {
        self.config.upload_max_retries = n;
        self
    }

    pub fn upload_retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.upload_retry_backoff_ms = ms;
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = Some(secs);
        self
    }

    pub fn keep_files(mut self, v: bool) -> Self {
        self.config.keep_files = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, PdfServerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
