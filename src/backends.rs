//! External collaborators used by the pipeline.
//!
//! The core never shells out or opens sockets directly for rendering,
//! rasterising or uploading; it goes through the trait objects held here.
//! [`Backends::from_config`] wires the production implementations, and each
//! one can be swapped (tests substitute in-process fakes).

use crate::config::ServerConfig;
use crate::error::PdfServerError;
use crate::pipeline::raster::{ImageMagickRasterizer, Rasterizer};
use crate::pipeline::render::{PageRenderer, Pdf2SvgRenderer};
use crate::upload::{ResumableUploader, Uploader};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The set of collaborators a worker needs.
#[derive(Clone)]
pub struct Backends {
    /// Client for source fetches and callbacks.
    pub http: reqwest::Client,
    pub renderer: Arc<dyn PageRenderer>,
    pub rasterizer: Arc<dyn Rasterizer>,
    pub uploader: Arc<dyn Uploader>,
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends")
            .field("http", &self.http)
            .field("renderer", &"<dyn PageRenderer>")
            .field("rasterizer", &"<dyn Rasterizer>")
            .field("uploader", &"<dyn Uploader>")
            .finish()
    }
}

impl Backends {
    /// Production collaborators: pdf2svg, ImageMagick, resumable uploads.
    pub fn from_config(config: &ServerConfig) -> Result<Self, PdfServerError> {
        let timeout = config.http_timeout_secs.map(Duration::from_secs);

        let mut http = reqwest::Client::builder();
        if let Some(t) = timeout {
            http = http.timeout(t);
        }
        let http = http
            .build()
            .map_err(|e| PdfServerError::Internal(format!("HTTP client: {}", e)))?;

        let mut upload_client =
            reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
        if let Some(t) = timeout {
            upload_client = upload_client.timeout(t);
        }
        let upload_client = upload_client
            .build()
            .map_err(|e| PdfServerError::Internal(format!("upload HTTP client: {}", e)))?;

        Ok(Self {
            http,
            renderer: Arc::new(Pdf2SvgRenderer::new(config.render_command.clone())),
            rasterizer: Arc::new(ImageMagickRasterizer::new(
                config.raster_command.clone(),
                config.raster_density,
            )),
            uploader: Arc::new(ResumableUploader::new(
                upload_client,
                config.upload_chunk_size,
                config.upload_max_retries,
                config.upload_retry_backoff_ms,
            )),
        })
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = uploader;
        self
    }
}
