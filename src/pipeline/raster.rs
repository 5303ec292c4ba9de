//! Raster fallback for image-only pages.
//!
//! An image-only SVG is converted to JPEG next to it. As with rendering, the
//! rasteriser's exit status is ignored: the page becomes `jpg` only if the
//! JPEG file exists afterwards, otherwise it stays `svg`. A page never ends
//! up without a usable file.

use crate::pipeline::render::run_tool;
use crate::pipeline::PageFormat;
use crate::workdir::WorkingDirectory;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use tracing::{info, warn};

/// Converts one SVG file into a raster image file.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Rasterise `svg_path` into `raster_path`. Failures are not reported
    /// here; the caller checks for `raster_path`.
    async fn rasterize(&self, svg_path: &Path, raster_path: &Path);
}

/// Rasterises via ImageMagick: `convert -density <dpi> <svg> <jpg>`.
#[derive(Debug, Clone)]
pub struct ImageMagickRasterizer {
    program: String,
    density: u32,
}

impl ImageMagickRasterizer {
    pub fn new(program: impl Into<String>, density: u32) -> Self {
        Self {
            program: program.into(),
            density,
        }
    }
}

impl Default for ImageMagickRasterizer {
    fn default() -> Self {
        Self::new("convert", 80)
    }
}

#[async_trait]
impl Rasterizer for ImageMagickRasterizer {
    async fn rasterize(&self, svg_path: &Path, raster_path: &Path) {
        let args: [OsString; 4] = [
            "-density".into(),
            self.density.to_string().into(),
            svg_path.into(),
            raster_path.into(),
        ];
        run_tool(&self.program, args).await;
    }
}

/// Rasterise an image-only page and return the format to upload it as.
pub async fn rasterize_page(
    rasterizer: &dyn Rasterizer,
    workdir: &WorkingDirectory,
    page: usize,
) -> PageFormat {
    let svg_path = workdir.page_path(page, PageFormat::Svg);
    let raster_path = workdir.page_path(page, PageFormat::Jpg);

    info!("Page {} only has images; converting to raster", page);
    rasterizer.rasterize(&svg_path, &raster_path).await;

    if tokio::fs::try_exists(&raster_path).await.unwrap_or(false) {
        PageFormat::Jpg
    } else {
        warn!("Rasterizing page {} failed, uploading SVG", page);
        PageFormat::Svg
    }
}
