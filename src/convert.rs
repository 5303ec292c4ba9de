//! The per-task conversion pipeline.
//!
//! Runs the stages in [`crate::pipeline`] strictly in order for one task:
//! fetch, validate, render, then the per-page format decision with its
//! raster fallback. The first failing stage aborts the task; nothing after
//! it runs.

use crate::backends::Backends;
use crate::config::ServerConfig;
use crate::error::PdfServerError;
use crate::pipeline::classify::{classify_page, PageKind};
use crate::pipeline::{document, fetch, raster, render, ConversionResult, PageFormat};
use crate::task::Task;
use crate::workdir::WorkingDirectory;
use std::time::Instant;
use tracing::{debug, info};

/// Convert the task's source into per-page files inside `workdir`.
///
/// # Errors
/// Any stage error: [`PdfServerError::Fetch`], [`PdfServerError::FileTooLarge`],
/// [`PdfServerError::InvalidDocument`], [`PdfServerError::TooManyPages`],
/// [`PdfServerError::PageRender`], or [`PdfServerError::Io`] for the
/// working directory itself.
pub async fn convert(
    task: &Task,
    workdir: &WorkingDirectory,
    config: &ServerConfig,
    backends: &Backends,
) -> Result<ConversionResult, PdfServerError> {
    let start = Instant::now();

    // ── Step 1: Fetch ────────────────────────────────────────────────────
    workdir.create().await?;
    let source = workdir.source_path();
    fetch::fetch_source(
        &backends.http,
        task.source_url(),
        &source,
        config.max_file_size,
    )
    .await?;

    // ── Step 2: Parse & validate ─────────────────────────────────────────
    let pages = document::validate(&source, config.max_pages).await?;

    // ── Step 3: Render ───────────────────────────────────────────────────
    let render_start = Instant::now();
    render::render_pages(backends.renderer.as_ref(), workdir, pages).await?;
    debug!(
        task_id = task.id(),
        "Rendered {} pages in {}ms",
        pages,
        render_start.elapsed().as_millis()
    );

    // ── Step 4: Per-page format decision ─────────────────────────────────
    let mut page_formats = Vec::with_capacity(pages);
    for page in 1..=pages {
        let svg_path = workdir.page_path(page, PageFormat::Svg);
        let format = match classify_page(&svg_path, page).await {
            PageKind::ImageOnly => {
                raster::rasterize_page(backends.rasterizer.as_ref(), workdir, page).await
            }
            PageKind::Vector => PageFormat::Svg,
        };
        page_formats.push(format);
    }

    let result = ConversionResult::new(page_formats);
    info!(
        task_id = task.id(),
        "Conversion complete: {} pages [{}] in {}ms",
        result.page_count(),
        result.formats_field(),
        start.elapsed().as_millis()
    );
    Ok(result)
}
