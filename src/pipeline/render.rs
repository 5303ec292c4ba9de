//! Page rendering: PDF → one SVG file per page.
//!
//! The renderer is an external program. Its exit status is logged but never
//! trusted: after it returns, every expected `page{N}.svg` must exist on
//! disk, and the first missing one aborts the task.

use crate::error::PdfServerError;
use crate::pipeline::PageFormat;
use crate::workdir::WorkingDirectory;
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, info, warn};

/// Produces `page%d.svg` files from a PDF.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render every page of `pdf_path`, writing to `output_pattern` where
    /// `%d` is replaced by the 1-indexed page number.
    ///
    /// Failures are not reported here; the caller checks the output files.
    async fn render(&self, pdf_path: &Path, output_pattern: &Path);
}

/// Renders via `pdf2svg <pdf> <pattern> all`.
#[derive(Debug, Clone)]
pub struct Pdf2SvgRenderer {
    program: String,
}

impl Pdf2SvgRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Pdf2SvgRenderer {
    fn default() -> Self {
        Self::new("pdf2svg")
    }
}

#[async_trait]
impl PageRenderer for Pdf2SvgRenderer {
    async fn render(&self, pdf_path: &Path, output_pattern: &Path) {
        run_tool(
            &self.program,
            [
                pdf_path.as_os_str(),
                output_pattern.as_os_str(),
                OsStr::new("all"),
            ],
        )
        .await;
    }
}

/// Run the renderer and verify that pages `1..=pages` were produced.
///
/// # Errors
/// [`PdfServerError::PageRender`] for the first page whose SVG is missing.
pub async fn render_pages(
    renderer: &dyn PageRenderer,
    workdir: &WorkingDirectory,
    pages: usize,
) -> Result<(), PdfServerError> {
    info!("Converting...");
    renderer
        .render(&workdir.source_path(), &workdir.render_pattern())
        .await;

    for page in 1..=pages {
        let page_path = workdir.page_path(page, PageFormat::Svg);
        if !tokio::fs::try_exists(&page_path).await.unwrap_or(false) {
            warn!("Page {} missing at {}", page, page_path.display());
            return Err(PdfServerError::PageRender { page });
        }
    }

    debug!("All {} pages rendered", pages);
    Ok(())
}

/// Run an external program to completion. Exit status and spawn failures
/// are logged only; callers judge success by the files left behind.
pub(crate) async fn run_tool<I, S>(program: &str, args: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = tokio::process::Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(out) => {
            if !out.stdout.is_empty() {
                debug!("{}: {}", program, String::from_utf8_lossy(&out.stdout).trim_end());
            }
            if !out.stderr.is_empty() {
                debug!("{} stderr: {}", program, String::from_utf8_lossy(&out.stderr).trim_end());
            }
            if !out.status.success() {
                warn!("{} exited with {}", program, out.status);
            }
        }
        Err(e) => warn!("Failed to run {}: {}", program, e),
    }
}
