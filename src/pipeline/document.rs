//! Document validation: open the downloaded PDF and read its page count.
//!
//! Parsing runs in `spawn_blocking`; lopdf reads and decodes the whole file
//! synchronously, which would otherwise stall a runtime worker thread for
//! the duration of a large document.

use crate::error::PdfServerError;
use std::path::Path;
use tracing::{info, warn};

/// Count the pages of the PDF at `pdf_path`.
///
/// # Errors
/// [`PdfServerError::InvalidDocument`] when the file is not a parseable PDF.
pub async fn page_count(pdf_path: &Path) -> Result<usize, PdfServerError> {
    let path = pdf_path.to_path_buf();

    tokio::task::spawn_blocking(move || page_count_blocking(&path))
        .await
        .map_err(|e| PdfServerError::Internal(format!("Document task panicked: {}", e)))?
}

fn page_count_blocking(pdf_path: &Path) -> Result<usize, PdfServerError> {
    let document = lopdf::Document::load(pdf_path).map_err(|e| {
        warn!("Failed to load PDF {}: {}", pdf_path.display(), e);
        PdfServerError::InvalidDocument {
            path: pdf_path.to_path_buf(),
            detail: e.to_string(),
        }
    })?;

    let pages = document.get_pages().len();
    info!("PDF loaded: {} pages", pages);
    Ok(pages)
}

/// Read the page count and enforce `max_pages`.
///
/// # Errors
/// * [`PdfServerError::InvalidDocument`] — unparseable file
/// * [`PdfServerError::TooManyPages`] — more than `max_pages` pages
pub async fn validate(pdf_path: &Path, max_pages: usize) -> Result<usize, PdfServerError> {
    let pages = page_count(pdf_path).await?;
    if pages > max_pages {
        return Err(PdfServerError::TooManyPages {
            pages,
            limit: max_pages,
        });
    }
    Ok(pages)
}
