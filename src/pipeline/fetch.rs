//! Source download: stream a remote PDF into the working directory.
//!
//! The body is copied chunk by chunk and never allowed past `max_file_size`.
//! A source that is exactly at the cap is accepted; a single byte beyond it
//! fails the task rather than leaving a silently truncated PDF behind.

use crate::error::PdfServerError;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Download `url` into `dest`, returning the number of bytes written.
///
/// # Errors
/// * [`PdfServerError::Fetch`] — transport failure or a non-2xx status
/// * [`PdfServerError::FileTooLarge`] — the source is larger than `max_file_size`
/// * [`PdfServerError::Io`] — `dest` could not be written
pub async fn fetch_source(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    max_file_size: u64,
) -> Result<u64, PdfServerError> {
    info!("Fetching URL: {}", url);

    let mut response = client.get(url).send().await.map_err(|e| PdfServerError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if !response.status().is_success() {
        return Err(PdfServerError::Fetch {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    if let Some(declared) = response.content_length() {
        if declared > max_file_size {
            warn!("File was too big: declared {} bytes", declared);
            return Err(PdfServerError::FileTooLarge {
                url: url.to_string(),
                limit: max_file_size,
            });
        }
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| PdfServerError::io(dest, e))?;

    let mut written: u64 = 0;
    while let Some(chunk) = response.chunk().await.map_err(|e| PdfServerError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    })? {
        let remaining = max_file_size - written;
        if chunk.len() as u64 > remaining {
            warn!("File was too big: more than {} bytes", max_file_size);
            return Err(PdfServerError::FileTooLarge {
                url: url.to_string(),
                limit: max_file_size,
            });
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| PdfServerError::io(dest, e))?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| PdfServerError::io(dest, e))?;

    info!("Download finished");
    debug!("Wrote {} bytes to {}", written, dest.display());
    Ok(written)
}
