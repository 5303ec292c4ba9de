//! Page upload: concurrent fan-out to caller-supplied destinations.
//!
//! Every page gets its own tokio task, all spawned before any is awaited.
//! The `JoinSet` is then drained completely, so the stage returns only once
//! each page has resolved to success or failure. A page that fails (or whose
//! task panics) never cancels its siblings; the task-level outcome is the
//! conjunction of all pages.
//!
//! ## Resumable protocol
//!
//! [`ResumableUploader`] speaks the chunked resumable-upload dialect used by
//! object stores: each `PUT` carries `Content-Range: bytes a-b/total`, the
//! server answers `308` with a `Range: bytes=0-N` header while incomplete and
//! `200`/`201` once the object is whole. After a transport error or a 5xx the
//! client asks where the server stands (`Content-Range: bytes */total`) and
//! resumes from there, backing off `retry_backoff_ms * 2^(attempt-1)`.

use crate::error::UploadError;
use crate::pipeline::ConversionResult;
use crate::workdir::WorkingDirectory;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::StatusCode;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// Sends one page's bytes to a destination URL.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, page: usize, destination: &str, data: Bytes)
        -> Result<(), UploadError>;
}

/// Per-page results of the upload stage, in page order.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pages: Vec<Result<(), UploadError>>,
}

impl UploadOutcome {
    /// True iff every page uploaded. Vacuously true for zero pages.
    pub fn all_succeeded(&self) -> bool {
        self.pages.iter().all(|r| r.is_ok())
    }

    pub fn failed_pages(&self) -> Vec<usize> {
        self.pages
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_err())
            .map(|(i, _)| i + 1)
            .collect()
    }

    pub fn pages(&self) -> &[Result<(), UploadError>] {
        &self.pages
    }
}

/// Upload every page of `result` to the destination at the same index.
///
/// `destinations` must hold one URL per page; the caller checks this before
/// calling (extra URLs are ignored, missing ones leave pages failed).
pub async fn upload_pages(
    uploader: Arc<dyn Uploader>,
    workdir: &WorkingDirectory,
    result: &ConversionResult,
    destinations: &[String],
) -> UploadOutcome {
    let total = result.page_count();
    let mut set = JoinSet::new();

    for (idx, (format, destination)) in result
        .page_formats()
        .iter()
        .zip(destinations.iter())
        .enumerate()
    {
        let page = idx + 1;
        let path = workdir.page_path(page, *format);
        let destination = destination.clone();
        let uploader = Arc::clone(&uploader);
        set.spawn(async move {
            let res = upload_page(uploader.as_ref(), page, &path, &destination).await;
            (page, res)
        });
    }

    let mut slots: Vec<Option<Result<(), UploadError>>> = (0..total).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((page, res)) => slots[page - 1] = Some(res),
            Err(e) => error!("Upload task failed to complete: {}", e),
        }
    }

    let pages = slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.unwrap_or_else(|| {
                Err(UploadError::Transfer {
                    page: idx + 1,
                    detail: "upload did not complete".to_string(),
                })
            })
        })
        .collect();

    UploadOutcome { pages }
}

async fn upload_page(
    uploader: &dyn Uploader,
    page: usize,
    path: &Path,
    destination: &str,
) -> Result<(), UploadError> {
    info!("Uploading file {}", path.display());

    let data = tokio::fs::read(path).await.map(Bytes::from).map_err(|e| {
        warn!("Failed to open page {}: {}", page, e);
        UploadError::PageFileMissing {
            page,
            path: path.to_path_buf(),
        }
    })?;

    match uploader.upload(page, destination, data).await {
        Ok(()) => {
            info!("Page {} uploaded", page);
            Ok(())
        }
        Err(e) => {
            warn!("Page {} failed to upload: {}", page, e);
            Err(e)
        }
    }
}

// ── Resumable client ─────────────────────────────────────────────────────

/// Chunked resumable uploads over reqwest.
#[derive(Debug, Clone)]
pub struct ResumableUploader {
    client: reqwest::Client,
    chunk_size: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
}

/// Where the server stands after a request.
#[derive(Debug, PartialEq, Eq)]
enum Progress {
    Complete,
    /// Bytes `0..offset` are committed.
    Incomplete(Option<u64>),
}

#[derive(Debug)]
enum Failure {
    Transient(String),
    Fatal(String),
}

impl ResumableUploader {
    /// `client` should not follow redirects: `308` is a protocol status here.
    pub fn new(client: reqwest::Client, chunk_size: usize, max_retries: u32, retry_backoff_ms: u64) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
            max_retries,
            retry_backoff_ms,
        }
    }

    async fn put_chunk(
        &self,
        destination: &str,
        data: Bytes,
        offset: u64,
        total: u64,
    ) -> Result<Progress, Failure> {
        let content_range = if data.is_empty() {
            "bytes */0".to_string()
        } else {
            format!(
                "bytes {}-{}/{}",
                offset,
                offset + data.len() as u64 - 1,
                total
            )
        };

        let response = self
            .client
            .put(destination)
            .header(CONTENT_RANGE, content_range)
            .body(data)
            .send()
            .await
            .map_err(|e| Failure::Transient(e.to_string()))?;

        interpret(&response)
    }

    async fn query_status(&self, destination: &str, total: u64) -> Result<Progress, Failure> {
        let response = self
            .client
            .put(destination)
            .header(CONTENT_RANGE, format!("bytes */{}", total))
            .send()
            .await
            .map_err(|e| Failure::Transient(e.to_string()))?;

        interpret(&response)
    }
}

fn interpret(response: &reqwest::Response) -> Result<Progress, Failure> {
    let status = response.status();
    match status {
        StatusCode::OK | StatusCode::CREATED => Ok(Progress::Complete),
        StatusCode::PERMANENT_REDIRECT => {
            let committed = response
                .headers()
                .get(RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_committed);
            Ok(Progress::Incomplete(committed))
        }
        s if s.is_server_error()
            || s == StatusCode::TOO_MANY_REQUESTS
            || s == StatusCode::REQUEST_TIMEOUT =>
        {
            Err(Failure::Transient(format!("HTTP {}", s)))
        }
        s => Err(Failure::Fatal(format!("HTTP {}", s))),
    }
}

/// `base * 2^(attempt-1)`, saturating instead of overflowing.
fn backoff_ms(base: u64, attempt: u32) -> u64 {
    base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Parse a `Range: bytes=0-N` header into the next offset `N + 1`.
fn parse_committed(range: &str) -> Option<u64> {
    let (start, end) = range.trim().strip_prefix("bytes=")?.split_once('-')?;
    if start.trim() != "0" {
        return None;
    }
    end.trim().parse::<u64>().ok().map(|n| n + 1)
}

#[async_trait]
impl Uploader for ResumableUploader {
    async fn upload(&self, page: usize, destination: &str, data: Bytes) -> Result<(), UploadError> {
        let total = data.len() as u64;
        let mut offset: u64 = 0;
        let mut attempt: u32 = 0;

        loop {
            let step = if offset >= total && total > 0 {
                // every byte was sent but the server has not finalised
                Err(Failure::Transient("upload not finalised".to_string()))
            } else {
                let end = (offset + self.chunk_size as u64).min(total);
                let chunk = data.slice(offset as usize..end as usize);
                self.put_chunk(destination, chunk, offset, total)
                    .await
                    .map(|p| match p {
                        // no Range header: take the chunk as accepted
                        Progress::Incomplete(None) => Progress::Incomplete(Some(end)),
                        other => other,
                    })
            };

            let failure = match step {
                Ok(Progress::Complete) => return Ok(()),
                Ok(Progress::Incomplete(committed)) => {
                    let next = committed.unwrap_or(offset).min(total);
                    if next > offset {
                        offset = next;
                        debug!("Page {}: {}/{} bytes committed", page, offset, total);
                        continue;
                    }
                    // a 308 that commits nothing new counts as a failed attempt
                    format!("no progress past {}/{} bytes", offset, total)
                }
                Err(Failure::Fatal(detail)) => return Err(UploadError::Transfer { page, detail }),
                Err(Failure::Transient(detail)) => detail,
            };

            attempt += 1;
            if attempt > self.max_retries {
                return Err(UploadError::Transfer {
                    page,
                    detail: format!("gave up after {} retries: {}", self.max_retries, failure),
                });
            }

            let backoff = backoff_ms(self.retry_backoff_ms, attempt);
            warn!(
                "Page {}: retry {}/{} after {}ms ({})",
                page, attempt, self.max_retries, backoff, failure
            );
            sleep(Duration::from_millis(backoff)).await;

            match self.query_status(destination, total).await {
                Ok(Progress::Complete) => return Ok(()),
                Ok(Progress::Incomplete(committed)) => {
                    offset = committed.unwrap_or(0).min(total);
                }
                Err(Failure::Fatal(detail)) => return Err(UploadError::Transfer { page, detail }),
                Err(Failure::Transient(_)) => {}
            }
        }
    }
}
