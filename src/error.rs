//! Error types for the edgequake-pdfserver library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`PdfServerError`] — **Task-fatal**: the task cannot proceed (source
//!   unreachable, too large, not a PDF, a page failed to render) or the
//!   server cannot start (bad configuration). Pipeline variants are turned
//!   into a Phase-1 failure report; reporting variants are only logged.
//!
//! * [`UploadError`] — **Page-scoped**: one page failed to reach its upload
//!   destination. Sibling pages keep uploading and the failure is folded
//!   into the task's aggregate upload outcome.

use std::path::PathBuf;
use thiserror::Error;

/// All task-fatal and startup errors returned by the library.
#[derive(Debug, Error)]
pub enum PdfServerError {
    // ── Submission errors ─────────────────────────────────────────────────
    /// A submitted task was missing a field or carried a malformed id.
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The source could not be fetched (transport error or non-2xx status).
    #[error("Failed to fetch file '{url}': {reason}")]
    Fetch { url: String, reason: String },

    /// The source is larger than `MaxFileSize`.
    #[error("File was too big: '{url}' exceeds {limit} bytes")]
    FileTooLarge { url: String, limit: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// The downloaded file could not be opened as a PDF.
    #[error("Failed to load PDF '{path}': {detail}")]
    InvalidDocument { path: PathBuf, detail: String },

    /// The document has more pages than `MaxPages`.
    #[error("PDF has too many pages ({pages}, limit {limit})")]
    TooManyPages { pages: usize, limit: usize },

    /// The renderer did not produce the expected file for a page.
    #[error("Page {page} failed to convert")]
    PageRender { page: usize },

    // ── Reporting errors ──────────────────────────────────────────────────
    /// A callback POST failed or its response could not be understood.
    #[error("Failed to deliver callback to '{url}': {reason}")]
    CallbackDelivery { url: String, reason: String },

    /// The Phase-1 response carried the wrong number of upload URLs.
    #[error("Got an invalid amount of upload URLs: expected {expected}, got {got}")]
    UploadDestinationMismatch { expected: usize, got: usize },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or file validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// A filesystem operation inside the working directory failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP listener could not be bound or stopped with an error.
    #[error("Failed to listen on '{addr}': {source}")]
    Listen {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (a panicking stage, a failed blocking task).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdfServerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PdfServerError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal error for a single page upload.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// The page file vanished (or was never written) before upload.
    #[error("Page {page}: file '{path}' could not be opened")]
    PageFileMissing { page: usize, path: PathBuf },

    /// The destination rejected the upload or the transfer broke down.
    #[error("Page {page}: upload failed: {detail}")]
    Transfer { page: usize, detail: String },
}

impl UploadError {
    /// The 1-indexed page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            UploadError::PageFileMissing { page, .. } | UploadError::Transfer { page, .. } => *page,
        }
    }
}
