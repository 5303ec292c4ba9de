//! # edgequake-pdfserver
//!
//! Convert remote PDF documents into per-page SVG (or JPEG) files, upload
//! every page to caller-provided destinations and report back by callback.
//!
//! ## Pipeline Overview
//!
//! ```text
//! GET /convert ─▶ AdmissionQueue ─▶ WorkerPool (N workers)
//!                 (bounded, 10 s)        │
//!                                        ├─ 1. Fetch     stream source, size-capped
//!                                        ├─ 2. Validate  parse PDF, page limit
//!                                        ├─ 3. Render    pdf2svg → page{N}.svg
//!                                        ├─ 4. Classify  image-only pages → JPEG
//!                                        ├─ 5. Phase 1   callback, receive upload URLs
//!                                        ├─ 6. Upload    one task per page, joined
//!                                        └─ 7. Phase 2   callback with upload outcome
//! ```
//!
//! A full queue rejects new work instead of growing without bound, and each
//! worker finishes a task (uploads included) before pulling the next one.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfserver::{serve, Backends, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder().num_workers(4).build()?;
//!     let backends = Backends::from_config(&config)?;
//!     serve("127.0.0.1:8091", config, backends).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfserver` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backends;
pub mod callback;
pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod queue;
pub mod server;
pub mod task;
pub mod upload;
pub mod workdir;
pub mod worker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backends::Backends;
pub use callback::{CallbackReporter, UploadDestinations};
pub use config::{ServerConfig, ServerConfigBuilder, DEFAULT_CONFIG_FILE};
pub use error::{PdfServerError, UploadError};
pub use pipeline::raster::Rasterizer;
pub use pipeline::render::PageRenderer;
pub use pipeline::{ConversionResult, PageFormat};
pub use pool::WorkerPool;
pub use queue::{Admission, AdmissionQueue, TaskReceiver};
pub use server::{router, serve, PdfServer};
pub use task::Task;
pub use upload::{UploadOutcome, Uploader};
pub use workdir::WorkingDirectory;
pub use worker::{process_task, TaskOutcome, WorkerContext};
