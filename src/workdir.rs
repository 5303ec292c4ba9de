//! Per-task working directory layout.
//!
//! ```text
//! <temp_path>/<task id>/
//!   pdf.pdf        downloaded source
//!   page1.svg      rendered pages, 1-indexed
//!   page1.jpg      raster variant of an image-only page
//! ```

use crate::error::PdfServerError;
use crate::pipeline::PageFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A task-id-scoped directory. Exclusively owned by the task that made it.
#[derive(Debug, Clone)]
pub struct WorkingDirectory {
    root: PathBuf,
}

impl WorkingDirectory {
    /// Path of the directory for `task_id` under `temp_path` (not created).
    pub fn new(temp_path: &Path, task_id: &str) -> Self {
        Self {
            root: temp_path.join(task_id),
        }
    }

    /// Create the directory (and parents) with owner-only permissions.
    pub async fn create(&self) -> Result<(), PdfServerError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| PdfServerError::io(&self.root, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.root, std::fs::Permissions::from_mode(0o700))
                .await
                .map_err(|e| PdfServerError::io(&self.root, e))?;
        }

        debug!("Created working directory {}", self.root.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Where the downloaded source is stored.
    pub fn source_path(&self) -> PathBuf {
        self.root.join("pdf.pdf")
    }

    /// File for a 1-indexed page in the given format.
    pub fn page_path(&self, page: usize, format: PageFormat) -> PathBuf {
        self.root
            .join(format!("page{}.{}", page, format.extension()))
    }

    /// Output pattern handed to the renderer; `%d` is the page number.
    pub fn render_pattern(&self) -> PathBuf {
        self.root.join("page%d.svg")
    }

    /// Remove the directory and its content. Failures are logged, not returned.
    pub async fn remove(&self) {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => debug!("Removed working directory {}", self.root.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove working directory {}: {}",
                self.root.display(),
                e
            ),
        }
    }
}
