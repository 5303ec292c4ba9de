//! Two-phase callback reporting.
//!
//! Phase 1 tells the caller how conversion went and, on success, asks for
//! one upload destination per page in the response body. Phase 2 reports
//! whether every page reached its destination. Both are form-encoded POSTs
//! to the task's callback URL.
//!
//! ```text
//! Phase 1 ok:    ID=7&Success=true&Pages=3&PageFormats=jpg,jpg,svg
//!                ← {"upload_urls": ["…", "…", "…"]}
//! Phase 1 fail:  ID=7&Success=false&Error=PDF+has+too+many+pages+…
//! Phase 2:       ID=7&Success=true&Uploaded=true
//! ```

use crate::error::PdfServerError;
use crate::pipeline::ConversionResult;
use crate::task::Task;
use serde::Deserialize;
use tracing::{debug, info};

/// Expected body of a successful Phase-1 response.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadDestinations {
    pub upload_urls: Vec<String>,
}

/// Posts task reports to callback URLs.
#[derive(Debug, Clone)]
pub struct CallbackReporter {
    client: reqwest::Client,
}

impl CallbackReporter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Phase 1 after a failed conversion. The response body is ignored.
    pub async fn report_failure(
        &self,
        task: &Task,
        error: &PdfServerError,
    ) -> Result<(), PdfServerError> {
        let fields = [
            ("ID", task.id().to_string()),
            ("Success", "false".to_string()),
            ("Error", error.to_string()),
        ];
        self.post(task, &fields).await?;
        Ok(())
    }

    /// Phase 1 after a successful conversion.
    ///
    /// Returns the upload destinations, exactly one per page.
    ///
    /// # Errors
    /// * [`PdfServerError::CallbackDelivery`] — POST failed or the body is not
    ///   the expected JSON
    /// * [`PdfServerError::UploadDestinationMismatch`] — wrong number of URLs
    pub async fn report_success(
        &self,
        task: &Task,
        result: &ConversionResult,
    ) -> Result<Vec<String>, PdfServerError> {
        let fields = [
            ("ID", task.id().to_string()),
            ("Success", "true".to_string()),
            ("Pages", result.page_count().to_string()),
            ("PageFormats", result.formats_field()),
        ];
        let body = self.post(task, &fields).await?;

        let response: UploadDestinations =
            serde_json::from_slice(&body).map_err(|e| PdfServerError::CallbackDelivery {
                url: task.callback_url().to_string(),
                reason: format!("Failed to parse response: {}", e),
            })?;

        if response.upload_urls.len() != result.page_count() {
            return Err(PdfServerError::UploadDestinationMismatch {
                expected: result.page_count(),
                got: response.upload_urls.len(),
            });
        }

        debug!(
            task_id = task.id(),
            "Received {} upload URLs",
            response.upload_urls.len()
        );
        Ok(response.upload_urls)
    }

    /// Phase 2: the aggregate upload outcome, mirrored in `Success` and `Uploaded`.
    pub async fn report_uploaded(
        &self,
        task: &Task,
        all_succeeded: bool,
    ) -> Result<(), PdfServerError> {
        let flag = all_succeeded.to_string();
        let fields = [
            ("ID", task.id().to_string()),
            ("Success", flag.clone()),
            ("Uploaded", flag),
        ];
        self.post(task, &fields).await?;
        Ok(())
    }

    async fn post(
        &self,
        task: &Task,
        fields: &[(&str, String)],
    ) -> Result<Vec<u8>, PdfServerError> {
        let url = task.callback_url();
        let delivery_error = |reason: String| PdfServerError::CallbackDelivery {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(|e| delivery_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(delivery_error(format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| delivery_error(format!("Failed to read response: {}", e)))?;

        info!(task_id = task.id(), "Callback delivered to {}", url);
        Ok(body.to_vec())
    }
}
