//! Running one task end to end: convert, report, upload, report again.
//!
//! Every failure stays inside the task. Conversion errors (and a panic in
//! the conversion stages) become a Phase-1 failure report; reporting errors
//! are logged because there is no one left to tell.

use crate::backends::Backends;
use crate::callback::CallbackReporter;
use crate::config::ServerConfig;
use crate::convert;
use crate::error::PdfServerError;
use crate::task::Task;
use crate::upload;
use crate::workdir::WorkingDirectory;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

/// Everything a worker needs, shared read-only between all workers.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub config: ServerConfig,
    pub backends: Backends,
    pub reporter: CallbackReporter,
}

impl WorkerContext {
    pub fn new(config: ServerConfig, backends: Backends) -> Self {
        let reporter = CallbackReporter::new(backends.http.clone());
        Self {
            config,
            backends,
            reporter,
        }
    }
}

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Conversion failed; a failure report was attempted.
    ConversionFailed,
    /// Conversion succeeded but Phase 1 did not yield usable destinations.
    ReportFailed,
    /// Uploads ran; Phase 2 was attempted with this aggregate.
    Uploaded { all_succeeded: bool },
    /// A stage after conversion panicked; no further callback was sent.
    Aborted,
}

/// Run `task` to completion. Never returns an error and never panics; the
/// working directory is removed (unless `KeepFiles`) however the task ends.
pub async fn process_task(task: &Task, ctx: &WorkerContext) -> TaskOutcome {
    let workdir = WorkingDirectory::new(&ctx.config.temp_path, task.id());
    run_guarded(
        task.id(),
        &workdir,
        ctx.config.keep_files,
        run_task(task, &workdir, ctx),
    )
    .await
}

/// Drive `body`, turning a panic into [`TaskOutcome::Aborted`], then clean up.
async fn run_guarded<F>(
    task_id: &str,
    workdir: &WorkingDirectory,
    keep_files: bool,
    body: F,
) -> TaskOutcome
where
    F: Future<Output = TaskOutcome>,
{
    let outcome = AssertUnwindSafe(body)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            error!(
                task_id,
                "Task panicked: {}",
                panic_message(panic.as_ref())
            );
            TaskOutcome::Aborted
        });

    if !keep_files {
        workdir.remove().await;
    }

    outcome
}

async fn run_task(task: &Task, workdir: &WorkingDirectory, ctx: &WorkerContext) -> TaskOutcome {
    let converted = AssertUnwindSafe(convert::convert(
        task,
        workdir,
        &ctx.config,
        &ctx.backends,
    ))
    .catch_unwind()
    .await
    .unwrap_or_else(|panic| {
        Err(PdfServerError::Internal(format!(
            "conversion panicked: {}",
            panic_message(panic.as_ref())
        )))
    });

    match converted {
        Err(err) => {
            warn!(task_id = task.id(), "Conversion failed: {}", err);
            if let Err(e) = ctx.reporter.report_failure(task, &err).await {
                error!(task_id = task.id(), "{}", e);
            }
            TaskOutcome::ConversionFailed
        }
        Ok(result) => match ctx.reporter.report_success(task, &result).await {
            Err(e) => {
                error!(task_id = task.id(), "{}", e);
                TaskOutcome::ReportFailed
            }
            Ok(destinations) => {
                let uploads = upload::upload_pages(
                    ctx.backends.uploader.clone(),
                    workdir,
                    &result,
                    &destinations,
                )
                .await;
                let all_succeeded = uploads.all_succeeded();
                if !all_succeeded {
                    warn!(
                        task_id = task.id(),
                        "Pages {:?} failed to upload",
                        uploads.failed_pages()
                    );
                }

                match ctx.reporter.report_uploaded(task, all_succeeded).await {
                    Ok(()) => info!(task_id = task.id(), "All done!"),
                    Err(e) => error!(task_id = task.id(), "Post-upload callback: {}", e),
                }
                TaskOutcome::Uploaded { all_succeeded }
            }
        },
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
