//! HTTP front door: `GET /convert?url=…&id=…&callback=…`.
//!
//! The handler only validates parameters and submits to the admission
//! queue; the answer says whether the task was taken, never how it went.
//! Outcomes arrive later through the callback URL.

use crate::backends::Backends;
use crate::config::ServerConfig;
use crate::error::PdfServerError;
use crate::pool::WorkerPool;
use crate::queue::{Admission, AdmissionQueue};
use crate::task::Task;
use crate::worker::WorkerContext;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
struct ConvertParams {
    url: Option<String>,
    id: Option<String>,
    callback: Option<String>,
}

async fn convert_handler(
    State(queue): State<AdmissionQueue>,
    Query(params): Query<ConvertParams>,
) -> Response {
    let task = match Task::new(
        params.url.unwrap_or_default(),
        params.id.unwrap_or_default(),
        params.callback.unwrap_or_default(),
    ) {
        Ok(task) => task,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "Type": "invalid_request", "Error": e.to_string() })),
            )
                .into_response();
        }
    };

    let task_id = task.id().to_string();
    match queue.submit(task).await {
        Admission::Accepted => {
            info!(task_id = %task_id, "Task accepted");
            Json(json!({ "Processing": true, "Async": true })).into_response()
        }
        Admission::Rejected => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "Processing": false,
                "Error": "processing rejected, try again later",
            })),
        )
            .into_response(),
    }
}

/// Routes bound to an admission queue.
pub fn router(queue: AdmissionQueue) -> Router {
    Router::new()
        .route("/convert", get(convert_handler))
        .with_state(queue)
}

/// A started pool together with the queue feeding it.
#[derive(Debug)]
pub struct PdfServer {
    pub queue: AdmissionQueue,
    pub pool: WorkerPool,
}

impl PdfServer {
    /// Create the queue and start the worker pool.
    pub fn start(config: ServerConfig, backends: Backends) -> Self {
        let (queue, receiver) = AdmissionQueue::from_config(&config);
        let ctx = Arc::new(WorkerContext::new(config, backends));
        let pool = WorkerPool::start(receiver, ctx);
        Self { queue, pool }
    }
}

/// Start the workers and serve HTTP on `listen_to` until the listener fails.
pub async fn serve(
    listen_to: &str,
    config: ServerConfig,
    backends: Backends,
) -> Result<(), PdfServerError> {
    let server = PdfServer::start(config, backends);

    let listener = tokio::net::TcpListener::bind(listen_to)
        .await
        .map_err(|e| PdfServerError::Listen {
            addr: listen_to.to_string(),
            source: e,
        })?;

    info!("Listening on: {}", listen_to);
    axum::serve(listener, router(server.queue.clone()))
        .await
        .map_err(|e| PdfServerError::Listen {
            addr: listen_to.to_string(),
            source: e,
        })
}
