//! Task-level integration tests: HTTP source and callbacks are served by
//! wiremock, rendering/rasterising/uploading by in-process fakes.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use bytes::Bytes;
use edgequake_pdfserver::{
    process_task, Admission, Backends, PageRenderer, PdfServer, Rasterizer, ServerConfig, Task,
    TaskOutcome, UploadError, Uploader, WorkerContext,
};
use lopdf::{dictionary, Document, Object};
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

const IMAGE_ONLY: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"><g><image href="data:"/></g></svg>"#;
const VECTOR: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"><path d="M0 0L1 1"/></svg>"#;

fn pdf_with_pages(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Writes page N with `markup[N-1]`, counting invocations. With
/// `crash_first` set, the first invocation panics instead.
struct ScriptedRenderer {
    markup: Vec<&'static str>,
    crash_first: bool,
    calls: AtomicUsize,
}

impl ScriptedRenderer {
    fn new(markup: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            markup,
            crash_first: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn crashing_once(markup: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            markup,
            crash_first: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PageRenderer for ScriptedRenderer {
    async fn render(&self, _pdf_path: &Path, output_pattern: &Path) {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.crash_first && call == 0 {
            panic!("renderer crashed");
        }
        let pattern = output_pattern.to_string_lossy().to_string();
        for (idx, markup) in self.markup.iter().enumerate() {
            let page_path = pattern.replace("%d", &(idx + 1).to_string());
            tokio::fs::write(page_path, markup).await.unwrap();
        }
    }
}

/// Produces a JPEG unless the page path is listed in `fail_on`.
struct FakeRasterizer {
    fail_on: Vec<&'static str>,
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(&self, svg_path: &Path, raster_path: &Path) {
        let name = svg_path.file_name().unwrap().to_string_lossy().to_string();
        if self.fail_on.iter().any(|f| *f == name) {
            return;
        }
        tokio::fs::write(raster_path, b"\xFF\xD8\xFF").await.unwrap();
    }
}

/// Records every upload; fails the pages listed in `fail_pages`.
#[derive(Default)]
struct RecordingUploader {
    fail_pages: Vec<usize>,
    seen: Mutex<Vec<(usize, String)>>,
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn upload(
        &self,
        page: usize,
        destination: &str,
        _data: Bytes,
    ) -> Result<(), UploadError> {
        self.seen
            .lock()
            .unwrap()
            .push((page, destination.to_string()));
        if self.fail_pages.contains(&page) {
            return Err(UploadError::Transfer {
                page,
                detail: "HTTP 403 Forbidden".into(),
            });
        }
        Ok(())
    }
}

struct Harness {
    server: MockServer,
    tmp: tempfile::TempDir,
    renderer: Arc<ScriptedRenderer>,
    uploader: Arc<RecordingUploader>,
    ctx: WorkerContext,
}

impl Harness {
    async fn new(
        markup: Vec<&'static str>,
        fail_raster: Vec<&'static str>,
        uploader: RecordingUploader,
        max_pages: usize,
    ) -> Self {
        let server = MockServer::start().await;
        let tmp = tempfile::tempdir().unwrap();
        let config = ServerConfig::builder()
            .temp_path(tmp.path())
            .max_pages(max_pages)
            .build()
            .unwrap();

        let renderer = ScriptedRenderer::new(markup);
        let uploader = Arc::new(uploader);
        let backends = Backends::from_config(&config)
            .unwrap()
            .with_renderer(renderer.clone())
            .with_rasterizer(Arc::new(FakeRasterizer {
                fail_on: fail_raster,
            }))
            .with_uploader(uploader.clone());

        Self {
            server,
            tmp,
            renderer,
            uploader,
            ctx: WorkerContext::new(config, backends),
        }
    }

    async fn serve_pdf(&self, pages: usize) {
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf_with_pages(pages)))
            .mount(&self.server)
            .await;
    }

    fn task(&self, id: &str) -> Task {
        Task::new(
            format!("{}/doc.pdf", self.server.uri()),
            id,
            format!("{}/callback", self.server.uri()),
        )
        .unwrap()
    }

    fn destinations(&self, n: usize) -> Vec<String> {
        (1..=n)
            .map(|p| format!("https://store.example/upload/{}", p))
            .collect()
    }

    async fn callback_bodies(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == "/callback")
            .map(|r| String::from_utf8_lossy(&r.body).to_string())
            .collect()
    }
}

// ── Conversion outcomes ──────────────────────────────────────────────────────

#[tokio::test]
async fn mixed_pages_report_formats_and_upload_all() {
    let h = Harness::new(
        vec![IMAGE_ONLY, IMAGE_ONLY, VECTOR],
        vec![],
        RecordingUploader::default(),
        400,
    )
    .await;
    h.serve_pdf(3).await;

    Mock::given(method("POST"))
        .and(path("/callback"))
        .and(body_string_contains("Pages=3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "upload_urls": h.destinations(3) })),
        )
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/callback"))
        .and(body_string_contains("Uploaded=true"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = process_task(&h.task("7"), &h.ctx).await;
    assert_eq!(outcome, TaskOutcome::Uploaded { all_succeeded: true });

    let bodies = h.callback_bodies().await;
    assert_eq!(bodies.len(), 2, "got: {bodies:?}");
    assert!(bodies[0].contains("ID=7"));
    assert!(bodies[0].contains("Success=true"));
    assert!(bodies[0].contains("PageFormats=jpg%2Cjpg%2Csvg"));
    assert!(bodies[1].contains("Success=true"));

    let mut seen = h.uploader.seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            (1, "https://store.example/upload/1".to_string()),
            (2, "https://store.example/upload/2".to_string()),
            (3, "https://store.example/upload/3".to_string()),
        ]
    );

    // Working directory removed once the task is done.
    assert!(!h.tmp.path().join("7").exists());
}

#[tokio::test]
async fn failed_rasterisation_keeps_svg() {
    let h = Harness::new(
        vec![IMAGE_ONLY, IMAGE_ONLY],
        vec!["page2.svg"],
        RecordingUploader::default(),
        400,
    )
    .await;
    h.serve_pdf(2).await;

    Mock::given(method("POST"))
        .and(path("/callback"))
        .and(body_string_contains("Pages=2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "upload_urls": h.destinations(2) })),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/callback"))
        .and(body_string_contains("Uploaded="))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.server)
        .await;

    let outcome = process_task(&h.task("8"), &h.ctx).await;
    assert_eq!(outcome, TaskOutcome::Uploaded { all_succeeded: true });

    let bodies = h.callback_bodies().await;
    assert!(bodies[0].contains("PageFormats=jpg%2Csvg"), "got: {}", bodies[0]);
}

#[tokio::test]
async fn unreachable_source_reports_failure_without_rendering() {
    let h = Harness::new(vec![VECTOR], vec![], RecordingUploader::default(), 400).await;

    Mock::given(method("GET"))
        .and(path("/doc.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/callback"))
        .and(body_string_contains("Success=false"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = process_task(&h.task("9"), &h.ctx).await;
    assert_eq!(outcome, TaskOutcome::ConversionFailed);
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 0);

    let bodies = h.callback_bodies().await;
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("ID=9"));
    assert!(bodies[0].contains("Error="));
    assert!(!bodies[0].contains("Pages="));
}

#[tokio::test]
async fn too_many_pages_reports_failure_once() {
    let h = Harness::new(
        vec![VECTOR, VECTOR, VECTOR],
        vec![],
        RecordingUploader::default(),
        2,
    )
    .await;
    h.serve_pdf(3).await;

    Mock::given(method("POST"))
        .and(path("/callback"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = process_task(&h.task("10"), &h.ctx).await;
    assert_eq!(outcome, TaskOutcome::ConversionFailed);
    assert_eq!(h.renderer.calls.load(Ordering::SeqCst), 0);

    let bodies = h.callback_bodies().await;
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("Success=false"));
    assert!(bodies[0].contains("too+many+pages"), "got: {}", bodies[0]);
    assert!(h.uploader.seen.lock().unwrap().is_empty());
}

// ── Upload outcomes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn destination_count_mismatch_skips_uploads() {
    let h = Harness::new(
        vec![VECTOR, VECTOR, VECTOR],
        vec![],
        RecordingUploader::default(),
        400,
    )
    .await;
    h.serve_pdf(3).await;

    Mock::given(method("POST"))
        .and(path("/callback"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "upload_urls": h.destinations(2) })),
        )
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = process_task(&h.task("11"), &h.ctx).await;
    assert_eq!(outcome, TaskOutcome::ReportFailed);
    assert!(h.uploader.seen.lock().unwrap().is_empty());
    assert_eq!(h.callback_bodies().await.len(), 1);
}

#[tokio::test]
async fn one_failed_upload_flips_phase_two() {
    let uploader = RecordingUploader {
        fail_pages: vec![2],
        ..Default::default()
    };
    let h = Harness::new(vec![VECTOR, VECTOR, VECTOR], vec![], uploader, 400).await;
    h.serve_pdf(3).await;

    Mock::given(method("POST"))
        .and(path("/callback"))
        .and(body_string_contains("Pages=3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "upload_urls": h.destinations(3) })),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/callback"))
        .and(body_string_contains("Uploaded=false"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;

    let outcome = process_task(&h.task("12"), &h.ctx).await;
    assert_eq!(
        outcome,
        TaskOutcome::Uploaded {
            all_succeeded: false
        }
    );

    // Siblings of the failed page still went out.
    assert_eq!(h.uploader.seen.lock().unwrap().len(), 3);

    let bodies = h.callback_bodies().await;
    assert!(bodies[1].contains("Success=false"));
    assert!(bodies[1].contains("Uploaded=false"));
}

// ── Crash containment ────────────────────────────────────────────────────────

#[tokio::test]
async fn crashing_renderer_is_reported_as_failure() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let config = ServerConfig::builder()
        .temp_path(tmp.path())
        .build()
        .unwrap();
    let backends = Backends::from_config(&config)
        .unwrap()
        .with_renderer(ScriptedRenderer::crashing_once(vec![VECTOR]))
        .with_uploader(Arc::new(RecordingUploader::default()));
    let ctx = WorkerContext::new(config, backends);

    Mock::given(method("GET"))
        .and(path("/doc.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf_with_pages(1)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/callback"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let task = Task::new(
        format!("{}/doc.pdf", server.uri()),
        "30",
        format!("{}/callback", server.uri()),
    )
    .unwrap();
    let outcome = process_task(&task, &ctx).await;
    assert_eq!(outcome, TaskOutcome::ConversionFailed);

    let bodies: Vec<String> = server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == "/callback")
        .map(|r| String::from_utf8_lossy(&r.body).to_string())
        .collect();
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("ID=30"));
    assert!(bodies[0].contains("Success=false"));
    assert!(bodies[0].contains("Error=Internal"), "got: {}", bodies[0]);
    assert!(!tmp.path().join("30").exists());
}

#[tokio::test]
async fn single_worker_survives_crashing_task() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let config = ServerConfig::builder()
        .temp_path(tmp.path())
        .num_workers(1)
        .build()
        .unwrap();

    let uploader = Arc::new(RecordingUploader::default());
    let backends = Backends::from_config(&config)
        .unwrap()
        .with_renderer(ScriptedRenderer::crashing_once(vec![VECTOR]))
        .with_uploader(uploader.clone());

    Mock::given(method("GET"))
        .and(path("/doc.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf_with_pages(1)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/callback"))
        .and(body_string_contains("Pages=1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "upload_urls": ["https://store.example/upload/1"] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/callback"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let pdf_server = PdfServer::start(config, backends);
    for id in ["31", "32"] {
        let task = Task::new(
            format!("{}/doc.pdf", server.uri()),
            id,
            format!("{}/callback", server.uri()),
        )
        .unwrap();
        assert_eq!(pdf_server.queue.submit(task).await, Admission::Accepted);
    }

    let mut done = false;
    for _ in 0..200 {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.iter().any(|r| {
            let body = String::from_utf8_lossy(&r.body);
            body.contains("ID=32") && body.contains("Uploaded=true")
        }) {
            done = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(done, "second task did not complete");

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.iter().any(|r| {
        let body = String::from_utf8_lossy(&r.body);
        body.contains("ID=31") && body.contains("Success=false")
    }));
    assert_eq!(uploader.seen.lock().unwrap().len(), 1);

    let PdfServer { queue, pool } = pdf_server;
    drop(queue);
    tokio::time::timeout(Duration::from_secs(5), pool.join())
        .await
        .unwrap();
}

// ── Queue + pool ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn pool_runs_submitted_task_to_completion() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let config = ServerConfig::builder()
        .temp_path(tmp.path())
        .num_workers(2)
        .queue_capacity(4)
        .build()
        .unwrap();

    let uploader = Arc::new(RecordingUploader::default());
    let backends = Backends::from_config(&config)
        .unwrap()
        .with_renderer(ScriptedRenderer::new(vec![VECTOR]))
        .with_rasterizer(Arc::new(FakeRasterizer { fail_on: vec![] }))
        .with_uploader(uploader.clone());

    Mock::given(method("GET"))
        .and(path("/doc.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(pdf_with_pages(1)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/callback"))
        .and(body_string_contains("Pages=1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "upload_urls": ["https://store.example/upload/1"] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/callback"))
        .and(body_string_contains("Uploaded=true"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let pdf_server = PdfServer::start(config, backends);
    assert_eq!(pdf_server.pool.size(), 2);

    let task = Task::new(
        format!("{}/doc.pdf", server.uri()),
        "21",
        format!("{}/callback", server.uri()),
    )
    .unwrap();
    assert_eq!(pdf_server.queue.submit(task).await, Admission::Accepted);

    // Wait for Phase 2 to land.
    let mut done = false;
    for _ in 0..200 {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests
            .iter()
            .any(|r| String::from_utf8_lossy(&r.body).contains("Uploaded=true"))
        {
            done = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    assert!(done, "task did not complete");
    assert_eq!(uploader.seen.lock().unwrap().len(), 1);

    // Closing the queue lets the workers drain and exit.
    let PdfServer { queue, pool } = pdf_server;
    drop(queue);
    tokio::time::timeout(Duration::from_secs(5), pool.join())
        .await
        .unwrap();
}
