//! HTTP front-door behavior: validation, dispatch, and artifact serving.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use url::Url;

use assay::config::AssayConfig;
use assay::pipeline::Pipeline;
use assay::pool::WorkerPool;
use assay::report::ReportClient;
use assay::retry::RetryPolicy;
use assay::server::{build_router, AppState};
use assay::templates::TemplateStore;

use common::{spawn, spawn_downstream, spawn_renderer, FakeStore, FixedMarket};

async fn serve_app() -> (Url, Arc<AssayConfig>, tempfile::TempDir) {
    let renderer_calls = Arc::new(Mutex::new(Vec::new()));
    let downstream_calls = Arc::new(Mutex::new(Vec::new()));
    let renderer_url = spawn_renderer(renderer_calls).await;
    let downstream_url = spawn_downstream(downstream_calls).await;

    let output = tempfile::tempdir().expect("output dir");
    let config = Arc::new(AssayConfig {
        output_dir: output.path().to_path_buf(),
        docx_service_url: renderer_url.clone(),
        market_gap_webhook: downstream_url,
        ..AssayConfig::default()
    });
    let templates = Arc::new(TemplateStore::load(None).expect("templates"));
    let report = ReportClient::new(renderer_url, Duration::from_secs(5))
        .expect("report client")
        .with_retry(RetryPolicy::immediate(2))
        .with_warmup_deadline(Duration::ZERO);
    let pipeline = Arc::new(
        Pipeline::from_config(config.clone(), templates)
            .expect("pipeline")
            .with_store(Arc::new(FakeStore::new()))
            .with_market_lookup(Arc::new(FixedMarket))
            .with_report_client(report),
    );

    let router = build_router(AppState {
        config: config.clone(),
        pipeline,
        pool: WorkerPool::new(2),
    });
    let url = spawn(router).await;
    (url, config, output)
}

#[tokio::test]
async fn liveness_route_answers() {
    let (base, _config, _output) = serve_app().await;
    let body = reqwest::get(base).await.unwrap().text().await.unwrap();
    assert!(body.contains("live"));
}

#[tokio::test]
async fn missing_required_fields_answer_400_without_dispatch() {
    let (base, _config, _output) = serve_app().await;
    let client = reqwest::Client::new();

    for payload in [
        json!({}),
        json!({ "session_id": "s1" }),
        json!({ "session_id": "s1", "email": "a@b.c", "files": [] }),
        json!({ "session_id": "  ", "email": "a@b.c",
                "files": [{ "file_name": "x.csv", "file_url": "/x.csv" }] }),
    ] {
        let response = client
            .post(base.join("start_assessment").unwrap())
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "payload {payload} not rejected");
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Missing required fields");
    }
}

#[tokio::test]
async fn well_formed_requests_dispatch_and_answer_processing() {
    let (base, config, _output) = serve_app().await;
    let sources = tempfile::tempdir().unwrap();
    let inventory = sources.path().join("servers.csv");
    std::fs::write(&inventory, "Device ID,Device Name\nD-1,web01\n").unwrap();

    let client = reqwest::Client::new();
    let response = client
        .post(base.join("start_assessment").unwrap())
        .json(&json!({
            "session_id": "api-run",
            "email": "ops@example.com",
            "files": [{
                "file_name": "servers.csv",
                "file_url": inventory.display().to_string(),
            }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "processing");

    // The worker runs in the background; poll for its gap sheet, then
    // fetch it through the file-serving route.
    let gap_name = "HWGapAnalysis_api-run.csv";
    let gap_path = config.output_dir.join("api-run").join(gap_name);
    for _ in 0..100 {
        if gap_path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(gap_path.exists(), "pipeline never wrote the gap sheet");

    let served = client
        .get(base.join(&format!("files/api-run/{gap_name}")).unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(served.status(), 200);
    let text = served.text().await.unwrap();
    assert!(text.contains("Device ID"));
}

#[tokio::test]
async fn artifact_route_rejects_traversal_and_misses() {
    let (base, _config, _output) = serve_app().await;
    let client = reqwest::Client::new();

    let missing = client
        .get(base.join("files/no-session/nothing.csv").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    let traversal = client
        .get(base.join("files/api-run/..%2F..%2Fetc").unwrap())
        .send()
        .await
        .unwrap();
    assert_ne!(traversal.status(), 200);
}
