//! Shared fixtures: stub collaborator services and fake adapters.
//!
//! External collaborators are stubbed as real axum servers on ephemeral
//! ports; the pipeline talks to them over actual HTTP.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use url::Url;

use assay::enrich::{MarketLookup, MarketSuggestion};
use assay::error::Result;
use assay::storage::ArtifactStore;

/// Requests captured by a stub service, in arrival order.
pub type Captured = Arc<Mutex<Vec<Value>>>;

pub async fn spawn(router: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub serve");
    });
    Url::parse(&format!("http://{addr}/")).expect("stub url")
}

/// Renderer stub answering the warm-up probe and the generate call.
pub async fn spawn_renderer(captured: Captured) -> Url {
    async fn generate(State(captured): State<Captured>, Json(body): Json<Value>) -> Json<Value> {
        captured.lock().unwrap().push(body);
        Json(json!({
            "docx_url": "/files/out/report.docx",
            "pptx_url": "https://cdn.example.com/report.pptx",
        }))
    }

    let router = Router::new()
        .route("/", get(|| async { "ready" }))
        .route("/generate_assessment", post(generate))
        .with_state(captured);
    spawn(router).await
}

/// Webhook / market-gap stub capturing every POST it receives. The
/// completion webhook lands on `/` and the chain on `/start_market_gap`.
pub async fn spawn_downstream(captured: Captured) -> Url {
    async fn capture(State(captured): State<Captured>, Json(body): Json<Value>) -> Json<Value> {
        captured.lock().unwrap().push(body);
        Json(json!({ "ok": true }))
    }

    let router = Router::new()
        .route("/", post(capture))
        .route("/start_market_gap", post(capture))
        .with_state(captured);
    spawn(router).await
}

/// Store returning deterministic fake links without any network.
pub struct FakeStore {
    pub uploads: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ArtifactStore for FakeStore {
    async fn upload(&self, _local_path: &Path, name: &str, _folder: &str) -> Result<String> {
        self.uploads.lock().unwrap().push(name.to_string());
        Ok(format!("https://drive.example.com/{name}"))
    }
}

/// Market lookup with fixed output so enrichment is reproducible.
pub struct FixedMarket;

#[async_trait]
impl MarketLookup for FixedMarket {
    async fn lookup(&self, _display_name: &str) -> MarketSuggestion {
        MarketSuggestion {
            recommended_model: "ProLiant DL380".to_string(),
            vendor: "HPE".to_string(),
            estimated_price_usd: 5200,
            availability: "In Stock".to_string(),
            lead_time_days: 10,
        }
    }
}
