//! HTTP front door.
//!
//! The synchronous surface only reflects whether a request was well formed
//! and dispatched; pipeline outcomes are observable through the downstream
//! webhook or the artifact-serving endpoint.

use std::path::Path;
use std::sync::Arc;

use axum::extract::{Path as PathParams, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::info;
use url::Url;

use crate::config::AssayConfig;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::pool::WorkerPool;
use crate::session::{Session, SubmittedFile};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AssayConfig>,
    pub pipeline: Arc<Pipeline>,
    pub pool: WorkerPool,
}

/// Start serving on the configured port. Runs until the process exits.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("0.0.0.0:{}", state.config.port);
    let app = build_router(state);

    info!("starting assessment API server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/start_assessment", post(start_assessment))
        .route("/files/{session_id}/{file_name}", get(serve_artifact))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> &'static str {
    "IT assessment API is live"
}

#[derive(Debug, Deserialize)]
struct StartAssessmentRequest {
    session_id: Option<String>,
    email: Option<String>,
    goal: Option<String>,
    files: Option<Vec<SubmittedFile>>,
    next_action_webhook: Option<String>,
}

/// Validate, dispatch a worker, and answer immediately.
async fn start_assessment(
    State(state): State<AppState>,
    Json(request): Json<StartAssessmentRequest>,
) -> Response {
    let (session_id, email, files) = match (
        non_empty(request.session_id),
        non_empty(request.email),
        request.files.filter(|f| !f.is_empty()),
    ) {
        (Some(session_id), Some(email), Some(files)) => (session_id, email, files),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Missing required fields" })),
            )
                .into_response();
        }
    };

    let webhook = match request.next_action_webhook.as_deref() {
        Some(raw) if !raw.trim().is_empty() => match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "Invalid next_action_webhook URL" })),
                )
                    .into_response();
            }
        },
        _ => None,
    };

    let session = Session::new(
        session_id.clone(),
        email,
        request.goal.unwrap_or_else(|| "general".to_string()),
        files,
        webhook,
        &state.config.output_dir,
    );

    info!(session = %session_id, "dispatching assessment worker");
    let pipeline = state.pipeline.clone();
    // Fire and forget; outcomes surface via the webhook.
    let _worker = state.pool.dispatch(async move {
        pipeline.run(session).await;
    });

    (StatusCode::OK, Json(json!({ "status": "processing" }))).into_response()
}

/// Stream a previously generated artifact from a session's working
/// directory. Charts live one level down in `charts/`.
async fn serve_artifact(
    State(state): State<AppState>,
    PathParams((session_id, file_name)): PathParams<(String, String)>,
) -> Response {
    if !safe_component(&session_id) || !safe_component(&file_name) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid path" })),
        )
            .into_response();
    }

    let session_dir = state.config.output_dir.join(&session_id);
    let direct = session_dir.join(&file_name);
    let chart = session_dir.join("charts").join(&file_name);
    let path = if direct.is_file() {
        direct
    } else if chart.is_file() {
        chart
    } else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "File not found" })),
        )
            .into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path)
                .first_or_octet_stream()
                .to_string();
            ([(header::CONTENT_TYPE, mime)], bytes).into_response()
        }
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "File not found" })),
        )
            .into_response(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Reject anything that could traverse out of the session directory.
fn safe_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains('/')
        && !value.contains('\\')
        && Path::new(value).components().count() == 1
}
