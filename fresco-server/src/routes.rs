use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use fresco_core::{GenerationJob, JobError, JobResponse, Orchestrator, ASPECT_RATIOS};
use serde::Serialize;
use serde_json::{json, Value};

// Application state containing the orchestrator that owns the loaded engine.
#[derive(Clone)]
pub struct AppState(pub Arc<Orchestrator>);

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/aspect-ratios", get(aspect_ratios_handler))
        .route("/generate", post(generate_handler))
        .with_state(AppState(orchestrator))
}

async fn root_handler() -> Json<Value> {
    Json(json!({
        "name": "fresco",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "generate": "POST /generate",
            "health": "GET /health",
            "aspect_ratios": "GET /aspect-ratios",
        },
    }))
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let gpu_memory = match state.0.memory().snapshot() {
        Some(stats) => json!({
            "allocated_gb": stats.allocated_gb(),
            "reserved_gb": stats.reserved_gb(),
            "max_allocated_gb": stats.peak_allocated_gb(),
        }),
        None => json!("unavailable"),
    };
    Json(json!({ "status": "healthy", "gpu_memory": gpu_memory }))
}

#[derive(Serialize)]
struct AspectRatioEntry {
    width: u32,
    height: u32,
    resolution: String,
}

async fn aspect_ratios_handler() -> Json<BTreeMap<&'static str, AspectRatioEntry>> {
    let catalog = ASPECT_RATIOS
        .iter()
        .map(|(ratio, res)| {
            let entry = AspectRatioEntry {
                width: res.width,
                height: res.height,
                resolution: format!("{}x{}", res.width, res.height),
            };
            (*ratio, entry)
        })
        .collect();
    Json(catalog)
}

async fn generate_handler(
    State(state): State<AppState>,
    body: Result<Json<GenerationJob>, JsonRejection>,
) -> impl IntoResponse {
    let Json(job) = match body {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e.body_text(), "invalid job input");
            let response = JobResponse::failure(format!("invalid job input: {}", e.body_text()));
            return (StatusCode::BAD_REQUEST, Json(response));
        }
    };
    let result = state.0.run(job).await;
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => status_for(e),
    };
    (status, Json(JobResponse::from(result)))
}

fn status_for(err: &JobError) -> StatusCode {
    match err {
        JobError::Validation(_) => StatusCode::BAD_REQUEST,
        JobError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        JobError::Engine { .. } | JobError::Publish { .. } | JobError::Aborted(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
