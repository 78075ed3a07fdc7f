mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::http::StatusCode;
use common::{
    body_json, get, orchestrator, post_json, post_raw, unconfigured_orchestrator, StubEngine,
};
use fresco_core::MemoryStats;
use fresco_server::routes::router;
use serde_json::json;

// ---------------------------------------------------------------------------
// Informational routes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn root_lists_endpoints() {
    let app = router(orchestrator(Arc::default()));
    let response = get(app, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "running");
    assert!(json["version"].is_string());
    assert_eq!(json["endpoints"]["generate"], "POST /generate");
}

#[tokio::test]
async fn health_reports_memory_when_available() {
    let engine = Arc::new(StubEngine {
        stats: Some(MemoryStats {
            allocated: 1 << 30,
            reserved: 2 << 30,
            peak_allocated: 3 << 30,
        }),
        ..StubEngine::default()
    });
    let response = get(router(orchestrator(engine)), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["gpu_memory"]["allocated_gb"], 1.0);
    assert_eq!(json["gpu_memory"]["reserved_gb"], 2.0);
    assert_eq!(json["gpu_memory"]["max_allocated_gb"], 3.0);
}

#[tokio::test]
async fn health_without_accelerator() {
    let response = get(router(orchestrator(Arc::default())), "/health").await;
    let json = body_json(response).await;
    assert_eq!(json, json!({ "status": "healthy", "gpu_memory": "unavailable" }));
}

#[tokio::test]
async fn aspect_ratios_lists_the_catalog() {
    let response = get(router(orchestrator(Arc::default())), "/aspect-ratios").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json.as_object().unwrap().len(), 11);
    assert_eq!(
        json["16:9"],
        json!({ "width": 1344, "height": 768, "resolution": "1344x768" })
    );
    assert_eq!(json["1:1"]["resolution"], "1024x1024");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let response = get(router(orchestrator(Arc::default())), "/v1/images").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// POST /generate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generate_returns_published_images() {
    let engine = Arc::new(StubEngine::default());
    let app = router(orchestrator(engine.clone()));
    let body = json!({
        "prompt": { "short_description": "a lighthouse at dusk" },
        "seed": 40,
        "steps": 20,
        "variants": 2,
        "aspect_ratio": "9:16"
    });

    let response = post_json(app, "/generate", &body).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let images = json["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["seed"], 40);
    assert_eq!(images[1]["seed"], 41);
    let filename = images[0]["filename"].as_str().unwrap();
    assert_eq!(
        images[0]["url"],
        format!("https://acct.r2.cloudflarestorage.com/images/{filename}")
    );
    assert_eq!(
        json["parameters"],
        json!({ "steps": 20, "guidance_scale": 5.0, "aspect_ratio": "9:16", "variants": 2 })
    );
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalid_job_is_a_bad_request() {
    let engine = Arc::new(StubEngine::default());
    let app = router(orchestrator(engine.clone()));

    let response = post_json(app, "/generate", &json!({ "prompt": "a cat", "steps": 500 })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "steps must be between 1 and 100" })
    );
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    assert_eq!(engine.reclaims.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_storage_is_unavailable() {
    let engine = Arc::new(StubEngine::default());
    let app = router(unconfigured_orchestrator(engine.clone()));

    let response = post_json(app, "/generate", &json!({ "prompt": "a cat" })).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    let error = json["error"].as_str().unwrap();
    assert!(error.starts_with("storage is not configured"), "{error}");
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn engine_failure_is_a_server_error() {
    let engine = Arc::new(StubEngine {
        broken: true,
        ..StubEngine::default()
    });
    let app = router(orchestrator(engine.clone()));

    let response = post_json(app, "/generate", &json!({ "prompt": "a cat", "variants": 3 })).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "variant 0 generation failed: device lost" })
    );
    // the first failure stops the job, then one final reclaim
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.reclaims.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn mistyped_job_gets_an_error_body() {
    let engine = Arc::new(StubEngine::default());
    let app = router(orchestrator(engine.clone()));

    let response = post_json(app, "/generate", &json!({ "prompt": "a cat", "steps": "many" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    let error = json["error"].as_str().unwrap();
    assert!(error.starts_with("invalid job input: "), "{error}");
    assert_eq!(json.as_object().unwrap().len(), 1);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn body_without_content_type_gets_an_error_body() {
    let app = router(orchestrator(Arc::default()));

    let response = post_raw(app, "/generate", r#"{"prompt": "a cat"}"#).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid job input: "));
}
