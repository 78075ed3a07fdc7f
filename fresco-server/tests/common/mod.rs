#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use fresco_core::{
    EngineOutput, InferenceEngine, InferenceRequest, MemoryStats, ObjectStore, Orchestrator,
    Publisher, StorageConfig, StorageSettings,
};
use http_body_util::BodyExt;
use image::DynamicImage;
use serde_json::Value;
use tower::ServiceExt;

/// Engine returning a 1x1 image, or failing every call when `broken`.
#[derive(Default)]
pub struct StubEngine {
    pub broken: bool,
    pub stats: Option<MemoryStats>,
    pub calls: AtomicUsize,
    pub reclaims: AtomicUsize,
}

impl InferenceEngine for StubEngine {
    fn infer(&self, _request: &InferenceRequest) -> anyhow::Result<EngineOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            anyhow::bail!("device lost");
        }
        Ok(EngineOutput::single(DynamicImage::new_rgb8(1, 1)))
    }

    fn memory_stats(&self) -> Option<MemoryStats> {
        self.stats
    }

    fn reclaim_memory(&self) -> anyhow::Result<()> {
        self.reclaims.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Remembers every uploaded key.
#[derive(Default)]
pub struct StubStore {
    pub keys: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStore for StubStore {
    async fn put_object(
        &self,
        _bucket: &str,
        key: &str,
        _body: Vec<u8>,
        _content_type: &str,
    ) -> anyhow::Result<()> {
        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

pub fn storage_config() -> StorageConfig {
    StorageConfig {
        endpoint_url: "https://acct.r2.cloudflarestorage.com".into(),
        access_key_id: "key".into(),
        secret_access_key: "secret".into(),
        bucket_name: "images".into(),
        public_url: None,
    }
}

pub fn orchestrator(engine: Arc<StubEngine>) -> Arc<Orchestrator> {
    let publisher = Publisher::new(storage_config(), Arc::new(StubStore::default()));
    Arc::new(Orchestrator::new(engine, publisher))
}

pub fn unconfigured_orchestrator(engine: Arc<StubEngine>) -> Arc<Orchestrator> {
    let publisher = Publisher::from_settings(&StorageSettings::default());
    Arc::new(Orchestrator::new(engine, publisher))
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: &Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_raw(app: Router, uri: &str, body: &'static str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
