use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fresco_core::{
    EngineOutput, InferenceEngine, InferenceRequest, MemoryStats, ObjectStore, Orchestrator,
    Publisher, StorageConfig,
};
use image::DynamicImage;

/// Everything the collaborators saw, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Infer { seed: Option<u64>, width: u32, height: u32 },
    Put { key: String },
    Reclaim,
}

pub type Journal = Arc<Mutex<Vec<Event>>>;

/// Engine returning a fixed 1x1 image, optionally failing on the n-th call.
pub struct StubEngine {
    journal: Journal,
    fail_on_call: Option<usize>,
    delay: Duration,
    requests: Mutex<Vec<InferenceRequest>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl StubEngine {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail_on_call: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Every inference blocks its thread for `delay`.
    pub fn slow(journal: Journal, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(journal)
        }
    }

    /// Highest number of inferences ever running at the same time.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn failing_on(journal: Journal, call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::new(journal)
        }
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl InferenceEngine for StubEngine {
    fn infer(&self, request: &InferenceRequest) -> anyhow::Result<EngineOutput> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        self.journal.lock().unwrap().push(Event::Infer {
            seed: request.seed,
            width: request.width,
            height: request.height,
        });

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on_call == Some(call) {
            anyhow::bail!("CUDA out of memory");
        }
        Ok(EngineOutput::single(DynamicImage::new_rgb8(1, 1)))
    }

    fn memory_stats(&self) -> Option<MemoryStats> {
        Some(MemoryStats {
            allocated: 1 << 30,
            reserved: 2 << 30,
            peak_allocated: 3 << 30,
        })
    }

    fn reclaim_memory(&self) -> anyhow::Result<()> {
        self.journal.lock().unwrap().push(Event::Reclaim);
        Ok(())
    }
}

/// Store that accepts everything, optionally failing on the n-th upload.
pub struct StubStore {
    journal: Journal,
    fail_on_call: Option<usize>,
    calls: Mutex<usize>,
}

impl StubStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            fail_on_call: None,
            calls: Mutex::new(0),
        }
    }

    pub fn failing_on(journal: Journal, call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::new(journal)
        }
    }
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
        let call = {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            *calls - 1
        };
        self.journal.lock().unwrap().push(Event::Put {
            key: key.to_string(),
        });

        if self.fail_on_call == Some(call) {
            anyhow::bail!("upload timed out");
        }
        Ok(())
    }
}

pub fn storage_config() -> StorageConfig {
    StorageConfig {
        endpoint_url: "https://acct.r2.cloudflarestorage.com".into(),
        access_key_id: "key".into(),
        secret_access_key: "secret".into(),
        bucket_name: "images".into(),
        public_url: Some("https://cdn.example.com".into()),
    }
}

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn orchestrator(engine: Arc<StubEngine>, store: StubStore) -> Orchestrator {
    Orchestrator::new(engine, Publisher::new(storage_config(), Arc::new(store)))
}

pub fn count(journal: &Journal, matches: fn(&Event) -> bool) -> usize {
    journal.lock().unwrap().iter().filter(|e| matches(e)).count()
}
