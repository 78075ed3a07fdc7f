use image::DynamicImage;
use serde::Serialize;

/// Everything a single inference pass needs, already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance_scale: f64,
    /// `None` leaves the engine's random state untouched.
    pub seed: Option<u64>,
}

/// Raw result of one engine invocation. Engines may return several images
/// and scratch state; callers keep only the first image.
#[derive(Debug, Default)]
pub struct EngineOutput {
    pub images: Vec<DynamicImage>,
}

impl EngineOutput {
    pub fn single(image: DynamicImage) -> Self {
        Self {
            images: vec![image],
        }
    }
}

/// Accelerator memory counters in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub allocated: u64,
    pub reserved: u64,
    pub peak_allocated: u64,
}

const GIB: f64 = (1u64 << 30) as f64;

impl MemoryStats {
    pub fn allocated_gb(&self) -> f64 {
        self.allocated as f64 / GIB
    }

    pub fn reserved_gb(&self) -> f64 {
        self.reserved as f64 / GIB
    }

    pub fn peak_allocated_gb(&self) -> f64 {
        self.peak_allocated as f64 / GIB
    }
}

/// A loaded, ready-to-infer model. Shared process-wide behind an `Arc` and
/// never mutated by the orchestrator; implementations are not expected to be
/// re-entrant, callers serialize jobs.
pub trait InferenceEngine: Send + Sync {
    /// Runs one inference-only pass. No gradients, no parameter updates.
    fn infer(&self, request: &InferenceRequest) -> anyhow::Result<EngineOutput>;

    /// `None` when there is no accelerator to report on.
    fn memory_stats(&self) -> Option<MemoryStats>;

    /// Releases cached and unreferenced accelerator memory.
    fn reclaim_memory(&self) -> anyhow::Result<()>;
}
