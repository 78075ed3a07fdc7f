use std::sync::Arc;

use crate::engine::{InferenceEngine, MemoryStats};

/// Reports and reclaims the engine's accelerator memory. Never fails: a
/// missing accelerator shows up as `None` and reclamation errors are logged.
#[derive(Clone)]
pub struct MemoryGovernor {
    engine: Arc<dyn InferenceEngine>,
}

impl MemoryGovernor {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self { engine }
    }

    pub fn snapshot(&self) -> Option<MemoryStats> {
        self.engine.memory_stats()
    }

    pub fn reclaim(&self) {
        if let Err(e) = self.engine.reclaim_memory() {
            tracing::warn!(error = %e, "memory reclamation failed");
        }
    }

    pub fn log_usage(&self, stage: &str) {
        match self.snapshot() {
            Some(stats) => tracing::info!(
                stage,
                allocated = %format!("{:.2}GB", stats.allocated_gb()),
                reserved = %format!("{:.2}GB", stats.reserved_gb()),
                peak = %format!("{:.2}GB", stats.peak_allocated_gb()),
                "accelerator memory"
            ),
            None => tracing::debug!(stage, "accelerator memory unavailable"),
        }
    }
}
