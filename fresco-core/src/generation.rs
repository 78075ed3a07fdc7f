use std::sync::Arc;

use image::DynamicImage;

use crate::engine::{EngineOutput, InferenceEngine, InferenceRequest};
use crate::error::GenerationError;
use crate::job::Prompt;
use crate::resolution::Resolution;

/// Sampling parameters shared by every variant of a job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling<'a> {
    pub steps: u32,
    pub guidance_scale: f64,
    pub negative_prompt: &'a str,
    pub resolution: Resolution,
}

/// One engine invocation per call, yielding exactly one image.
#[derive(Clone)]
pub struct GenerationStep {
    engine: Arc<dyn InferenceEngine>,
}

impl GenerationStep {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self { engine }
    }

    pub fn request(prompt: &Prompt, seed: Option<u64>, sampling: &Sampling<'_>) -> InferenceRequest {
        InferenceRequest {
            prompt: prompt.to_text(),
            negative_prompt: sampling.negative_prompt.to_string(),
            width: sampling.resolution.width,
            height: sampling.resolution.height,
            steps: sampling.steps,
            guidance_scale: sampling.guidance_scale,
            seed,
        }
    }

    /// Runs the engine on the blocking pool. Engine errors and panics both
    /// come back as `GenerationError`; no image is returned in that case.
    pub async fn generate(&self, request: InferenceRequest) -> Result<DynamicImage, GenerationError> {
        let engine = Arc::clone(&self.engine);
        let output = tokio::task::spawn_blocking(move || engine.infer(&request))
            .await
            .map_err(|e| GenerationError(format!("engine task aborted: {e}")))?
            .map_err(|e| GenerationError(format!("{e:#}")))?;

        first_image(output)
    }
}

/// Keeps the first image and drops everything else the engine returned.
fn first_image(output: EngineOutput) -> Result<DynamicImage, GenerationError> {
    let mut images = output.images.into_iter();
    let image = images
        .next()
        .ok_or_else(|| GenerationError("engine returned no image".to_string()))?;
    drop(images);
    Ok(image)
}
