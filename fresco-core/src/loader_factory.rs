use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};

use crate::flux::{FluxLoader, FluxVariant};
use crate::{resolve_model_location, InferenceEngine, LoadOptions, Loader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVariant {
    Flux(FluxVariant),
}

impl ModelVariant {
    /// Detect model variant from model name
    pub fn from_name(model_name: &str) -> Option<Self> {
        let name_upper = model_name.to_uppercase();

        if name_upper.contains("FLUX") {
            Some(ModelVariant::Flux(if name_upper.contains("DEV") {
                FluxVariant::Dev
            } else {
                FluxVariant::Schnell
            }))
        } else {
            None
        }
    }
}

/// Resolves where `model_name` lives, detects its variant and loads it.
/// Runs once at startup; the returned handle is shared by every job.
pub async fn load_engine(
    model_name: &str,
    cache_dir: Option<&Path>,
    options: LoadOptions,
) -> Result<Arc<dyn InferenceEngine>> {
    let variant = ModelVariant::from_name(model_name)
        .ok_or_else(|| anyhow!("Unsupported model: {}", model_name))?;
    let location = resolve_model_location(model_name, cache_dir);

    tracing::info!(
        model = model_name,
        ?variant,
        ?location,
        precision = ?options.precision,
        "loading model"
    );
    let started = Instant::now();

    let engine: Arc<dyn InferenceEngine> = match variant {
        ModelVariant::Flux(_) => Arc::new(FluxLoader::load(variant, location, options).await?),
    };

    tracing::info!(
        load_time = %format!("{:.2}s", started.elapsed().as_secs_f64()),
        "model loaded"
    );
    Ok(engine)
}
