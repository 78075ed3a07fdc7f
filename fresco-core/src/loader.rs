use std::future::Future;
use std::path::PathBuf;

use anyhow::Result;
use hf_hub::api::tokio::{Api, ApiBuilder};

use crate::{DeviceMap, InferenceEngine, ModelLocation, ModelVariant, Precision};

/// Capabilities negotiated while loading, before any job is accepted.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub precision: Precision,
    pub device_map: DeviceMap,
    /// Token for gated hub repositories.
    pub hf_token: Option<String>,
}

impl LoadOptions {
    pub(crate) fn hub_api(&self, cache_dir: Option<PathBuf>) -> Result<Api> {
        let mut builder = ApiBuilder::new();
        if let Some(token) = &self.hf_token {
            builder = builder.with_token(Some(token.clone()));
        }
        if let Some(cache_dir) = cache_dir {
            builder = builder.with_cache_dir(cache_dir);
        }
        Ok(builder.build()?)
    }
}

pub trait Loader {
    type Engine: InferenceEngine;

    fn load(
        variant: ModelVariant,
        location: ModelLocation,
        options: LoadOptions,
    ) -> impl Future<Output = Result<Self::Engine>>
    where
        Self: Sized;
}
