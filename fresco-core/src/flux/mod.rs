use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Error, Result};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Module, VarBuilder};
use candle_transformers::models::{
    clip::text_model::{Activation, ClipTextConfig, ClipTextTransformer},
    flux::{self, autoencoder::AutoEncoder, model::Flux},
    t5::{self, T5EncoderModel},
};
use hf_hub::api::tokio::Api;
use image::DynamicImage;
use tokenizers::Tokenizer;

use crate::{
    select_best_device, EngineOutput, InferenceEngine, InferenceRequest, LoadOptions, Loader,
    MemoryStats, ModelLocation, ModelVariant,
};

const T5_MAX_TOKENS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluxVariant {
    Schnell,
    Dev,
}

impl FluxVariant {
    fn transformer_file(self) -> &'static str {
        match self {
            Self::Schnell => "flux1-schnell.safetensors",
            Self::Dev => "flux1-dev.safetensors",
        }
    }
}

pub struct FluxEngine {
    variant: FluxVariant,
    device: Device,
    dtype: DType,
    // The T5 encoder needs `&mut self` to run.
    t5_model: Mutex<T5EncoderModel>,
    t5_tokenizer: Tokenizer,
    clip_model: ClipTextTransformer,
    clip_tokenizer: Tokenizer,
    autoencoder: AutoEncoder,
    flux_model: Flux,
}

impl FluxEngine {
    fn encode_t5(&self, prompt: &str) -> Result<Tensor> {
        let mut tokens = self
            .t5_tokenizer
            .encode(prompt, true)
            .map_err(Error::msg)?
            .get_ids()
            .to_vec();
        tokens.resize(T5_MAX_TOKENS, 0);
        let input_ids = Tensor::new(&*tokens, &self.device)?.unsqueeze(0)?;
        let mut model = self
            .t5_model
            .lock()
            .map_err(|_| anyhow!("T5 encoder lock poisoned"))?;
        Ok(model.forward(&input_ids)?)
    }

    fn encode_clip(&self, prompt: &str) -> Result<Tensor> {
        let tokens = self
            .clip_tokenizer
            .encode(prompt, true)
            .map_err(Error::msg)?
            .get_ids()
            .to_vec();
        let input_ids = Tensor::new(&*tokens, &self.device)?.unsqueeze(0)?;
        Ok(self.clip_model.forward(&input_ids)?)
    }
}

impl InferenceEngine for FluxEngine {
    fn infer(&self, request: &InferenceRequest) -> Result<EngineOutput> {
        let width = request.width as usize;
        let height = request.height as usize;

        if let Some(seed) = request.seed {
            self.device.set_seed(seed)?;
        }
        if !request.negative_prompt.is_empty() {
            tracing::debug!("flux does not use negative prompts, ignoring it");
        }

        let noise_img = flux::sampling::get_noise(1, height, width, &self.device)?
            .to_dtype(self.dtype)?;
        let t5_emb = self.encode_t5(&request.prompt)?;
        let clip_emb = self.encode_clip(&request.prompt)?;

        let state = flux::sampling::State::new(&t5_emb, &clip_emb, &noise_img)?;
        let steps = request.steps as usize;
        let timesteps = match self.variant {
            FluxVariant::Dev => {
                let image_seq_len = state.img.dim(1)?;
                flux::sampling::get_schedule(steps, Some((image_seq_len, 0.5, 1.15)))
            }
            FluxVariant::Schnell => flux::sampling::get_schedule(steps, None),
        };

        let latent_img = flux::sampling::denoise(
            &self.flux_model,
            &state.img,
            &state.img_ids,
            &state.txt,
            &state.txt_ids,
            &state.vec,
            &timesteps,
            request.guidance_scale,
        )?;
        let unpacked = flux::sampling::unpack(&latent_img, height, width)?;
        tracing::debug!("generated latent image");

        let decoded = self.autoencoder.decode(&unpacked)?;
        tracing::debug!("decoded image");

        let img = ((decoded.clamp(-1f32, 1f32)? + 1.0)? * 127.5)?.to_dtype(DType::U8)?;
        let image = tensor_to_image(&img.i(0)?)?;
        Ok(EngineOutput::single(image))
    }

    fn memory_stats(&self) -> Option<MemoryStats> {
        None
    }

    /// Intermediate tensors are freed when `infer` returns; this waits for
    /// the device queue to drain so the freed buffers are really released.
    fn reclaim_memory(&self) -> Result<()> {
        self.device.synchronize()?;
        Ok(())
    }
}

/// Converts a tensor with shape (3, height, width) into an RGB image.
fn tensor_to_image(img: &Tensor) -> Result<DynamicImage> {
    let (channels, height, width) = img.dims3()?;
    if channels != 3 {
        bail!("expected an image tensor with 3 channels, got {channels}");
    }
    let img = img.permute((1, 2, 0))?.flatten_all()?;
    let pixels = img.to_vec1::<u8>()?;
    let buffer = image::ImageBuffer::from_raw(width as u32, height as u32, pixels)
        .ok_or_else(|| anyhow!("error converting tensor to image buffer"))?;
    Ok(DynamicImage::ImageRgb8(buffer))
}

/// Fetches `filename` either from a local model directory or the hub.
async fn model_file(location: &ModelLocation, api: &Api, filename: &str) -> Result<PathBuf> {
    match location {
        ModelLocation::Local(dir) => {
            let path = dir.join(filename);
            if !path.exists() {
                bail!("{} not found in {}", filename, dir.display());
            }
            Ok(path)
        }
        ModelLocation::Remote { model_id, .. } => Ok(api.model(model_id.clone()).get(filename).await?),
    }
}

fn var_builder(file: PathBuf, dtype: DType, device: &Device) -> Result<VarBuilder<'static>> {
    // Safety: the weight files are not modified while mapped.
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[file], dtype, device)? };
    Ok(vb)
}

pub struct FluxLoader;

impl Loader for FluxLoader {
    type Engine = FluxEngine;

    async fn load(
        variant: ModelVariant,
        location: ModelLocation,
        options: LoadOptions,
    ) -> Result<Self::Engine> {
        let ModelVariant::Flux(variant) = variant;

        let device = select_best_device(options.device_map).context("failed to set up device")?;
        let dtype = options.precision.dtype_for(&device);

        let cache_dir = match &location {
            ModelLocation::Remote { cache_dir, .. } => cache_dir.clone(),
            ModelLocation::Local(_) => None,
        };
        let api = options.hub_api(cache_dir).context("failed to create hub client")?;

        // --- T5 encoder and tokenizer ---
        let t5_repo = api.repo(hf_hub::Repo::with_revision(
            "google/t5-v1_1-xxl".to_string(),
            hf_hub::RepoType::Model,
            "refs/pr/2".to_string(),
        ));
        let t5_model_file = t5_repo
            .get("model.safetensors")
            .await
            .context("failed to load T5 model file")?;
        let t5_vb = var_builder(t5_model_file, dtype, &device)
            .context("failed to build T5 var builder")?;
        let config_filename = t5_repo
            .get("config.json")
            .await
            .context("failed to get T5 config")?;
        let config_str =
            std::fs::read_to_string(&config_filename).context("failed to read T5 config")?;
        let t5_config: t5::Config =
            serde_json::from_str(&config_str).context("failed to parse T5 config")?;
        let t5_model =
            T5EncoderModel::load(t5_vb, &t5_config).context("failed to load T5 model")?;
        let t5_tokenizer_filename = api
            .model("lmz/mt5-tokenizers".to_string())
            .get("t5-v1_1-xxl.tokenizer.json")
            .await
            .context("failed to get T5 tokenizer")?;
        let t5_tokenizer = Tokenizer::from_file(t5_tokenizer_filename)
            .map_err(Error::msg)
            .context("failed to load T5 tokenizer")?;

        // --- CLIP encoder and tokenizer ---
        let clip_repo = api.repo(hf_hub::Repo::model(
            "openai/clip-vit-large-patch14".to_string(),
        ));
        let clip_model_file = clip_repo
            .get("model.safetensors")
            .await
            .context("failed to get CLIP model file")?;
        let clip_vb = var_builder(clip_model_file, dtype, &device)
            .context("failed to build CLIP var builder")?;
        let clip_config = ClipTextConfig {
            vocab_size: 49408,
            projection_dim: 768,
            activation: Activation::QuickGelu,
            intermediate_size: 3072,
            embed_dim: 768,
            max_position_embeddings: 77,
            pad_with: None,
            num_hidden_layers: 12,
            num_attention_heads: 12,
        };
        let clip_model = ClipTextTransformer::new(clip_vb.pp("text_model"), &clip_config)
            .context("failed to load CLIP model")?;
        let clip_tokenizer_filename = clip_repo
            .get("tokenizer.json")
            .await
            .context("failed to get CLIP tokenizer")?;
        let clip_tokenizer = Tokenizer::from_file(clip_tokenizer_filename)
            .map_err(Error::msg)
            .context("failed to load CLIP tokenizer")?;

        // --- Autoencoder and transformer, from the resolved location ---
        let autoencoder_file = model_file(&location, &api, "ae.safetensors")
            .await
            .context("failed to get autoencoder model file")?;
        let autoencoder_vb = var_builder(autoencoder_file, dtype, &device)
            .context("failed to build autoencoder var builder")?;
        let autoencoder_config = match variant {
            FluxVariant::Schnell => flux::autoencoder::Config::schnell(),
            FluxVariant::Dev => flux::autoencoder::Config::dev(),
        };
        let autoencoder = AutoEncoder::new(&autoencoder_config, autoencoder_vb)
            .context("failed to load autoencoder")?;

        let flux_file = model_file(&location, &api, variant.transformer_file())
            .await
            .context("failed to get flux model file")?;
        let flux_vb =
            var_builder(flux_file, dtype, &device).context("failed to build flux var builder")?;
        let flux_config = match variant {
            FluxVariant::Schnell => flux::model::Config::schnell(),
            FluxVariant::Dev => flux::model::Config::dev(),
        };
        let flux_model = Flux::new(&flux_config, flux_vb).context("failed to load flux model")?;

        Ok(FluxEngine {
            variant,
            device,
            dtype,
            t5_model: Mutex::new(t5_model),
            t5_tokenizer,
            clip_model,
            clip_tokenizer,
            autoencoder,
            flux_model,
        })
    }
}
