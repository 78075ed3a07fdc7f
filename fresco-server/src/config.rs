use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use fresco_core::{DeviceMap, LoadOptions, Precision, StorageSettings};

#[derive(Parser, Debug)]
#[command(author, version, about = "Fresco image generation server")]
pub struct Args {
    /// Model to load, as a hub id
    #[arg(long, env = "FIBO_MODEL_NAME", default_value = "black-forest-labs/FLUX.1-schnell")]
    pub model: String,

    /// Directory holding pre-downloaded models
    #[arg(long, env = "MODEL_CACHE_DIR")]
    pub model_cache_dir: Option<PathBuf>,

    /// Token for gated hub repositories
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Weight precision (bf16, f16 or f32)
    #[arg(long, env = "FRESCO_PRECISION", default_value = "bf16")]
    pub precision: Precision,

    /// Use CPU instead of GPU
    #[arg(long)]
    pub cpu: bool,

    #[command(flatten)]
    pub storage: StorageArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Default)]
pub struct StorageArgs {
    #[arg(long, env = "R2_ENDPOINT_URL")]
    pub r2_endpoint_url: Option<String>,

    #[arg(long, env = "R2_ACCESS_KEY_ID")]
    pub r2_access_key_id: Option<String>,

    #[arg(long, env = "R2_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub r2_secret_access_key: Option<String>,

    #[arg(long, env = "R2_BUCKET_NAME")]
    pub r2_bucket_name: Option<String>,

    /// Public base URL for uploaded images
    #[arg(long, env = "R2_PUBLIC_URL")]
    pub r2_public_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve jobs over HTTP
    Serve {
        /// Host address to bind the server to
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to bind the server to
        #[arg(long, env = "PORT", default_value_t = 8000)]
        port: u16,
    },
    /// Process newline-delimited jobs from stdin
    Worker,
}

impl Args {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            precision: self.precision,
            device_map: if self.cpu {
                DeviceMap::ForceCpu
            } else {
                DeviceMap::default()
            },
            hf_token: self.hf_token.clone(),
        }
    }
}

impl StorageArgs {
    pub fn settings(&self) -> StorageSettings {
        StorageSettings {
            endpoint_url: self.r2_endpoint_url.clone(),
            access_key_id: self.r2_access_key_id.clone(),
            secret_access_key: self.r2_secret_access_key.clone(),
            bucket_name: self.r2_bucket_name.clone(),
            public_url: self.r2_public_url.clone(),
        }
    }
}
