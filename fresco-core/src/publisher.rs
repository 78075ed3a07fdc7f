use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use uuid::Uuid;

use crate::error::PublishError;
use crate::storage::{ObjectStore, S3Store, StorageConfig, StorageSettings};

pub const KEY_PREFIX: &str = "fibo-";
pub const CONTENT_TYPE: &str = "image/png";

/// Where one image ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub key: String,
    pub url: String,
}

/// Encodes images as PNG and uploads them under fresh unique keys.
#[derive(Clone)]
pub struct Publisher {
    backend: Result<(StorageConfig, Arc<dyn ObjectStore>), PublishError>,
}

impl Publisher {
    pub fn new(config: StorageConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            backend: Ok((config, store)),
        }
    }

    /// Builds an S3 backed publisher, or one that rejects every job when the
    /// settings are incomplete.
    pub fn from_settings(settings: &StorageSettings) -> Self {
        match settings.resolve() {
            Ok(config) => {
                let store = Arc::new(S3Store::new(&config));
                Self::new(config, store)
            }
            Err(e) => {
                tracing::warn!(error = %e, "jobs will be rejected until storage is configured");
                Self { backend: Err(e) }
            }
        }
    }

    /// Checked once per job, before any inference or upload.
    pub fn ensure_configured(&self) -> Result<(), PublishError> {
        match &self.backend {
            Ok(_) => Ok(()),
            Err(e) => Err(e.clone()),
        }
    }

    /// Takes ownership of `image`; it is dropped as soon as it is encoded, so
    /// it is gone by the time the upload returns, successful or not.
    pub async fn publish(&self, image: DynamicImage) -> Result<Upload, PublishError> {
        let (config, store) = match &self.backend {
            Ok((config, store)) => (config, store),
            Err(e) => return Err(e.clone()),
        };

        let key = new_key();
        let bytes = encode_png(image).map_err(|e| PublishError::Encode {
            key: key.clone(),
            message: e.to_string(),
        })?;

        store
            .put_object(&config.bucket_name, &key, bytes, CONTENT_TYPE)
            .await
            .map_err(|e| PublishError::Upload {
                key: key.clone(),
                message: format!("{e:#}"),
            })?;

        let url = public_url(config, &key);
        Ok(Upload { key, url })
    }
}

fn new_key() -> String {
    format!("{KEY_PREFIX}{}.png", Uuid::new_v4())
}

fn encode_png(image: DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Public base when configured, otherwise `endpoint/bucket/key`.
fn public_url(config: &StorageConfig, key: &str) -> String {
    match &config.public_url {
        Some(base) => format!("{}/{key}", base.trim_end_matches('/')),
        None => format!("{}/{}/{key}", config.endpoint_url, config.bucket_name),
    }
}
