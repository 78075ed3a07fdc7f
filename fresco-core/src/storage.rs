//! Object storage client for S3-compatible services such as Cloudflare R2.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::PublishError;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<()>;
}

/// Raw storage settings as they arrive from flags or the environment. Any
/// field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSettings {
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub bucket_name: Option<String>,
    pub public_url: Option<String>,
}

/// Complete storage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    pub public_url: Option<String>,
}

impl StorageSettings {
    /// Fails with the names of every missing required setting.
    pub fn resolve(&self) -> Result<StorageConfig, PublishError> {
        fn present(value: &Option<String>) -> Option<String> {
            value.as_ref().map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
        }

        let endpoint_url = present(&self.endpoint_url);
        let access_key_id = present(&self.access_key_id);
        let secret_access_key = present(&self.secret_access_key);
        let bucket_name = present(&self.bucket_name);

        match (endpoint_url, access_key_id, secret_access_key, bucket_name) {
            (Some(endpoint_url), Some(access_key_id), Some(secret_access_key), Some(bucket_name)) => {
                Ok(StorageConfig {
                    endpoint_url,
                    access_key_id,
                    secret_access_key,
                    bucket_name,
                    public_url: present(&self.public_url),
                })
            }
            (endpoint, access, secret, bucket) => {
                let missing = [
                    ("R2_ENDPOINT_URL", endpoint.is_none()),
                    ("R2_ACCESS_KEY_ID", access.is_none()),
                    ("R2_SECRET_ACCESS_KEY", secret.is_none()),
                    ("R2_BUCKET_NAME", bucket.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, is_missing)| is_missing.then_some(name))
                .collect();
                Err(PublishError::NotConfigured(missing))
            }
        }
    }
}

/// `aws-sdk-s3` backed store with static credentials and a custom endpoint.
#[derive(Clone, Debug)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "fresco",
        );
        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(config.endpoint_url.clone())
            .region(Region::new("auto"))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(e)))?;
        Ok(())
    }
}
