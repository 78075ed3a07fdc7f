use thiserror::Error;

/// Failure of a single engine invocation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct GenerationError(pub String);

#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("storage is not configured, missing: {}", .0.join(", "))]
    NotConfigured(Vec<&'static str>),
    #[error("failed to encode image {key}: {message}")]
    Encode { key: String, message: String },
    #[error("failed to upload {key}: {message}")]
    Upload { key: String, message: String },
}

/// Job-level outcome taxonomy. Every variant is reported to the caller as a
/// plain error string; none of them invalidate the engine.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Configuration(PublishError),
    #[error("variant {index} generation failed: {source}")]
    Engine {
        index: u32,
        #[source]
        source: GenerationError,
    },
    #[error("variant {index} publish failed: {source}")]
    Publish {
        index: u32,
        #[source]
        source: PublishError,
    },
    /// The task driving the job died before reporting.
    #[error("job aborted: {0}")]
    Aborted(String),
}

impl JobError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Configuration(_) => "configuration",
            Self::Engine { .. } => "engine",
            Self::Publish { .. } => "publish",
            Self::Aborted(_) => "aborted",
        }
    }
}
