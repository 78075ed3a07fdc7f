//! Job input and output records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JobError;

pub const MIN_VARIANTS: i64 = 1;
pub const MAX_VARIANTS: i64 = 10;
pub const MIN_STEPS: i64 = 1;
pub const MAX_STEPS: i64 = 100;

/// Structured prompt document. Opaque to the orchestrator, which only needs
/// it to be present and convertible to text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prompt(pub Value);

impl Prompt {
    /// Null, `false`, zero and empty strings, lists or objects all count as
    /// no prompt at all.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(fields) => fields.is_empty(),
            Value::Bool(b) => !b,
            Value::Number(n) => n.as_f64() == Some(0.0),
        }
    }

    /// Text handed to the engine: strings pass through as-is, anything else
    /// is serialized as JSON.
    pub fn to_text(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl From<Value> for Prompt {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// One inbound generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    #[serde(default, alias = "json_prompt")]
    pub prompt: Prompt,
    /// Negative means "pick a random seed per variant".
    #[serde(default = "default_seed")]
    pub seed: i64,
    #[serde(default = "default_steps")]
    pub steps: i64,
    #[serde(default = "default_variants")]
    pub variants: i64,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,
    #[serde(default)]
    pub negative_prompt: String,
}

fn default_seed() -> i64 {
    -1
}

fn default_steps() -> i64 {
    50
}

fn default_variants() -> i64 {
    1
}

fn default_aspect_ratio() -> String {
    "1:1".to_string()
}

fn default_guidance_scale() -> f64 {
    5.0
}

impl GenerationJob {
    pub fn new(prompt: impl Into<Prompt>) -> Self {
        Self {
            prompt: prompt.into(),
            seed: default_seed(),
            steps: default_steps(),
            variants: default_variants(),
            aspect_ratio: default_aspect_ratio(),
            guidance_scale: default_guidance_scale(),
            negative_prompt: String::new(),
        }
    }

    /// Checks the job's bounds. Touches nothing; the first failing check is
    /// reported.
    pub fn validate(self) -> Result<AcceptedJob, JobError> {
        if self.prompt.is_empty() {
            return Err(JobError::Validation("prompt is required".to_string()));
        }
        if !(MIN_VARIANTS..=MAX_VARIANTS).contains(&self.variants) {
            return Err(JobError::Validation(format!(
                "variants must be between {MIN_VARIANTS} and {MAX_VARIANTS}"
            )));
        }
        if !(MIN_STEPS..=MAX_STEPS).contains(&self.steps) {
            return Err(JobError::Validation(format!(
                "steps must be between {MIN_STEPS} and {MAX_STEPS}"
            )));
        }

        Ok(AcceptedJob {
            prompt: self.prompt,
            seed: self.seed,
            steps: self.steps as u32,
            variants: self.variants as u32,
            aspect_ratio: self.aspect_ratio,
            guidance_scale: self.guidance_scale,
            negative_prompt: self.negative_prompt,
        })
    }
}

/// A job that passed validation; counts are known to be in range.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedJob {
    pub prompt: Prompt,
    pub seed: i64,
    pub steps: u32,
    pub variants: u32,
    pub aspect_ratio: String,
    pub guidance_scale: f64,
    pub negative_prompt: String,
}

impl AcceptedJob {
    pub fn parameters(&self) -> JobParameters {
        JobParameters {
            steps: self.steps,
            guidance_scale: self.guidance_scale,
            aspect_ratio: self.aspect_ratio.clone(),
            variants: self.variants,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedImage {
    pub url: String,
    pub seed: u64,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParameters {
    pub steps: u32,
    pub guidance_scale: f64,
    pub aspect_ratio: String,
    pub variants: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub images: Vec<PublishedImage>,
    /// Seconds.
    pub generation_time: f64,
    pub parameters: JobParameters,
}

/// Wire shape returned by every transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobResponse {
    Success(JobResult),
    Failure { error: String },
}

impl JobResponse {
    pub fn failure(error: impl ToString) -> Self {
        Self::Failure {
            error: error.to_string(),
        }
    }
}

impl From<Result<JobResult, JobError>> for JobResponse {
    fn from(result: Result<JobResult, JobError>) -> Self {
        match result {
            Ok(result) => Self::Success(result),
            Err(err) => Self::failure(err),
        }
    }
}
