pub mod device;
pub mod engine;
pub mod error;
pub mod generation;
pub mod job;
pub mod loader;
mod loader_factory;
pub mod location;
pub mod memory;
pub mod orchestrator;
pub mod publisher;
pub mod resolution;
pub mod seed;
pub mod storage;

mod flux;

pub use device::*;
pub use engine::*;
pub use error::{GenerationError, JobError, PublishError};
pub use flux::{FluxEngine, FluxLoader, FluxVariant};
pub use job::{GenerationJob, JobParameters, JobResponse, JobResult, Prompt, PublishedImage};
pub use loader::*;
pub use loader_factory::*;
pub use location::{resolve_model_location, ModelLocation};
pub use memory::MemoryGovernor;
pub use orchestrator::Orchestrator;
pub use publisher::Publisher;
pub use resolution::{Resolution, ASPECT_RATIOS};
pub use storage::{ObjectStore, S3Store, StorageConfig, StorageSettings};
