//! Per-job control flow: validate, then generate, publish and reclaim once per
//! variant, strictly in sequence.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::engine::InferenceEngine;
use crate::error::JobError;
use crate::generation::{GenerationStep, Sampling};
use crate::job::{AcceptedJob, GenerationJob, JobResult, PublishedImage};
use crate::memory::MemoryGovernor;
use crate::publisher::Publisher;
use crate::resolution;
use crate::seed::allocate_seed;

pub struct Orchestrator {
    pipeline: Pipeline,
    /// Held for the whole lifetime of an accepted job so jobs never share the
    /// engine.
    engine_lease: Arc<Mutex<()>>,
}

/// Everything one accepted job needs, owned so it can outlive the caller.
#[derive(Clone)]
struct Pipeline {
    generation: GenerationStep,
    memory: MemoryGovernor,
    publisher: Publisher,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn InferenceEngine>, publisher: Publisher) -> Self {
        Self {
            pipeline: Pipeline {
                generation: GenerationStep::new(Arc::clone(&engine)),
                memory: MemoryGovernor::new(engine),
                publisher,
            },
            engine_lease: Arc::new(Mutex::new(())),
        }
    }

    pub fn memory(&self) -> &MemoryGovernor {
        &self.pipeline.memory
    }

    /// Runs one job to completion. Either every variant is published and
    /// reported, or the job fails as a whole and nothing is reported.
    ///
    /// Rejected jobs touch nothing. Once a job is accepted, memory is
    /// reclaimed after every attempted variant and once more as the job's
    /// last action, on every path.
    ///
    /// Accepted jobs run on their own task. Dropping the returned future
    /// detaches the job but does not cut it short: it keeps the engine lease
    /// until its final reclaim.
    pub async fn run(&self, job: GenerationJob) -> Result<JobResult, JobError> {
        let job = job.validate().inspect_err(|e| {
            tracing::warn!(reason = %e, "job rejected");
        })?;

        let pipeline = self.pipeline.clone();
        let lease = Arc::clone(&self.engine_lease);
        let task = tokio::spawn(async move {
            let _lease = lease.lock_owned().await;
            pipeline.run(job).await
        });

        task.await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "job task failed");
            Err(JobError::Aborted(e.to_string()))
        })
    }
}

impl Pipeline {
    async fn run(&self, job: AcceptedJob) -> Result<JobResult, JobError> {
        let started = Instant::now();

        let result = self.run_accepted(&job, started).await;

        match &result {
            Ok(result) => tracing::info!(
                images = result.images.len(),
                generation_time = result.generation_time,
                "job completed"
            ),
            Err(e) => tracing::error!(kind = e.kind(), error = %e, "job failed"),
        }
        self.memory.log_usage("End of request");

        self.memory.reclaim();
        result
    }

    async fn run_accepted(&self, job: &AcceptedJob, started: Instant) -> Result<JobResult, JobError> {
        self.publisher
            .ensure_configured()
            .map_err(JobError::Configuration)?;

        self.memory.log_usage("Start of request");

        let sampling = Sampling {
            steps: job.steps,
            guidance_scale: job.guidance_scale,
            negative_prompt: &job.negative_prompt,
            resolution: resolution::resolve(Some(&job.aspect_ratio)),
        };

        let mut images = Vec::with_capacity(job.variants as usize);
        for index in 0..job.variants {
            let seed = allocate_seed(job.seed, index, job.variants);
            tracing::info!(
                variant = index + 1,
                variants = job.variants,
                seed,
                width = sampling.resolution.width,
                height = sampling.resolution.height,
                "generating variant"
            );
            self.memory
                .log_usage(&format!("Before generation {}", index + 1));

            let outcome = self.run_variant(job, index, seed, &sampling).await;

            self.memory.reclaim();
            self.memory
                .log_usage(&format!("After generation {}", index + 1));

            let published = outcome?;
            tracing::info!(url = %published.url, "generated and uploaded");
            images.push(published);
        }

        Ok(JobResult {
            images,
            generation_time: started.elapsed().as_secs_f64(),
            parameters: job.parameters(),
        })
    }

    async fn run_variant(
        &self,
        job: &AcceptedJob,
        index: u32,
        seed: u64,
        sampling: &Sampling<'_>,
    ) -> Result<PublishedImage, JobError> {
        let request = GenerationStep::request(&job.prompt, Some(seed), sampling);
        let image = self
            .generation
            .generate(request)
            .await
            .map_err(|source| JobError::Engine { index, source })?;

        let upload = self
            .publisher
            .publish(image)
            .await
            .map_err(|source| JobError::Publish { index, source })?;

        Ok(PublishedImage {
            url: upload.url,
            seed,
            filename: upload.key,
        })
    }
}
