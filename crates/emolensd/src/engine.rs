use crate::config::Config;
use emolens_core::{InferenceResult, ModelLoadError, Models, Pipeline, PipelineError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("pipeline worker panicked")]
    WorkerLost,
}

/// Clone-safe handle to the shared pipeline.
///
/// Every request runs on tokio's blocking pool; the pipeline never awaits.
#[derive(Clone)]
pub struct EngineHandle {
    pipeline: Arc<Pipeline>,
}

impl EngineHandle {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Run one request: validate the task, decode, detect, maybe classify.
    pub async fn process(&self, image: String, task: String) -> Result<InferenceResult, EngineError> {
        let pipeline = Arc::clone(&self.pipeline);
        let result = tokio::task::spawn_blocking(move || pipeline.run(&image, &task))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "pipeline worker panicked");
                EngineError::WorkerLost
            })??;
        Ok(result)
    }
}

/// Load both models and build the engine. Fails fast: a missing or broken
/// model aborts startup instead of degrading per request.
pub fn load_engine(config: &Config) -> Result<EngineHandle, ModelLoadError> {
    let detector_path = config.detector_model_path();
    let emotion_path = config.emotion_model_path();

    let models = Models::load(&detector_path, &emotion_path, config.intra_threads)?;
    tracing::info!(
        detector = %detector_path,
        emotion = %emotion_path,
        intra_threads = config.intra_threads,
        "models loaded"
    );

    Ok(EngineHandle::new(Pipeline::new(models)))
}
