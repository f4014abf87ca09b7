//! Request pipeline: task validation, decode, locate, and optionally classify.

use crate::classifier::{ClassifierError, EmotionClassifier, EmotionModel};
use crate::decoder::{self, DecodeError};
use crate::locator::{FaceDetector, FaceLocator};
use crate::preprocess;
use crate::types::{Confidence, EmotionLabel, InferenceResult, PixelGrid, Region, Task};
use thiserror::Error;

/// Per-request failures. `Display` is the client-facing message.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid task")]
    InvalidTask(String),
    #[error("Invalid image format")]
    InvalidImage(#[source] DecodeError),
    #[error("Inference failed")]
    Inference(#[source] ClassifierError),
}

impl PipelineError {
    /// True for errors caused by the request itself (HTTP 400-class).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, PipelineError::Inference(_))
    }
}

/// Process-wide model state, built once at startup and handed to [`Pipeline::new`].
pub struct Models {
    pub detector: Box<dyn FaceDetector>,
    pub emotion: Box<dyn EmotionModel>,
}

/// Stateless image-to-result pipeline. Safe to share across threads.
pub struct Pipeline {
    locator: FaceLocator,
    classifier: EmotionClassifier,
}

impl Pipeline {
    pub fn new(models: Models) -> Self {
        Self {
            locator: FaceLocator::new(models.detector),
            classifier: EmotionClassifier::new(models.emotion),
        }
    }

    /// Validate `task`, then run it. The payload is not touched for an unknown task.
    pub fn run(&self, payload: &str, task: &str) -> Result<InferenceResult, PipelineError> {
        let task: Task = task
            .parse()
            .map_err(|e: crate::types::UnknownTask| PipelineError::InvalidTask(e.0))?;
        self.run_task(payload, task)
    }

    pub fn run_task(&self, payload: &str, task: Task) -> Result<InferenceResult, PipelineError> {
        let grid = decoder::decode(payload).map_err(PipelineError::InvalidImage)?;
        let regions = self.locator.detect(&grid);

        let result = match task {
            Task::Detection => InferenceResult::Detection { faces: regions },
            Task::Emotion => self.classify_largest(&grid, &regions)?,
        };

        tracing::debug!(
            task = task.as_str(),
            width = grid.width(),
            height = grid.height(),
            ?result,
            "pipeline finished"
        );

        Ok(result)
    }

    fn classify_largest(
        &self,
        grid: &PixelGrid,
        regions: &[Region],
    ) -> Result<InferenceResult, PipelineError> {
        let Some(face) = preprocess::select_largest(regions) else {
            return Ok(InferenceResult::Emotion {
                emotion: EmotionLabel::NoFace,
                confidence: Confidence::NotApplicable,
            });
        };

        let input = preprocess::normalize(grid, face);
        let emotion = self
            .classifier
            .classify(&input)
            .map_err(PipelineError::Inference)?;

        Ok(InferenceResult::Emotion {
            emotion,
            confidence: Confidence::High,
        })
    }
}
