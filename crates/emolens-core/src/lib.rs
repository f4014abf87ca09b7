//! emolens-core: face detection and emotion recognition pipeline.
//!
//! Decodes a base64 image, locates faces, and either returns the face boxes
//! or classifies the emotion of the largest face. Detection runs a SeetaFace
//! cascade via `rustface`; classification runs an ONNX model via ONNX Runtime.

pub mod classifier;
pub mod decoder;
pub mod locator;
pub mod pipeline;
pub mod preprocess;
#[cfg(feature = "rustface")]
pub mod rustface_backend;
pub mod types;

pub use classifier::{ClassifierError, EmotionClassifier, EmotionModel, OnnxEmotionModel};
pub use locator::{DetectionParams, FaceDetector, FaceLocator, LocatorError, RawRect};
pub use pipeline::{Models, Pipeline, PipelineError};
#[cfg(feature = "rustface")]
pub use rustface_backend::RustfaceDetector;
pub use types::{
    Confidence, EmotionLabel, InferenceResult, LumaGrid, NormalizedTensor, PixelGrid, Region,
    Task,
};

use std::path::PathBuf;
use thiserror::Error;

/// Default file name of the SeetaFace detection model.
pub const DEFAULT_DETECTOR_MODEL: &str = "seeta_fd_frontal_v1.0.bin";
/// Default file name of the emotion classification model.
pub const DEFAULT_EMOTION_MODEL: &str = "emotion_model.onnx";

/// Directory searched for model files when none is configured.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("detector: {0}")]
    Detector(#[from] LocatorError),
    #[error("classifier: {0}")]
    Classifier(#[from] ClassifierError),
}

#[cfg(feature = "rustface")]
impl Models {
    /// Load the bundled detector and classifier backends from disk.
    pub fn load(
        detector_path: &str,
        emotion_path: &str,
        intra_threads: usize,
    ) -> Result<Self, ModelLoadError> {
        let detector = RustfaceDetector::load(detector_path)?;
        let emotion = OnnxEmotionModel::load(emotion_path, intra_threads)?;
        Ok(Self {
            detector: Box::new(detector),
            emotion: Box::new(emotion),
        })
    }
}
