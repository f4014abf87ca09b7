//! Emotion classification over a normalized 48x48 face crop.
//!
//! The network itself sits behind the [`EmotionModel`] capability. The
//! bundled backend runs a FER2013-style ONNX export through ONNX Runtime.

use crate::types::{EmotionLabel, NormalizedTensor};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

const EMOTION_CLASSES: usize = EmotionLabel::CLASSES.len();

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("expected 7 class scores, got {0}")]
    InvalidOutput(usize),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Pluggable emotion network. Returns one score per class in
/// [`EmotionLabel::CLASSES`] order.
pub trait EmotionModel: Send + Sync {
    fn infer(&self, input: &NormalizedTensor) -> Result<Vec<f32>, ClassifierError>;
}

/// Maps model scores to an [`EmotionLabel`].
pub struct EmotionClassifier {
    model: Box<dyn EmotionModel>,
}

impl EmotionClassifier {
    pub fn new(model: Box<dyn EmotionModel>) -> Self {
        Self { model }
    }

    /// Classify a face. Never returns [`EmotionLabel::NoFace`].
    pub fn classify(&self, input: &NormalizedTensor) -> Result<EmotionLabel, ClassifierError> {
        let scores = self.model.infer(input)?;
        if scores.len() != EMOTION_CLASSES {
            return Err(ClassifierError::InvalidOutput(scores.len()));
        }

        let idx = argmax(&scores);
        tracing::debug!(?scores, idx, "emotion scores");

        // idx < EMOTION_CLASSES by the length check above.
        Ok(EmotionLabel::CLASSES[idx])
    }
}

/// Index of the highest score. Ties resolve to the lowest index and NaN
/// never wins over a number. Returns 0 for an empty slice.
fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] || (scores[best].is_nan() && !score.is_nan()) {
            best = i;
        }
    }
    best
}

/// ONNX Runtime emotion model expecting a [1, 48, 48, 1] f32 input.
///
/// `Session::run` needs exclusive access, so the session lives behind a
/// mutex: inference is one call at a time across all requests, while
/// decoding, detection and preprocessing stay parallel.
pub struct OnnxEmotionModel {
    session: Mutex<Session>,
}

impl OnnxEmotionModel {
    /// Load the ONNX model and run one probe inference on a blank face, so a
    /// model with the wrong input or output layout fails here rather than on
    /// the first request.
    pub fn load(model_path: &str, intra_threads: usize) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded emotion model"
        );

        let model = Self {
            session: Mutex::new(session),
        };

        let probe = model.infer(&NormalizedTensor::zeros())?;
        if probe.len() != EMOTION_CLASSES {
            return Err(ClassifierError::InvalidOutput(probe.len()));
        }

        Ok(model)
    }
}

impl EmotionModel for OnnxEmotionModel {
    fn infer(&self, input: &NormalizedTensor) -> Result<Vec<f32>, ClassifierError> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::InferenceFailed("session lock poisoned".into()))?;

        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("emotion scores: {e}")))?;

        Ok(scores.to_vec())
    }
}
