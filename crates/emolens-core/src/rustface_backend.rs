//! Face detector backed by the `rustface` crate (SeetaFace funnel cascade).

use crate::locator::{DetectionParams, FaceDetector, LocatorError, RawRect};
use crate::types::LumaGrid;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// SeetaFace's own window-merging replaces neighbor counting; this score
// cut-off is what keeps weak, unsupported windows out.
const SCORE_THRESHOLD: f64 = 2.0;
const WINDOW_STEP: u32 = 4;
// The cascade cannot scan for faces smaller than its 20px base window.
const MIN_SUPPORTED_FACE: u32 = 20;

/// SeetaFace detector. The model is loaded once and shared read-only; each
/// call builds its own lightweight detector around a clone of it.
pub struct RustfaceDetector {
    model: rustface::Model,
}

impl RustfaceDetector {
    /// Load the SeetaFace model (`seeta_fd_frontal_v1.0.bin`) from disk.
    pub fn load(model_path: &str) -> Result<Self, LocatorError> {
        if !Path::new(model_path).exists() {
            return Err(LocatorError::ModelNotFound(model_path.to_string()));
        }

        let file = File::open(model_path).map_err(|e| LocatorError::ModelLoad {
            path: model_path.to_string(),
            reason: e.to_string(),
        })?;
        let model = rustface::read_model(BufReader::new(file)).map_err(|e| LocatorError::ModelLoad {
            path: model_path.to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(path = model_path, "loaded SeetaFace detector model");

        Ok(Self { model })
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&self, luma: &LumaGrid, params: &DetectionParams) -> Vec<RawRect> {
        let min_size = params.min_size.max(MIN_SUPPORTED_FACE);
        if luma.width() < min_size || luma.height() < min_size {
            return Vec::new();
        }

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(min_size);
        detector.set_score_thresh(SCORE_THRESHOLD);
        // rustface shrinks the image by this factor per pyramid level.
        detector.set_pyramid_scale_factor(1.0 / params.scale_factor);
        detector.set_slide_window_step(WINDOW_STEP, WINDOW_STEP);

        let faces = detector.detect(&rustface::ImageData::new(luma.data(), luma.width(), luma.height()));

        faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                RawRect {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width() as i32,
                    height: bbox.height() as i32,
                }
            })
            .collect()
    }
}
