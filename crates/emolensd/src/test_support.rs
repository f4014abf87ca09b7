//! Stub models for exercising the daemon without model files.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use emolens_core::{
    ClassifierError, DetectionParams, EmotionModel, FaceDetector, LumaGrid, Models,
    NormalizedTensor, Pipeline, RawRect,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

pub const HAPPY: [f32; 7] = [0.01, 0.01, 0.02, 0.80, 0.06, 0.05, 0.05];

struct FixedDetector(Vec<RawRect>);

impl FaceDetector for FixedDetector {
    fn detect(&self, _luma: &LumaGrid, _params: &DetectionParams) -> Vec<RawRect> {
        self.0.clone()
    }
}

struct FixedScores(Vec<f32>);

impl EmotionModel for FixedScores {
    fn infer(&self, _input: &NormalizedTensor) -> Result<Vec<f32>, ClassifierError> {
        Ok(self.0.clone())
    }
}

/// Model whose runtime always errors.
struct BrokenModel;

impl EmotionModel for BrokenModel {
    fn infer(&self, _input: &NormalizedTensor) -> Result<Vec<f32>, ClassifierError> {
        Err(ClassifierError::InferenceFailed("session poisoned".into()))
    }
}

/// Model that panics mid-inference, taking its worker down.
struct PanickingModel;

impl EmotionModel for PanickingModel {
    fn infer(&self, _input: &NormalizedTensor) -> Result<Vec<f32>, ClassifierError> {
        panic!("inference worker crashed")
    }
}

pub fn pipeline_with(rects: Vec<RawRect>, scores: Vec<f32>) -> Pipeline {
    Pipeline::new(Models {
        detector: Box::new(FixedDetector(rects)),
        emotion: Box::new(FixedScores(scores)),
    })
}

pub fn failing_pipeline(rects: Vec<RawRect>) -> Pipeline {
    Pipeline::new(Models {
        detector: Box::new(FixedDetector(rects)),
        emotion: Box::new(BrokenModel),
    })
}

pub fn panicking_pipeline(rects: Vec<RawRect>) -> Pipeline {
    Pipeline::new(Models {
        detector: Box::new(FixedDetector(rects)),
        emotion: Box::new(PanickingModel),
    })
}

/// Base64 PNG of a blank white image.
pub fn png_payload(width: u32, height: u32) -> String {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    STANDARD.encode(buf.into_inner())
}
