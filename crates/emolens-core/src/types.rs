use ndarray::{Array4, ArrayView4};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Side length of the square face crop fed to the emotion classifier.
pub const FACE_INPUT_SIZE: usize = 48;

// BT.601 luma weights in 14-bit fixed point (sum = 1 << 14).
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;

/// A decoded 3-channel image, stored as interleaved B,G,R bytes.
///
/// Width and height are always non-zero and `data.len() == width * height * 3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelGrid {
    /// Build a grid from interleaved BGR bytes. Returns `None` if the
    /// dimensions are zero or the buffer length does not match.
    pub fn from_bgr(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || data.len() != width as usize * height as usize * 3 {
            return None;
        }
        Some(Self { width, height, data })
    }

    /// Build a grid from an RGB image buffer, swapping to BGR order in place.
    pub fn from_rgb(image: image::RgbImage) -> Option<Self> {
        let (width, height) = image.dimensions();
        let mut data = image.into_raw();
        for px in data.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        Self::from_bgr(width, height, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw interleaved BGR bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The (B, G, R) sample at `(x, y)`.
    #[cfg(test)]
    pub(crate) fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let off = (y as usize * self.width as usize + x as usize) * 3;
        [self.data[off], self.data[off + 1], self.data[off + 2]]
    }

    /// Convert the whole grid to single-channel luminance.
    pub fn to_luma(&self) -> LumaGrid {
        LumaGrid {
            width: self.width,
            height: self.height,
            data: self.data.chunks_exact(3).map(bgr_to_luma).collect(),
        }
    }

    /// Crop to `region` and convert the crop to luminance.
    ///
    /// The region is clipped to the grid; at least one pixel is always kept.
    pub fn crop_luma(&self, region: &Region) -> LumaGrid {
        let x0 = region.x.min(self.width - 1);
        let y0 = region.y.min(self.height - 1);
        let x1 = region.x.saturating_add(region.w).clamp(x0 + 1, self.width);
        let y1 = region.y.saturating_add(region.h).clamp(y0 + 1, self.height);

        let row_stride = self.width as usize * 3;
        let mut data = Vec::with_capacity(((x1 - x0) * (y1 - y0)) as usize);
        for y in y0..y1 {
            let start = y as usize * row_stride + x0 as usize * 3;
            let end = y as usize * row_stride + x1 as usize * 3;
            data.extend(self.data[start..end].chunks_exact(3).map(bgr_to_luma));
        }

        LumaGrid {
            width: x1 - x0,
            height: y1 - y0,
            data,
        }
    }
}

fn bgr_to_luma(px: &[u8]) -> u8 {
    let (b, g, r) = (px[0] as u32, px[1] as u32, px[2] as u32);
    ((b * LUMA_B + g * LUMA_G + r * LUMA_R + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8
}

/// Single-channel 8-bit luminance image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaGrid {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl LumaGrid {
    /// Returns `None` on zero dimensions or a length mismatch.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Axis-aligned face rectangle in source-image pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
    #[error("tensor shape {0:?} is not [1, 48, 48, 1]")]
    Shape(Vec<usize>),
    #[error("tensor value {0} is outside [0, 1]")]
    OutOfRange(f32),
}

/// Classifier input: a [1, 48, 48, 1] grid of luminance values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor(Array4<f32>);

impl NormalizedTensor {
    /// Wrap an array after checking shape and value range. NaN is rejected.
    pub fn from_array(array: Array4<f32>) -> Result<Self, TensorError> {
        if array.shape() != [1, FACE_INPUT_SIZE, FACE_INPUT_SIZE, 1] {
            return Err(TensorError::Shape(array.shape().to_vec()));
        }
        if let Some(&bad) = array.iter().find(|v| !(0.0..=1.0).contains(*v)) {
            return Err(TensorError::OutOfRange(bad));
        }
        Ok(Self(array))
    }

    /// All-zero tensor, used to probe a model at load time.
    pub fn zeros() -> Self {
        Self(Array4::zeros((1, FACE_INPUT_SIZE, FACE_INPUT_SIZE, 1)))
    }

    /// Caller guarantees shape and range.
    pub(crate) fn from_array_unchecked(array: Array4<f32>) -> Self {
        debug_assert!(array.shape() == [1, FACE_INPUT_SIZE, FACE_INPUT_SIZE, 1]);
        Self(array)
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }
}

/// Emotion categories reported to callers.
///
/// The first seven variants follow the classifier's output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
    /// No face was found, so nothing was classified.
    NoFace,
}

impl EmotionLabel {
    /// Classifier output order (index i of the probability vector).
    pub const CLASSES: [EmotionLabel; 7] = [
        EmotionLabel::Angry,
        EmotionLabel::Disgust,
        EmotionLabel::Fear,
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Surprise,
        EmotionLabel::Neutral,
    ];

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::CLASSES.get(idx).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Angry => "angry",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Neutral => "neutral",
            EmotionLabel::NoFace => "no_face",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence tier attached to an emotion result. There is no graded score:
/// `High` whenever a face was classified, `NotApplicable` for `no_face`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    #[serde(rename = "High")]
    High,
    #[serde(rename = "N/A")]
    NotApplicable,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "lowercase")]
pub enum InferenceResult {
    Detection {
        faces: Vec<Region>,
    },
    Emotion {
        emotion: EmotionLabel,
        confidence: Confidence,
    },
}

/// Work requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Detection,
    Emotion,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Detection => "detection",
            Task::Emotion => "emotion",
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown task: {0:?}")]
pub struct UnknownTask(pub String);

impl FromStr for Task {
    type Err = UnknownTask;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detection" => Ok(Task::Detection),
            "emotion" => Ok(Task::Emotion),
            other => Err(UnknownTask(other.to_string())),
        }
    }
}
