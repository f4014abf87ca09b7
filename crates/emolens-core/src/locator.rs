//! Face location over a decoded grid.
//!
//! The actual detector is a pluggable [`FaceDetector`] capability; this module
//! owns the fixed detection policy and the guarantee that every returned
//! [`Region`] lies inside the source grid.

use crate::types::{LumaGrid, PixelGrid, Region};
use thiserror::Error;

// --- Detection policy (not caller-configurable) ---
const SCALE_FACTOR: f32 = 1.2;
const MIN_NEIGHBORS: u32 = 5;
const MIN_FACE_SIZE: u32 = 30;

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("detector model not found: {0}")]
    ModelNotFound(String),
    #[error("failed to load detector model {path}: {reason}")]
    ModelLoad { path: String, reason: String },
}

/// Parameters handed to the detector on every call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    /// Ratio between consecutive scan scales (> 1.0).
    pub scale_factor: f32,
    /// How many overlapping candidate windows must agree before a face is kept.
    pub min_neighbors: u32,
    /// Smallest face side, in source-image pixels.
    pub min_size: u32,
}

impl DetectionParams {
    pub const FIXED: DetectionParams = DetectionParams {
        scale_factor: SCALE_FACTOR,
        min_neighbors: MIN_NEIGHBORS,
        min_size: MIN_FACE_SIZE,
    };
}

/// Unvalidated rectangle as reported by a detector backend.
///
/// May extend past the image borders or be degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Pluggable face detection backend.
///
/// Implementations must be deterministic: the same luminance grid and
/// parameters always produce the same rectangles in the same order.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, luma: &LumaGrid, params: &DetectionParams) -> Vec<RawRect>;
}

/// Applies the detection policy on top of a [`FaceDetector`].
pub struct FaceLocator {
    detector: Box<dyn FaceDetector>,
    params: DetectionParams,
}

impl FaceLocator {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self {
            detector,
            params: DetectionParams::FIXED,
        }
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    /// Locate faces, in the detector's native order. Empty when none are found.
    pub fn detect(&self, grid: &PixelGrid) -> Vec<Region> {
        let luma = grid.to_luma();
        let raw = self.detector.detect(&luma, &self.params);

        let regions: Vec<Region> = raw
            .iter()
            .filter_map(|r| clip_to_grid(r, grid.width(), grid.height()))
            .collect();

        tracing::debug!(
            width = grid.width(),
            height = grid.height(),
            raw = raw.len(),
            kept = regions.len(),
            "faces located"
        );

        regions
    }
}

/// Intersect a raw rectangle with the grid. `None` if nothing is left.
fn clip_to_grid(rect: &RawRect, width: u32, height: u32) -> Option<Region> {
    let x0 = (rect.x as i64).max(0);
    let y0 = (rect.y as i64).max(0);
    let x1 = (rect.x as i64 + rect.width as i64).min(width as i64);
    let y1 = (rect.y as i64 + rect.height as i64).min(height as i64);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(Region {
        x: x0 as u32,
        y: y0 as u32,
        w: (x1 - x0) as u32,
        h: (y1 - y0) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn rect(x: i32, y: i32, width: i32, height: i32) -> RawRect {
        RawRect { x, y, width, height }
    }

    /// Returns a fixed list and remembers what it was called with.
    struct Recording {
        rects: Vec<RawRect>,
        seen: Mutex<Vec<(u32, u32, DetectionParams)>>,
    }

    impl FaceDetector for Recording {
        fn detect(&self, luma: &LumaGrid, params: &DetectionParams) -> Vec<RawRect> {
            self.seen
                .lock()
                .unwrap()
                .push((luma.width(), luma.height(), *params));
            self.rects.clone()
        }
    }

    fn white(width: u32, height: u32) -> PixelGrid {
        PixelGrid::from_bgr(width, height, vec![255; (width * height * 3) as usize]).unwrap()
    }

    #[test]
    fn test_fixed_params() {
        assert_eq!(DetectionParams::FIXED.scale_factor, 1.2);
        assert_eq!(DetectionParams::FIXED.min_neighbors, 5);
        assert_eq!(DetectionParams::FIXED.min_size, 30);
    }

    #[test]
    fn test_no_faces_is_empty() {
        let detector = Recording {
            rects: vec![],
            seen: Mutex::new(vec![]),
        };
        let locator = FaceLocator::new(Box::new(detector));
        let regions = locator.detect(&white(100, 80));
        assert!(regions.is_empty());
        assert_eq!(locator.params(), &DetectionParams::FIXED);
    }

    #[test]
    fn test_native_order_preserved() {
        let rects = vec![rect(10, 10, 20, 20), rect(0, 0, 50, 50), rect(5, 5, 20, 20)];
        let locator = FaceLocator::new(Box::new(Recording {
            rects,
            seen: Mutex::new(vec![]),
        }));
        let regions = locator.detect(&white(100, 100));
        assert_eq!(
            regions,
            vec![
                Region::new(10, 10, 20, 20),
                Region::new(0, 0, 50, 50),
                Region::new(5, 5, 20, 20),
            ]
        );
    }

    #[test]
    fn test_detect_is_deterministic() {
        let locator = FaceLocator::new(Box::new(Recording {
            rects: vec![rect(3, 4, 40, 40), rect(50, 10, 31, 33)],
            seen: Mutex::new(vec![]),
        }));
        let grid = white(120, 90);
        assert_eq!(locator.detect(&grid), locator.detect(&grid));
    }

    #[test]
    fn test_clip_partially_outside() {
        assert_eq!(
            clip_to_grid(&rect(-10, -5, 40, 40), 100, 100),
            Some(Region::new(0, 0, 30, 35))
        );
        assert_eq!(
            clip_to_grid(&rect(80, 90, 40, 40), 100, 100),
            Some(Region::new(80, 90, 20, 10))
        );
    }

    #[test]
    fn test_clip_drops_outside_and_degenerate() {
        assert_eq!(clip_to_grid(&rect(100, 0, 10, 10), 100, 100), None);
        assert_eq!(clip_to_grid(&rect(-20, 0, 10, 10), 100, 100), None);
        assert_eq!(clip_to_grid(&rect(10, 10, 0, 10), 100, 100), None);
        assert_eq!(clip_to_grid(&rect(10, 10, -5, 10), 100, 100), None);
    }

    #[test]
    fn test_recording_sees_grid_dimensions() {
        let detector = std::sync::Arc::new(Recording {
            rects: vec![],
            seen: Mutex::new(vec![]),
        });

        struct Shared(std::sync::Arc<Recording>);
        impl FaceDetector for Shared {
            fn detect(&self, luma: &LumaGrid, params: &DetectionParams) -> Vec<RawRect> {
                self.0.detect(luma, params)
            }
        }

        let locator = FaceLocator::new(Box::new(Shared(detector.clone())));
        locator.detect(&white(64, 48));
        let seen = detector.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(64, 48, DetectionParams::FIXED)]);
    }
}
