//! Face selection and crop normalization for the emotion classifier.

use crate::types::{LumaGrid, NormalizedTensor, PixelGrid, Region, FACE_INPUT_SIZE};
use ndarray::Array4;

/// Pick the region with the largest area. Ties go to the earliest region.
pub fn select_largest(regions: &[Region]) -> Option<&Region> {
    let mut best: Option<&Region> = None;
    for region in regions {
        if best.map_or(true, |b| region.area() > b.area()) {
            best = Some(region);
        }
    }
    best
}

/// Crop `region` out of `grid` and turn it into the [1, 48, 48, 1] classifier input.
///
/// The crop is converted to luminance, resized straight to 48x48 (no aspect
/// preservation) and scaled to [0, 1].
pub fn normalize(grid: &PixelGrid, region: &Region) -> NormalizedTensor {
    let face = grid.crop_luma(region);
    let resized = resize_bilinear(&face, FACE_INPUT_SIZE, FACE_INPUT_SIZE);

    let mut tensor = Array4::<f32>::zeros((1, FACE_INPUT_SIZE, FACE_INPUT_SIZE, 1));
    for y in 0..FACE_INPUT_SIZE {
        for x in 0..FACE_INPUT_SIZE {
            tensor[[0, y, x, 0]] = resized[y * FACE_INPUT_SIZE + x] as f32 / 255.0;
        }
    }

    NormalizedTensor::from_array_unchecked(tensor)
}

/// Bilinear resize with half-pixel centers, rounding back to 8-bit.
fn resize_bilinear(src: &LumaGrid, new_w: usize, new_h: usize) -> Vec<u8> {
    let width = src.width() as usize;
    let height = src.height() as usize;
    let frame = src.data();

    let scale_x = width as f32 / new_w as f32;
    let scale_y = height as f32 / new_h as f32;

    let mut resized = vec![0u8; new_w * new_h];
    for y in 0..new_h {
        let src_y = ((y as f32 + 0.5) * scale_y - 0.5).max(0.0);
        let y0 = (src_y.floor() as usize).min(height - 1);
        let y1 = (y0 + 1).min(height - 1);
        let fy = (src_y - y0 as f32).clamp(0.0, 1.0);

        for x in 0..new_w {
            let src_x = ((x as f32 + 0.5) * scale_x - 0.5).max(0.0);
            let x0 = (src_x.floor() as usize).min(width - 1);
            let x1 = (x0 + 1).min(width - 1);
            let fx = (src_x - x0 as f32).clamp(0.0, 1.0);

            let tl = frame[y0 * width + x0] as f32;
            let tr = frame[y0 * width + x1] as f32;
            let bl = frame[y1 * width + x0] as f32;
            let br = frame[y1 * width + x1] as f32;

            let val = tl * (1.0 - fx) * (1.0 - fy)
                + tr * fx * (1.0 - fy)
                + bl * (1.0 - fx) * fy
                + br * fx * fy;

            resized[y * new_w + x] = val.round().clamp(0.0, 255.0) as u8;
        }
    }

    resized
}
