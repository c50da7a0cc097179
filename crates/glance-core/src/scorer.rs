//! Beauty scoring of detected faces.
//!
//! A face crop is resized to the regressor's 224×224 input, the model yields a
//! 5-class distribution over desirability levels 1–5, and the expectation of
//! that distribution is remapped onto the public scale.

use crate::types::{BoundingBox, ScoreSample};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

pub const BEAUTY_INPUT_SIZE: usize = 224;
pub const BEAUTY_CLASSES: usize = 5;
const BEAUTY_MEAN: f32 = 127.5;
const BEAUTY_STD: f32 = 127.5;

/// Piecewise-linear remap segments: `(raw_lo, raw_hi, public_lo, public_hi)`.
///
/// Stretches the regressor's compressed output near the extremes.
const REMAP_SEGMENTS: [(f32, f32, f32, f32); 5] = [
    (1.0, 1.9, 2.5, 4.0),
    (1.9, 2.8, 4.0, 5.5),
    (2.8, 3.4, 5.5, 6.5),
    (3.4, 4.0, 6.5, 8.0),
    (4.0, 5.0, 8.0, 9.0),
];

#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("beauty model not found: {0}")]
    ModelNotFound(String),
    #[error("face crop {width}x{height} cannot be resized to the model input")]
    UnresizableCrop { width: u32, height: u32 },
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A 5-class desirability regressor.
///
/// Input is a `[1, 224, 224, 3]` channels-last BGR tensor normalized to [-1, 1].
pub trait BeautyModel {
    fn predict(&mut self, input: &Array4<f32>) -> Result<[f32; BEAUTY_CLASSES], ScorerError>;

    /// Release per-evaluation state. Called after every profile.
    ///
    /// An ONNX Runtime session accumulates no graph state between runs, so
    /// `OnnxBeautyModel` only clears its inference counter here.
    fn reset(&mut self) {}
}

/// Expectation of the class distribution: `Σ (i + 1) · p[i]`.
pub fn weighted_score(p: &[f32; BEAUTY_CLASSES]) -> f32 {
    p.iter().enumerate().map(|(i, v)| (i + 1) as f32 * v).sum()
}

/// Map a raw score in [1, 5] onto the public scale.
///
/// Input is clamped to [1, 5]. Segment boundaries belong to the lower segment,
/// and `5.0` maps to `9.0`.
pub fn remap(raw: f32) -> f32 {
    let raw = raw.clamp(1.0, 5.0);
    for &(lo, hi, mapped_lo, mapped_hi) in &REMAP_SEGMENTS {
        if raw <= hi {
            let slope = (mapped_hi - mapped_lo) / (hi - lo);
            return slope * (raw - lo) + mapped_lo;
        }
    }
    // NaN falls through every comparison.
    raw
}

/// Crop `bbox` out of `image` and resize it to the model input size.
pub fn crop_face(image: &RgbImage, bbox: &BoundingBox) -> Result<RgbImage, ScorerError> {
    let (width, height) = image.dimensions();
    let left = bbox.left.min(width);
    let top = bbox.top.min(height);
    let crop_w = bbox.right.min(width).saturating_sub(left);
    let crop_h = bbox.bottom.min(height).saturating_sub(top);
    if crop_w == 0 || crop_h == 0 {
        return Err(ScorerError::UnresizableCrop { width: crop_w, height: crop_h });
    }

    let crop = imageops::crop_imm(image, left, top, crop_w, crop_h).to_image();
    let size = BEAUTY_INPUT_SIZE as u32;
    Ok(imageops::resize(&crop, size, size, FilterType::Triangle))
}

/// Convert a 224×224 RGB face into the regressor's input tensor.
///
/// The regressor was trained on BGR pixel order.
pub fn preprocess(face: &RgbImage) -> Array4<f32> {
    let size = BEAUTY_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, size, size, 3));
    for (x, y, pixel) in face.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        for (c, v) in [b, g, r].into_iter().enumerate() {
            tensor[[0, y as usize, x as usize, c]] = (v as f32 - BEAUTY_MEAN) / BEAUTY_STD;
        }
    }
    tensor
}

/// Score one face: crop, preprocess, predict, weight and remap.
pub fn score_face<M: BeautyModel + ?Sized>(
    model: &mut M,
    image: &RgbImage,
    bbox: &BoundingBox,
) -> Result<ScoreSample, ScorerError> {
    let face = crop_face(image, bbox)?;
    let input = preprocess(&face);
    let distribution = model.predict(&input)?;
    let raw = weighted_score(&distribution);
    if !raw.is_finite() {
        return Err(ScorerError::InferenceFailed(format!("non-finite raw score from {distribution:?}")));
    }
    let public = remap(raw);
    tracing::debug!(raw, public, "face scored");
    Ok(ScoreSample { raw, public })
}

/// ResNet-50 label-distribution regressor exported to ONNX.
pub struct OnnxBeautyModel {
    session: Session,
    inferences: usize,
}

impl OnnxBeautyModel {
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, ScorerError> {
        if !model_path.exists() {
            return Err(ScorerError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded beauty model"
        );

        Ok(Self { session, inferences: 0 })
    }
}

impl BeautyModel for OnnxBeautyModel {
    fn predict(&mut self, input: &Array4<f32>) -> Result<[f32; BEAUTY_CLASSES], ScorerError> {
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        self.inferences += 1;

        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ScorerError::InferenceFailed(format!("distribution extraction: {e}")))?;

        let distribution: [f32; BEAUTY_CLASSES] = data.try_into().map_err(|_| {
            ScorerError::InferenceFailed(format!("expected {BEAUTY_CLASSES} classes, got {}", data.len()))
        })?;
        if distribution.iter().any(|v| !v.is_finite()) {
            return Err(ScorerError::InferenceFailed(format!("non-finite output {distribution:?}")));
        }
        Ok(distribution)
    }

    fn reset(&mut self) {
        tracing::debug!(inferences = self.inferences, "beauty session reset");
        self.inferences = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_remap_breakpoints() {
        assert!(approx(remap(1.0), 2.5));
        assert!(approx(remap(1.9), 4.0));
        assert!(approx(remap(2.8), 5.5));
        assert!(approx(remap(3.4), 6.5));
        assert!(approx(remap(4.0), 8.0));
        assert!(approx(remap(5.0), 9.0));
    }

    #[test]
    fn test_remap_interior_points() {
        // (1.9, 2.8] has slope 1.5 / 0.9
        assert!(approx(remap(2.0), 4.0 + 0.1 * 1.5 / 0.9));
        // (3.4, 4.0] has slope 2.5
        assert!(approx(remap(3.5), 6.75));
        let top = remap(4.999);
        assert!(top > 8.0 && top < 9.0, "remap(4.999) = {top}");
    }

    #[test]
    fn test_remap_out_of_domain_is_clamped() {
        assert!(approx(remap(0.2), 2.5));
        assert!(approx(remap(7.0), 9.0));
    }

    #[test]
    fn test_remap_monotonic() {
        let mut prev = remap(1.0);
        for i in 1..=4000 {
            let raw = 1.0 + i as f32 * 0.001;
            let v = remap(raw);
            assert!(v + 1e-5 >= prev, "remap not monotonic at {raw}: {v} < {prev}");
            prev = v;
        }
    }

    #[test]
    fn test_weighted_score() {
        assert!(approx(weighted_score(&[1.0, 0.0, 0.0, 0.0, 0.0]), 1.0));
        assert!(approx(weighted_score(&[0.0, 0.0, 0.0, 0.0, 1.0]), 5.0));
        assert!(approx(weighted_score(&[0.2; 5]), 3.0));
        assert!(approx(weighted_score(&[0.0, 0.0, 0.5, 0.5, 0.0]), 3.5));
    }

    #[test]
    fn test_crop_face_resizes_to_input() {
        let img = RgbImage::from_pixel(300, 200, image::Rgb([1, 2, 3]));
        let bbox = BoundingBox { left: 10, top: 20, right: 110, bottom: 70, confidence: 0.9 };
        let face = crop_face(&img, &bbox).unwrap();
        assert_eq!(face.dimensions(), (BEAUTY_INPUT_SIZE as u32, BEAUTY_INPUT_SIZE as u32));
    }

    #[test]
    fn test_crop_face_outside_image_is_unresizable() {
        let img = RgbImage::new(100, 100);
        let bbox = BoundingBox { left: 150, top: 10, right: 200, bottom: 60, confidence: 0.9 };
        assert!(matches!(
            crop_face(&img, &bbox),
            Err(ScorerError::UnresizableCrop { width: 0, .. })
        ));
    }

    #[test]
    fn test_preprocess_bgr_channels_last() {
        let face = RgbImage::from_pixel(
            BEAUTY_INPUT_SIZE as u32,
            BEAUTY_INPUT_SIZE as u32,
            image::Rgb([255, 127, 0]),
        );
        let t = preprocess(&face);
        assert_eq!(t.shape(), &[1, BEAUTY_INPUT_SIZE, BEAUTY_INPUT_SIZE, 3]);
        assert!(approx(t[[0, 5, 7, 0]], -1.0)); // blue
        assert!(approx(t[[0, 5, 7, 1]], (127.0 - 127.5) / 127.5)); // green
        assert!(approx(t[[0, 5, 7, 2]], 1.0)); // red
    }

    struct Fixed([f32; BEAUTY_CLASSES]);

    impl BeautyModel for Fixed {
        fn predict(&mut self, input: &Array4<f32>) -> Result<[f32; BEAUTY_CLASSES], ScorerError> {
            assert_eq!(input.shape(), &[1, BEAUTY_INPUT_SIZE, BEAUTY_INPUT_SIZE, 3]);
            Ok(self.0)
        }
    }

    #[test]
    fn test_score_face() {
        let img = RgbImage::from_pixel(200, 200, image::Rgb([90, 90, 90]));
        let bbox = BoundingBox { left: 50, top: 50, right: 150, bottom: 150, confidence: 0.9 };
        let mut model = Fixed([0.0, 0.0, 0.0, 1.0, 0.0]);
        let sample = score_face(&mut model, &img, &bbox).unwrap();
        assert!(approx(sample.raw, 4.0));
        assert!(approx(sample.public, 8.0));
    }

    #[test]
    fn test_score_face_rejects_non_finite() {
        let img = RgbImage::from_pixel(200, 200, image::Rgb([90, 90, 90]));
        let bbox = BoundingBox { left: 50, top: 50, right: 150, bottom: 150, confidence: 0.9 };
        let mut model = Fixed([f32::NAN, 0.0, 0.0, 1.0, 0.0]);
        assert!(matches!(
            score_face(&mut model, &img, &bbox),
            Err(ScorerError::InferenceFailed(_))
        ));
    }
}
