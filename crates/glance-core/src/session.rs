//! Scoped access to the beauty model for one profile evaluation.

use crate::scorer::{self, BeautyModel, ScorerError};
use crate::types::{BoundingBox, ScoreSample};
use image::RgbImage;

/// Exclusive borrow of a [`BeautyModel`] for the duration of one profile.
///
/// The model is reset when the session is dropped, whichever way the
/// evaluation ends.
pub struct ScoringSession<'m, M: BeautyModel + ?Sized> {
    model: &'m mut M,
    scored: usize,
}

impl<'m, M: BeautyModel + ?Sized> ScoringSession<'m, M> {
    pub fn begin(model: &'m mut M) -> Self {
        Self { model, scored: 0 }
    }

    /// Score one face of `image`.
    pub fn score(&mut self, image: &RgbImage, bbox: &BoundingBox) -> Result<ScoreSample, ScorerError> {
        let sample = scorer::score_face(&mut *self.model, image, bbox)?;
        self.scored += 1;
        Ok(sample)
    }

    /// Faces scored successfully in this session.
    pub fn scored(&self) -> usize {
        self.scored
    }
}

impl<M: BeautyModel + ?Sized> Drop for ScoringSession<'_, M> {
    fn drop(&mut self) {
        self.model.reset();
        tracing::trace!(scored = self.scored, "scoring session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::BEAUTY_CLASSES;
    use ndarray::Array4;

    #[derive(Default)]
    struct Counting {
        predictions: usize,
        resets: usize,
    }

    impl BeautyModel for Counting {
        fn predict(&mut self, _input: &Array4<f32>) -> Result<[f32; BEAUTY_CLASSES], ScorerError> {
            self.predictions += 1;
            Ok([0.0, 1.0, 0.0, 0.0, 0.0])
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    #[test]
    fn test_reset_on_drop() {
        let mut model = Counting::default();
        let img = RgbImage::new(64, 64);
        let bbox = BoundingBox { left: 0, top: 0, right: 32, bottom: 32, confidence: 1.0 };
        {
            let mut session = ScoringSession::begin(&mut model);
            session.score(&img, &bbox).unwrap();
            session.score(&img, &bbox).unwrap();
            assert_eq!(session.scored(), 2);
        }
        assert_eq!(model.predictions, 2);
        assert_eq!(model.resets, 1);
    }

    #[test]
    fn test_reset_after_failed_score() {
        let mut model = Counting::default();
        let img = RgbImage::new(64, 64);
        let outside = BoundingBox { left: 100, top: 0, right: 120, bottom: 32, confidence: 1.0 };

        let run = |model: &mut Counting| -> Result<ScoreSample, ScorerError> {
            let mut session = ScoringSession::begin(model);
            session.score(&img, &outside)
        };
        assert!(run(&mut model).is_err());
        assert_eq!(model.predictions, 0);
        assert_eq!(model.resets, 1);
    }
}
