//! Accept/reject decision against the configured score threshold.

use crate::types::{Decision, ProfileScore};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ThresholdError {
    #[error("score threshold must be a finite number, got {0}")]
    NotFinite(f32),
}

/// A validated score threshold on the public scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold(f32);

impl Threshold {
    pub fn new(value: f32) -> Result<Self, ThresholdError> {
        if value.is_finite() {
            Ok(Self(value))
        } else {
            Err(ThresholdError::NotFinite(value))
        }
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

/// Decide a profile. Ties go to [`Decision::Accept`]; an absent score is a
/// [`Decision::Reject`].
pub fn decide(score: Option<&ProfileScore>, threshold: Threshold) -> Decision {
    match score {
        Some(s) if s.value >= threshold.value() => Decision::Accept,
        _ => Decision::Reject,
    }
}
