//! Per-profile aggregation of face scores.
//!
//! The median keeps group photos from dragging the profile score around: a
//! bystander's unusually high or low face moves a mean, not a median.

use crate::types::{ProfileScore, ScoreSample};

/// Statistical median; the mean of the two middle values for even lengths.
///
/// Returns `None` for an empty slice.
pub fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Median of the public scores, or `None` when no face was scored.
pub fn aggregate(samples: &[ScoreSample]) -> Option<ProfileScore> {
    let public: Vec<f32> = samples.iter().map(|s| s.public).collect();
    median(&public).map(|value| ProfileScore {
        value,
        samples: samples.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(public: f32) -> ScoreSample {
        ScoreSample { raw: 0.0, public }
    }

    #[test]
    fn test_aggregate_empty_is_absent() {
        assert_eq!(aggregate(&[]), None);
    }

    #[test]
    fn test_aggregate_single() {
        let score = aggregate(&[sample(6.3)]).unwrap();
        assert_eq!(score.value, 6.3);
        assert_eq!(score.samples, 1);
    }

    #[test]
    fn test_aggregate_is_median_not_mean() {
        let score = aggregate(&[sample(2.0), sample(9.0), sample(5.0)]).unwrap();
        assert_eq!(score.value, 5.0);
        assert_eq!(score.samples, 3);
    }

    #[test]
    fn test_median_even_count() {
        assert_eq!(median(&[8.0, 4.0]), Some(6.0));
        assert_eq!(median(&[1.0, 7.0, 3.0, 5.0]), Some(4.0));
    }

    #[test]
    fn test_median_ignores_input_order() {
        assert_eq!(median(&[9.0, 2.0, 5.0]), median(&[2.0, 5.0, 9.0]));
    }
}
