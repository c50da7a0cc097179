//! Profile evaluation: fetch → decode → normalize → locate → score →
//! aggregate → decide.
//!
//! Photo-level failures are logged and never escalate past the profile; a
//! profile that yields no score is rejected.

use crate::aggregate::aggregate;
use crate::annotate;
use crate::decision::{decide, Threshold};
use crate::detector::FaceLocator;
use crate::fetch::{self, PhotoFetcher};
use crate::normalize::normalize;
use crate::scorer::{BeautyModel, ScorerError};
use crate::session::ScoringSession;
use crate::types::{BoundingBox, Decision, Profile, ProfileScore, ScoreSample};
use image::RgbImage;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    pub threshold: Threshold,
    /// Root directory for annotated copies; `None` disables annotation.
    pub annotate_dir: Option<PathBuf>,
}

/// What happened to one photo of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PhotoOutcome {
    /// At least one face was found; `faces` of them were scored.
    Scored { faces: usize },
    FetchFailed,
    Undecodable,
    DetectorFailed,
    NoFace,
    /// A face crop could not be resized; the rest of the profile was skipped.
    UnresizableCrop { scored: usize },
    /// Not looked at because an earlier photo aborted the profile.
    NotEvaluated,
}

/// Result of evaluating one profile.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub score: Option<ProfileScore>,
    pub samples: Vec<ScoreSample>,
    pub photos: Vec<PhotoOutcome>,
}

/// Outcome of a single photo plus whether the profile must stop here.
struct PhotoResult {
    outcome: PhotoOutcome,
    samples: Vec<ScoreSample>,
    abort: bool,
}

impl PhotoResult {
    fn skipped(outcome: PhotoOutcome) -> Self {
        Self { outcome, samples: Vec::new(), abort: false }
    }
}

/// Evaluates profiles one at a time with a face locator, a beauty model and
/// a photo fetcher.
pub struct ProfileEvaluator<L, M, F> {
    locator: L,
    model: M,
    fetcher: F,
    config: EvaluatorConfig,
}

impl<L, M, F> ProfileEvaluator<L, M, F>
where
    L: FaceLocator,
    M: BeautyModel,
    F: PhotoFetcher,
{
    pub fn new(locator: L, model: M, fetcher: F, config: EvaluatorConfig) -> Self {
        Self { locator, model, fetcher, config }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Evaluate every photo of `profile` and decide it.
    pub fn evaluate_profile(&mut self, profile: &Profile) -> Evaluation {
        tracing::info!(profile = %profile.name, photos = profile.photos.len(), "evaluating profile");

        let Self { locator, model, fetcher, config } = self;
        let mut session = ScoringSession::begin(model);
        let results_dir = profile.results_dir_name();

        let mut samples = Vec::new();
        let mut photos = Vec::with_capacity(profile.photos.len());
        let mut aborted = false;

        for (i, url) in profile.photos.iter().enumerate() {
            let index = i + 1;
            if aborted {
                photos.push(PhotoOutcome::NotEvaluated);
                continue;
            }
            let result = evaluate_photo(
                locator,
                &mut session,
                fetcher,
                config,
                &profile.name,
                &results_dir,
                index,
                url,
            );
            samples.extend(result.samples);
            photos.push(result.outcome);
            aborted = result.abort;
        }
        let faces = session.scored();
        drop(session);

        let score = aggregate(&samples);
        let decision = decide(score.as_ref(), config.threshold);
        match &score {
            Some(s) => tracing::info!(
                profile = %profile.name,
                score = format_args!("{:.2}", s.value),
                faces,
                threshold = config.threshold.value(),
                %decision,
                "profile decided"
            ),
            None => tracing::warn!(
                profile = %profile.name,
                faces,
                %decision,
                "no usable face in any photo, profile invalid"
            ),
        }

        Evaluation { decision, score, samples, photos }
    }
}

#[allow(clippy::too_many_arguments)]
fn evaluate_photo<L, M, F>(
    locator: &mut L,
    session: &mut ScoringSession<'_, M>,
    fetcher: &F,
    config: &EvaluatorConfig,
    profile: &str,
    results_dir: &str,
    index: usize,
    url: &str,
) -> PhotoResult
where
    L: FaceLocator,
    M: BeautyModel,
    F: PhotoFetcher,
{
    let Some(bytes) = fetcher.fetch(url) else {
        tracing::warn!(profile, photo = index, kind = "fetch_failed", "photo unavailable, skipping");
        return PhotoResult::skipped(PhotoOutcome::FetchFailed);
    };

    let image = match decode(&bytes) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(profile, photo = index, kind = "undecodable", error = %e, "cannot read photo, skipping");
            return PhotoResult::skipped(PhotoOutcome::Undecodable);
        }
    };
    let image = normalize(&image);

    let boxes = match locator.locate(&image) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(profile, photo = index, kind = "detector_failed", error = %e, "face detection failed, skipping");
            return PhotoResult::skipped(PhotoOutcome::DetectorFailed);
        }
    };
    if boxes.is_empty() {
        // Small or distant faces are not found without upsampling.
        tracing::info!(profile, photo = index, "no face found, discarding photo");
        return PhotoResult::skipped(PhotoOutcome::NoFace);
    }
    tracing::info!(profile, photo = index, faces = boxes.len(), "face(s) found");

    let mut scored: Vec<(BoundingBox, ScoreSample)> = Vec::with_capacity(boxes.len());
    let mut abort = false;
    for bbox in &boxes {
        match session.score(&image, bbox) {
            Ok(sample) => {
                tracing::info!(profile, photo = index, score = format_args!("{:.2}", sample.public), "face scored");
                scored.push((*bbox, sample));
            }
            Err(e @ ScorerError::UnresizableCrop { .. }) => {
                tracing::error!(
                    profile,
                    photo = index,
                    kind = "unresizable_crop",
                    error = %e,
                    "partial face, skipping remaining photos of this profile"
                );
                abort = true;
                break;
            }
            Err(e) => {
                tracing::warn!(profile, photo = index, kind = "inference_failed", error = %e, "face not scored");
            }
        }
    }

    if let Some(root) = &config.annotate_dir {
        if !scored.is_empty() {
            let annotated = annotate::annotate(&image, &scored);
            if let Err(e) = annotate::save(root, results_dir, &fetch::photo_file_name(url), &annotated) {
                tracing::warn!(profile, photo = index, error = %e, "could not write annotated photo");
            }
        }
    }

    let outcome = if abort {
        PhotoOutcome::UnresizableCrop { scored: scored.len() }
    } else {
        PhotoOutcome::Scored { faces: scored.len() }
    };
    PhotoResult {
        outcome,
        samples: scored.into_iter().map(|(_, s)| s).collect(),
        abort,
    }
}

/// Decode fetched bytes into an RGB image with positive dimensions.
pub fn decode(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    let img = image::load_from_memory(bytes)?.to_rgb8();
    if img.width() == 0 || img.height() == 0 {
        return Err(image::ImageError::Limits(image::error::LimitError::from_kind(
            image::error::LimitErrorKind::DimensionError,
        )));
    }
    Ok(img)
}
