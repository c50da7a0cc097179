use std::collections::{HashMap, VecDeque};

use glance_core::detector::DetectorError;
use glance_core::scorer::{ScorerError, BEAUTY_CLASSES};
use glance_core::{
    BeautyModel, BoundingBox, Decision, EvaluatorConfig, FaceLocator, PhotoFetcher, PhotoOutcome, Profile,
    ProfileEvaluator, Threshold,
};
use image::RgbImage;
use ndarray::Array4;

/// Returns queued detection results, one per call; empty once exhausted.
#[derive(Default)]
struct ScriptedLocator {
    results: VecDeque<Result<Vec<BoundingBox>, String>>,
    calls: usize,
}

impl ScriptedLocator {
    fn new(results: Vec<Result<Vec<BoundingBox>, String>>) -> Self {
        Self { results: results.into(), calls: 0 }
    }
}

impl FaceLocator for ScriptedLocator {
    fn locate(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        // 100x80 test photos are doubled by normalization.
        assert_eq!(image.dimensions(), (200, 160));
        self.calls += 1;
        match self.results.pop_front() {
            Some(Ok(boxes)) => Ok(boxes),
            Some(Err(msg)) => Err(DetectorError::InferenceFailed(msg)),
            None => Ok(Vec::new()),
        }
    }
}

/// Returns queued class distributions and counts resets.
#[derive(Default)]
struct ScriptedModel {
    distributions: VecDeque<[f32; BEAUTY_CLASSES]>,
    predictions: usize,
    resets: usize,
}

impl ScriptedModel {
    fn new(distributions: Vec<[f32; BEAUTY_CLASSES]>) -> Self {
        Self { distributions: distributions.into(), ..Default::default() }
    }
}

impl BeautyModel for ScriptedModel {
    fn predict(&mut self, _input: &Array4<f32>) -> Result<[f32; BEAUTY_CLASSES], ScorerError> {
        self.predictions += 1;
        self.distributions
            .pop_front()
            .ok_or_else(|| ScorerError::InferenceFailed("script exhausted".into()))
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

#[derive(Default)]
struct MemoryFetcher {
    photos: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.photos.insert(url.to_string(), bytes);
        self
    }
}

impl PhotoFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        self.photos.get(url).cloned()
    }
}

fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_fn(100, 80, |x, y| image::Rgb([(x * 2) as u8, (y * 3) as u8, 90]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn face() -> BoundingBox {
    BoundingBox { left: 40, top: 20, right: 140, bottom: 140, confidence: 0.95 }
}

fn one_hot(level: usize) -> [f32; BEAUTY_CLASSES] {
    let mut p = [0.0; BEAUTY_CLASSES];
    p[level - 1] = 1.0;
    p
}

fn config(threshold: f32) -> EvaluatorConfig {
    EvaluatorConfig { threshold: Threshold::new(threshold).unwrap(), annotate_dir: None }
}

fn three_photo_fetcher() -> MemoryFetcher {
    MemoryFetcher::default()
        .with("p1", png_bytes())
        .with("p2", png_bytes())
        .with("p3", png_bytes())
}

fn profile(photos: &[&str]) -> Profile {
    Profile::new("Ana", Some(27), photos.iter().map(|s| s.to_string()).collect())
}

#[test]
fn faces_in_first_and_last_photo_accepts_on_median() {
    let locator = ScriptedLocator::new(vec![Ok(vec![face()]), Ok(vec![]), Ok(vec![face()])]);
    // raw 2.0 and raw 3.5
    let model = ScriptedModel::new(vec![one_hot(2), [0.0, 0.0, 0.5, 0.5, 0.0]]);
    let mut evaluator = ProfileEvaluator::new(locator, model, three_photo_fetcher(), config(5.0));

    let eval = evaluator.evaluate_profile(&profile(&["p1", "p2", "p3"]));

    assert_eq!(
        eval.photos,
        vec![
            PhotoOutcome::Scored { faces: 1 },
            PhotoOutcome::NoFace,
            PhotoOutcome::Scored { faces: 1 },
        ]
    );
    assert_eq!(eval.samples.len(), 2);
    assert!((eval.samples[0].raw - 2.0).abs() < 1e-4);
    assert!((eval.samples[0].public - (4.0 + 0.1 * 1.5 / 0.9)).abs() < 1e-4);
    assert!((eval.samples[1].public - 6.75).abs() < 1e-4);

    let score = eval.score.unwrap();
    assert_eq!(score.samples, 2);
    let expected = ((4.0 + 0.1 * 1.5 / 0.9) + 6.75) / 2.0;
    assert!((score.value - expected).abs() < 1e-4, "median = {}", score.value);
    assert_eq!(eval.decision, Decision::Accept);
    assert_eq!(evaluator.model().resets, 1);
}

#[test]
fn no_faces_rejects_regardless_of_threshold() {
    for threshold in [-100.0, 0.0, 5.0, 9.0] {
        let locator = ScriptedLocator::new(vec![Ok(vec![]), Ok(vec![]), Ok(vec![])]);
        let mut evaluator =
            ProfileEvaluator::new(locator, ScriptedModel::default(), three_photo_fetcher(), config(threshold));

        let eval = evaluator.evaluate_profile(&profile(&["p1", "p2", "p3"]));

        assert_eq!(eval.decision, Decision::Reject);
        assert!(eval.score.is_none());
        assert!(eval.photos.iter().all(|p| *p == PhotoOutcome::NoFace));
        assert_eq!(evaluator.model().predictions, 0);
        assert_eq!(evaluator.model().resets, 1);
    }
}

#[test]
fn empty_profile_rejects() {
    let mut evaluator = ProfileEvaluator::new(
        ScriptedLocator::default(),
        ScriptedModel::default(),
        MemoryFetcher::default(),
        config(5.0),
    );
    let eval = evaluator.evaluate_profile(&profile(&[]));
    assert_eq!(eval.decision, Decision::Reject);
    assert!(eval.photos.is_empty());
    assert_eq!(evaluator.model().resets, 1);
}

#[test]
fn unavailable_and_unreadable_photos_are_skipped() {
    let fetcher = MemoryFetcher::default()
        .with("garbage", b"not an image".to_vec())
        .with("good", png_bytes());
    let locator = ScriptedLocator::new(vec![Ok(vec![face()])]);
    let model = ScriptedModel::new(vec![one_hot(4)]);
    let mut evaluator = ProfileEvaluator::new(locator, model, fetcher, config(5.0));

    let eval = evaluator.evaluate_profile(&profile(&["missing", "garbage", "good"]));

    assert_eq!(
        eval.photos,
        vec![PhotoOutcome::FetchFailed, PhotoOutcome::Undecodable, PhotoOutcome::Scored { faces: 1 }]
    );
    assert!((eval.score.unwrap().value - 8.0).abs() < 1e-4);
    assert_eq!(eval.decision, Decision::Accept);
}

#[test]
fn detector_failure_skips_photo_only() {
    let locator = ScriptedLocator::new(vec![Err("boom".into()), Ok(vec![face()]), Ok(vec![])]);
    let model = ScriptedModel::new(vec![one_hot(1)]);
    let mut evaluator = ProfileEvaluator::new(locator, model, three_photo_fetcher(), config(5.0));

    let eval = evaluator.evaluate_profile(&profile(&["p1", "p2", "p3"]));

    assert_eq!(
        eval.photos,
        vec![PhotoOutcome::DetectorFailed, PhotoOutcome::Scored { faces: 1 }, PhotoOutcome::NoFace]
    );
    assert!((eval.score.unwrap().value - 2.5).abs() < 1e-4);
    assert_eq!(eval.decision, Decision::Reject);
}

#[test]
fn unresizable_crop_aborts_remaining_photos() {
    let outside = BoundingBox { left: 500, top: 500, right: 600, bottom: 600, confidence: 0.9 };
    let locator = ScriptedLocator::new(vec![Ok(vec![face()]), Ok(vec![outside, face()]), Ok(vec![face()])]);
    let model = ScriptedModel::new(vec![one_hot(4), one_hot(5), one_hot(5)]);
    let mut evaluator = ProfileEvaluator::new(locator, model, three_photo_fetcher(), config(5.0));

    let eval = evaluator.evaluate_profile(&profile(&["p1", "p2", "p3"]));

    assert_eq!(
        eval.photos,
        vec![
            PhotoOutcome::Scored { faces: 1 },
            PhotoOutcome::UnresizableCrop { scored: 0 },
            PhotoOutcome::NotEvaluated,
        ]
    );
    // Only the first photo's face counts.
    let score = eval.score.unwrap();
    assert_eq!(score.samples, 1);
    assert!((score.value - 8.0).abs() < 1e-4);
    assert_eq!(eval.decision, Decision::Accept);
    assert_eq!(evaluator.model().predictions, 1);
    assert_eq!(evaluator.model().resets, 1);
}

#[test]
fn inference_failure_skips_face_only() {
    let locator = ScriptedLocator::new(vec![Ok(vec![face(), face()])]);
    // One distribution for two faces: the second prediction fails.
    let model = ScriptedModel::new(vec![one_hot(3)]);
    let fetcher = MemoryFetcher::default().with("p1", png_bytes());
    let mut evaluator = ProfileEvaluator::new(locator, model, fetcher, config(5.0));

    let eval = evaluator.evaluate_profile(&profile(&["p1"]));

    assert_eq!(eval.photos, vec![PhotoOutcome::Scored { faces: 1 }]);
    assert!((eval.score.unwrap().value - (5.5 + 0.2 / 0.6)).abs() < 1e-4);
}

#[test]
fn model_is_reset_after_every_profile() {
    let locator = ScriptedLocator::new(vec![Ok(vec![face()]), Ok(vec![face()])]);
    let model = ScriptedModel::new(vec![one_hot(3), one_hot(3)]);
    let fetcher = MemoryFetcher::default().with("p1", png_bytes());
    let mut evaluator = ProfileEvaluator::new(locator, model, fetcher, config(5.0));

    evaluator.evaluate_profile(&profile(&["p1"]));
    evaluator.evaluate_profile(&profile(&["p1"]));
    evaluator.evaluate_profile(&profile(&["missing"]));

    assert_eq!(evaluator.model().resets, 3);
}

#[test]
fn annotated_copy_is_written_per_profile() {
    let dir = tempfile::tempdir().unwrap();
    let url = "https://cdn.example/u/640x800_abc.png";
    let fetcher = MemoryFetcher::default().with(url, png_bytes());
    let locator = ScriptedLocator::new(vec![Ok(vec![face()])]);
    let model = ScriptedModel::new(vec![one_hot(3)]);
    let config = EvaluatorConfig {
        threshold: Threshold::new(5.0).unwrap(),
        annotate_dir: Some(dir.path().to_path_buf()),
    };
    let mut evaluator = ProfileEvaluator::new(locator, model, fetcher, config);

    let eval = evaluator.evaluate_profile(&profile(&[url]));

    assert_eq!(eval.decision, Decision::Accept);
    let written = dir.path().join("Ana - 27 year(s) - 1 photo(s)").join("abc.png");
    assert!(written.exists(), "missing {}", written.display());
    let annotated = image::open(&written).unwrap().to_rgb8();
    assert_eq!(annotated.dimensions(), (200, 160));
    assert_eq!(annotated.get_pixel(40, 80).0, [0, 255, 0]);
}
