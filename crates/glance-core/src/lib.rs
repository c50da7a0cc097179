//! glance-core — Profile photo scoring and accept/reject decisions.
//!
//! Uses SCRFD for face localization and a ResNet-50 label-distribution
//! regressor for beauty scoring, both running via ONNX Runtime on the CPU.

pub mod aggregate;
pub mod annotate;
pub mod decision;
pub mod detector;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod scorer;
pub mod session;
pub mod types;

pub use decision::{decide, Threshold};
pub use detector::{FaceLocator, ScrfdLocator};
pub use fetch::{FileFetcher, HttpFetcher, PhotoFetcher};
pub use pipeline::{Evaluation, EvaluatorConfig, PhotoOutcome, ProfileEvaluator};
pub use scorer::{BeautyModel, OnnxBeautyModel};
pub use session::ScoringSession;
pub use types::{BoundingBox, Decision, Profile, ProfileScore, ScoreSample};
