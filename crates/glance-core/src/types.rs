use serde::{Deserialize, Serialize};

/// Integer bounding box of a detected face, in normalized-image pixels.
///
/// `right` and `bottom` are exclusive, so `right - left` is the width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub confidence: f32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Build a box from float corner coordinates, clamped to `width` × `height`.
    ///
    /// Returns `None` when nothing of the box survives clamping.
    pub fn from_corners(
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        confidence: f32,
        width: u32,
        height: u32,
    ) -> Option<Self> {
        if !(x1.is_finite() && y1.is_finite() && x2.is_finite() && y2.is_finite()) {
            return None;
        }
        let clamp = |v: f32, max: u32| v.max(0.0).min(max as f32) as u32;
        let bbox = Self {
            left: clamp(x1, width),
            top: clamp(y1, height),
            right: clamp(x2, width),
            bottom: clamp(y2, height),
            confidence,
        };
        bbox.is_valid_within(width, height).then_some(bbox)
    }

    /// `left < right`, `top < bottom`, and fully inside a `width` × `height` image.
    pub fn is_valid_within(&self, width: u32, height: u32) -> bool {
        self.left < self.right
            && self.top < self.bottom
            && self.right <= width
            && self.bottom <= height
    }
}

/// Score of a single face: the regressor's weighted output and its remapped
/// public value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSample {
    /// Weighted sum of the 5-class distribution, in [1, 5].
    pub raw: f32,
    /// `raw` after the piecewise-linear remap, roughly [2.5, 9].
    pub public: f32,
}

/// Aggregate score of one profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileScore {
    /// Median of the public scores.
    pub value: f32,
    /// Number of face samples the median was taken over.
    pub samples: usize,
}

/// Outcome for one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Accept => f.write_str("accept"),
            Decision::Reject => f.write_str("reject"),
        }
    }
}

/// A candidate profile: metadata plus ordered photo locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub photos: Vec<String>,
}

impl Profile {
    pub fn new(name: impl Into<String>, age: Option<u32>, photos: Vec<String>) -> Self {
        Self {
            name: name.into(),
            age,
            photos,
        }
    }

    /// Directory name for this profile's diagnostic output,
    /// e.g. `"Ana - 27 year(s) - 3 photo(s)"`.
    pub fn results_dir_name(&self) -> String {
        let age = self
            .age
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "{} - {} year(s) - {} photo(s)",
            sanitize_path_component(&self.name),
            age,
            self.photos.len()
        )
    }
}

/// Replace characters that cannot appear in a single path component.
fn sanitize_path_component(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}
