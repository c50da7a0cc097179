//! Working-resolution normalization applied before face localization.

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Images taller or wider than this are scaled down to it.
pub const MAX_SIDE: u32 = 1280;
/// Images with either side below this are doubled.
pub const MIN_SIDE: u32 = 640;

/// Compute the normalized `(width, height)` for an image.
///
/// First match wins:
/// 1. height > 1280: height becomes 1280, width scaled by the same ratio
/// 2. width > 1280: width becomes 1280, height scaled by the same ratio
/// 3. either side < 640: both sides doubled
/// 4. otherwise unchanged
///
/// Scaled sides are truncated and never drop below 1.
pub fn target_dimensions(width: u32, height: u32) -> (u32, u32) {
    let (w, h) = if height > MAX_SIDE {
        let w = (width as f64 * MAX_SIDE as f64 / height as f64) as u32;
        (w, MAX_SIDE)
    } else if width > MAX_SIDE {
        let h = (height as f64 * MAX_SIDE as f64 / width as f64) as u32;
        (MAX_SIDE, h)
    } else if height < MIN_SIDE || width < MIN_SIDE {
        (width * 2, height * 2)
    } else {
        (width, height)
    };
    (w.max(1), h.max(1))
}

/// Resize `image` to its working resolution using bilinear filtering.
pub fn normalize(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let (new_w, new_h) = target_dimensions(width, height);
    if (new_w, new_h) == (width, height) {
        return image.clone();
    }
    tracing::debug!(width, height, new_w, new_h, "normalizing image");
    imageops::resize(image, new_w, new_h, FilterType::Triangle)
}
