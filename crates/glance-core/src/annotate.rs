//! Diagnostic copies of evaluated photos: detected boxes and their public
//! scores drawn on the normalized image.

use crate::types::{BoundingBox, ScoreSample};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: u32 = 3;
const TEXT_SCALE: i32 = 4;

/// Draw every scored face onto a copy of `image`.
pub fn annotate(image: &RgbImage, faces: &[(BoundingBox, ScoreSample)]) -> RgbImage {
    let mut out = image.clone();
    for (bbox, sample) in faces {
        for inset in 0..BOX_THICKNESS {
            let w = bbox.width().saturating_sub(2 * inset);
            let h = bbox.height().saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at((bbox.left + inset) as i32, (bbox.top + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(&mut out, rect, BOX_COLOR);
        }
        // Text sits just above the bottom-left corner of the box.
        let label = format!("{:.2}", sample.public);
        let y = bbox.bottom as i32 - 6 * TEXT_SCALE;
        draw_text(&mut out, bbox.left as i32 + BOX_THICKNESS as i32, y, &label);
    }
    out
}

/// Write an annotated image to `<root>/<profile_dir>/<file_name>`.
pub fn save(root: &Path, profile_dir: &str, file_name: &str, image: &RgbImage) -> Result<PathBuf, image::ImageError> {
    let dir = root.join(profile_dir);
    std::fs::create_dir_all(&dir).map_err(image::ImageError::IoError)?;
    let path = dir.join(file_name);
    image.save(&path)?;
    tracing::info!(path = %path.display(), "annotated photo written");
    Ok(path)
}

/// 3×5 bitmap glyphs for the characters a score label can contain.
fn glyph(ch: char) -> [u8; 5] {
    match ch {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        _ => [0; 5],
    }
}

fn draw_text(img: &mut RgbImage, x: i32, y: i32, text: &str) {
    let (w, h) = (img.width() as i32, img.height() as i32);
    for (i, ch) in text.chars().enumerate() {
        let cx = x + i as i32 * 4 * TEXT_SCALE;
        for (row, bits) in glyph(ch).iter().enumerate() {
            for col in 0..3 {
                if (bits >> (2 - col)) & 1 == 0 {
                    continue;
                }
                for dy in 0..TEXT_SCALE {
                    for dx in 0..TEXT_SCALE {
                        let px = cx + col * TEXT_SCALE + dx;
                        let py = y + row as i32 * TEXT_SCALE + dy;
                        if px >= 0 && py >= 0 && px < w && py < h {
                            img.put_pixel(px as u32, py as u32, TEXT_COLOR);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face() -> (BoundingBox, ScoreSample) {
        (
            BoundingBox { left: 20, top: 20, right: 120, bottom: 140, confidence: 0.9 },
            ScoreSample { raw: 3.0, public: 5.83 },
        )
    }

    #[test]
    fn test_annotate_draws_box_border() {
        let img = RgbImage::new(200, 200);
        let out = annotate(&img, &[face()]);
        assert_eq!(*out.get_pixel(20, 60), BOX_COLOR);
        assert_eq!(*out.get_pixel(22, 60), BOX_COLOR);
        // Interior untouched
        assert_eq!(*out.get_pixel(70, 60), Rgb([0, 0, 0]));
        // Source untouched
        assert_eq!(*img.get_pixel(20, 60), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_annotate_draws_label() {
        let img = RgbImage::new(200, 200);
        let out = annotate(&img, &[face()]);
        assert!(out.pixels().any(|p| *p == TEXT_COLOR));
    }

    #[test]
    fn test_annotate_box_at_image_edge() {
        let img = RgbImage::new(50, 50);
        let bbox = BoundingBox { left: 40, top: 40, right: 50, bottom: 50, confidence: 0.9 };
        let out = annotate(&img, &[(bbox, ScoreSample { raw: 1.0, public: 2.5 })]);
        assert_eq!(*out.get_pixel(40, 45), BOX_COLOR);
        assert_eq!(out.dimensions(), (50, 50));
    }

    #[test]
    fn test_save_creates_profile_dir() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::new(10, 10);
        let path = save(dir.path(), "Ana - 27 year(s) - 2 photo(s)", "abc.png", &img).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(dir.path().join("Ana - 27 year(s) - 2 photo(s)")));
    }
}
