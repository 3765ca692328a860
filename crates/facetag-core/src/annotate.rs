//! Annotator.
//!
//! Draws a rectangle around each detected face and a filled tag holding the
//! resolved label just below it, onto an in-memory copy of the source image.

use crate::types::BoundingBox;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::PathBuf;

/// Horizontal padding inside the label tag, split 5 px left of the text.
const TAG_PAD_X: i32 = 10;
const TAG_PAD_Y: i32 = 5;
const TEXT_INSET_X: i32 = 5;

/// Drawing style for face annotations.
#[derive(Debug, Clone)]
pub struct AnnotationStyle {
    pub box_color: Rgb<u8>,
    pub text_color: Rgb<u8>,
    pub box_thickness: u32,
    pub font_size: f32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            box_color: Rgb([0, 255, 0]),
            text_color: Rgb([255, 255, 255]),
            box_thickness: 3,
            font_size: 20.0,
        }
    }
}

/// Load the first usable font from a candidate list.
///
/// Returns `None` when no candidate can be read and parsed; the caller then
/// draws boxes without text tags. A warning is logged so the degradation is
/// visible.
pub fn load_font(candidates: &[PathBuf]) -> Option<FontVec> {
    for path in candidates {
        match std::fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    tracing::debug!(path = %path.display(), "label font loaded");
                    return Some(font);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "font file unusable");
                }
            },
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "font candidate unreadable");
            }
        }
    }
    tracing::warn!("no usable label font found; drawing boxes without text");
    None
}

/// Draw one face annotation: the bounding rectangle, and when a font is
/// available, a filled label tag positioned just below the region.
pub fn draw_face(
    image: &mut RgbImage,
    face: &BoundingBox,
    label: &str,
    font: Option<&FontVec>,
    style: &AnnotationStyle,
) {
    let left = face.left();
    let top = face.top();
    let bottom = face.bottom();
    let width = face.width.round().max(1.0) as u32;
    let height = face.height.round().max(1.0) as u32;

    draw_thick_hollow_rect(image, left, top, width, height, style);

    let Some(font) = font else {
        return;
    };

    let scale = PxScale::from(style.font_size);
    let (text_w, text_h) = text_size(scale, font, label);

    let tag = Rect::at(left, bottom).of_size(text_w + TAG_PAD_X as u32, text_h + TAG_PAD_Y as u32);
    draw_filled_rect_mut(image, tag, style.box_color);
    draw_text_mut(
        image,
        style.text_color,
        left + TEXT_INSET_X,
        bottom,
        scale,
        font,
        label,
    );
}

/// Hollow rectangle with the configured stroke width, drawn as nested
/// one-pixel rectangles inset toward the center.
fn draw_thick_hollow_rect(
    image: &mut RgbImage,
    left: i32,
    top: i32,
    width: u32,
    height: u32,
    style: &AnnotationStyle,
) {
    for inset in 0..style.box_thickness {
        let w = width.saturating_sub(2 * inset);
        let h = height.saturating_sub(2 * inset);
        if w == 0 || h == 0 {
            break;
        }
        let rect = Rect::at(left + inset as i32, top + inset as i32).of_size(w, h);
        draw_hollow_rect_mut(image, rect, style.box_color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width: w,
            height: h,
            confidence: 0.9,
            landmarks: None,
        }
    }

    #[test]
    fn test_rectangle_drawn_with_thickness() {
        let mut image = RgbImage::new(100, 100);
        let style = AnnotationStyle::default();
        draw_face(&mut image, &face(10.0, 10.0, 40.0, 40.0), "alice", None, &style);

        // Outer edge and two inset rings carry the box color.
        assert_eq!(*image.get_pixel(10, 10), style.box_color);
        assert_eq!(*image.get_pixel(11, 11), style.box_color);
        assert_eq!(*image.get_pixel(12, 12), style.box_color);
        // Interior is untouched.
        assert_eq!(*image.get_pixel(30, 30), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_no_font_means_no_tag() {
        let mut image = RgbImage::new(100, 100);
        let style = AnnotationStyle::default();
        draw_face(&mut image, &face(10.0, 10.0, 20.0, 20.0), "alice", None, &style);

        // The tag would sit below the box at y=30; without a font nothing is
        // filled there.
        assert_eq!(*image.get_pixel(15, 35), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_tiny_face_does_not_panic() {
        let mut image = RgbImage::new(100, 100);
        let style = AnnotationStyle::default();
        // Thinner than twice the stroke width.
        draw_face(&mut image, &face(5.0, 5.0, 3.0, 3.0), "x", None, &style);
        assert_eq!(*image.get_pixel(5, 5), style.box_color);
    }

    #[test]
    fn test_load_font_empty_candidates() {
        assert!(load_font(&[]).is_none());
    }

    #[test]
    fn test_load_font_unreadable_candidates() {
        let candidates = vec![PathBuf::from("/nonexistent/font.ttf")];
        assert!(load_font(&candidates).is_none());
    }

    #[test]
    fn test_load_font_rejects_non_font_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(load_font(&[path]).is_none());
    }
}
