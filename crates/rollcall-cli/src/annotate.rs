//! Frame annotation: boxes around faces, names underneath.

use crate::session::FaceLabel;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rollcall_core::BoundingBox;
use std::path::Path;

const MATCH_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const UNKNOWN_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 24.0;
/// Gap between the box's bottom edge and the label baseline.
const LABEL_OFFSET_Y: i32 = 6;
const UNKNOWN_LABEL: &str = "Unknown";

/// Draws recognition results onto captured frames.
///
/// Label text needs a TrueType font; when none can be loaded the
/// annotator degrades to box-only rendering.
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    pub fn load(font_path: &Path) -> Self {
        let font = std::fs::read(font_path)
            .ok()
            .and_then(|bytes| FontVec::try_from_vec(bytes).ok());
        if font.is_none() {
            tracing::warn!(
                path = %font_path.display(),
                "label font unavailable; drawing boxes without names"
            );
        }
        Self { font }
    }

    pub fn annotate(&self, image: &mut RgbImage, labels: &[FaceLabel]) {
        for label in labels {
            let color = match label.name {
                Some(_) => MATCH_COLOR,
                None => UNKNOWN_COLOR,
            };
            draw_box(image, &label.bbox, color);

            if let Some(font) = &self.font {
                let text = label.name.as_deref().unwrap_or(UNKNOWN_LABEL);
                let x = label.bbox.x.max(0.0) as i32;
                let y = (label.bbox.y + label.bbox.height) as i32 + LABEL_OFFSET_Y;
                draw_text_mut(image, color, x, y, PxScale::from(LABEL_SCALE), font, text);
            }
        }
    }
}

/// Hollow rectangle with a few nested strokes for visible thickness.
/// Coordinates may hang off the frame; drawing clips.
fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    for inset in 0..BOX_THICKNESS {
        let width = bbox.width as i32 - 2 * inset;
        let height = bbox.height as i32 - 2 * inset;
        if width < 1 || height < 1 {
            break;
        }
        let rect = Rect::at(bbox.x as i32 + inset, bbox.y as i32 + inset)
            .of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}
