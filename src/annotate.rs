use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::models::Detection;
use crate::pipeline::BoundingBox;

pub const PASS_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const FAIL_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const LINE_THICKNESS: u32 = 2;
const LABEL_OFFSET: i32 = 10;
const LABEL_SCALE: f32 = 16.0;

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading font {}", path.display()))?;
    FontVec::try_from_vec(bytes)
        .map_err(|_| anyhow::anyhow!("invalid font file: {}", path.display()))
}

/// Rectangle `LINE_THICKNESS` pixels wide, drawn inward from the box edge
pub fn draw_box(img: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let bbox = bbox.clamp_to(img.width(), img.height());
    for inset in 0..LINE_THICKNESS {
        let width = bbox.width.saturating_sub(2 * inset);
        let height = bbox.height.saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at((bbox.x + inset) as i32, (bbox.y + inset) as i32).of_size(width, height);
        draw_hollow_rect_mut(img, rect, color);
    }
}

/// Draw every detection box, with its caption when a font is available
pub fn draw_detections(
    img: &mut RgbImage,
    detections: &[Detection],
    color: Rgb<u8>,
    font: Option<&FontVec>,
) {
    for detection in detections {
        draw_box(img, &detection.bbox, color);

        if let Some(font) = font {
            let y = (detection.bbox.y as i32 - LABEL_OFFSET).max(0);
            draw_text_mut(
                img,
                color,
                detection.bbox.x as i32,
                y,
                PxScale::from(LABEL_SCALE),
                font,
                &detection.caption(),
            );
        }
    }
}

/// Full image with each person box coloured by its verdict
pub fn draw_overview(original: &RgbImage, persons: &[(BoundingBox, bool)]) -> RgbImage {
    let mut overview = original.clone();
    for (bbox, passed) in persons {
        let color = if *passed { PASS_COLOR } else { FAIL_COLOR };
        draw_box(&mut overview, bbox, color);
    }
    overview
}
