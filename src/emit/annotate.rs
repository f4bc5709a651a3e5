use std::fs;
use std::path::PathBuf;

use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::validate::ValidDetection;

pub const DEFAULT_BOX_THICKNESS: u32 = 3;
pub const DEFAULT_LABEL_SCALE: f32 = 20.0;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

static DEFAULT_FONT: &[u8] = include_bytes!("../../fonts/DejaVuSans.ttf");

#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationConfig {
    /// TrueType/OpenType font for confidence labels. The bundled DejaVu Sans
    /// is used when unset.
    pub font_path: Option<PathBuf>,
    pub label_scale: f32,
    pub box_thickness: u32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            label_scale: DEFAULT_LABEL_SCALE,
            box_thickness: DEFAULT_BOX_THICKNESS,
        }
    }
}

/// Draws detection boxes and confidence labels onto a copy of a frame.
pub struct Annotator {
    font: FontArc,
    scale: PxScale,
    thickness: u32,
}

impl Annotator {
    pub fn new(config: &AnnotationConfig) -> Result<Self> {
        let font = match &config.font_path {
            Some(path) => {
                let bytes = fs::read(path).with_context(|| format!("read font {}", path.display()))?;
                FontArc::try_from_vec(bytes)
                    .map_err(|_| anyhow!("{} is not a usable font", path.display()))?
            }
            None => FontArc::try_from_slice(DEFAULT_FONT)
                .map_err(|e| anyhow!("bundled label font: {}", e))?,
        };
        Ok(Self {
            font,
            scale: PxScale::from(config.label_scale),
            thickness: config.box_thickness.max(1),
        })
    }

    pub fn annotate(&self, image: &RgbImage, detections: &[ValidDetection]) -> RgbImage {
        let mut canvas = image.clone();
        for detection in detections {
            self.draw_box(&mut canvas, detection);
            let label = format!(
                "{} {:.2}",
                detection.detection.class.label(),
                detection.detection.confidence
            );
            self.draw_label(&mut canvas, detection, &label);
        }
        canvas
    }

    fn draw_box(&self, canvas: &mut RgbImage, detection: &ValidDetection) {
        let b = detection.display_box;
        if b.width() == 0 || b.height() == 0 {
            return;
        }
        // Thickness grows inward so the outline stays inside the clamped box.
        for t in 0..self.thickness {
            let (w, h) = (b.width().saturating_sub(2 * t), b.height().saturating_sub(2 * t));
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at((b.x1 + t) as i32, (b.y1 + t) as i32).of_size(w, h);
            draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
        }
    }

    fn draw_label(&self, canvas: &mut RgbImage, detection: &ValidDetection, label: &str) {
        let b = detection.display_box;
        let font = &self.font;
        let (text_width, text_height) = text_size(self.scale, font, label);
        let background_height = text_height + 4;
        let y = b.y1.saturating_sub(background_height);
        let background = Rect::at(b.x1 as i32, y as i32).of_size(text_width + 4, background_height);
        draw_filled_rect_mut(canvas, background, BOX_COLOR);
        draw_text_mut(
            canvas,
            LABEL_TEXT_COLOR,
            b.x1 as i32 + 2,
            y as i32 + 2,
            self.scale,
            font,
            label,
        );
    }
}
