use anyhow::{anyhow, Result};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use imageproc::point::Point;

use crate::frame::{Frame, PixelBox};

pub const DEFAULT_MOTION_THRESHOLD: u8 = 25;
pub const DEFAULT_MIN_CONTOUR_AREA: f64 = 500.0;
pub const DEFAULT_MAX_CONTOUR_AREA: f64 = 15_000.0;
/// Sigma of a 21x21 Gaussian kernel with automatic sigma.
pub const DEFAULT_BLUR_SIGMA: f32 = 3.5;
/// Two 3x3 dilation passes.
pub const DEFAULT_DILATE_RADIUS: u8 = 2;

/// Configuration for frame differencing.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionConfig {
    /// Intensity difference a pixel must exceed to count as changed.
    pub threshold: u8,
    /// Contours at or below this area are noise (ripples, sensor flicker).
    pub min_contour_area: f64,
    /// Contours at or above this area are too large to be a bird (people, boats).
    pub max_contour_area: f64,
    pub blur_sigma: f32,
    pub dilate_radius: u8,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MOTION_THRESHOLD,
            min_contour_area: DEFAULT_MIN_CONTOUR_AREA,
            max_contour_area: DEFAULT_MAX_CONTOUR_AREA,
            blur_sigma: DEFAULT_BLUR_SIGMA,
            dilate_radius: DEFAULT_DILATE_RADIUS,
        }
    }
}

/// A bird-sized changed region, padded for classifier context.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionRegion {
    /// Polygon area of the contour that produced this region.
    pub area: f64,
    /// Padded bounding box, clamped to the frame.
    pub bbox: PixelBox,
}

/// Result of differencing two frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MotionResult {
    pub has_motion: bool,
    pub regions: Vec<MotionRegion>,
}

impl MotionResult {
    pub fn areas(&self) -> Vec<f64> {
        self.regions.iter().map(|r| r.area).collect()
    }
}

/// Stateless frame-differencing motion detector.
#[derive(Clone, Debug, Default)]
pub struct MotionDetector {
    config: MotionConfig,
}

impl MotionDetector {
    pub fn new(config: MotionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Compare the previous and current frame.
    ///
    /// Frames must share dimensions. Bit-identical frames never produce motion.
    pub fn detect(&self, previous: &Frame, current: &Frame) -> Result<MotionResult> {
        if !previous.same_shape(current) {
            return Err(anyhow!(
                "frame shape changed from {}x{} to {}x{}",
                previous.width(),
                previous.height(),
                current.width(),
                current.height()
            ));
        }
        if previous.same_content(current) {
            return Ok(MotionResult::default());
        }
        Ok(self.detect_images(previous.image(), current.image()))
    }

    /// Difference two same-shape RGB images.
    pub fn detect_images(&self, previous: &RgbImage, current: &RgbImage) -> MotionResult {
        let mask = self.motion_mask(previous, current);
        let (width, height) = mask.dimensions();

        let regions: Vec<MotionRegion> = find_contours::<i32>(&with_border(&mask))
            .into_iter()
            .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
            .filter_map(|contour| {
                let points: Vec<Point<i32>> = contour
                    .points
                    .iter()
                    .map(|p| Point::new(p.x - 1, p.y - 1))
                    .collect();
                let area = polygon_area(&points);
                if !(self.config.min_contour_area < area && area < self.config.max_contour_area) {
                    return None;
                }
                let bbox = padded_bounding_box(&points, width, height)?;
                Some(MotionRegion { area, bbox })
            })
            .collect();

        MotionResult {
            has_motion: !regions.is_empty(),
            regions,
        }
    }

    /// Blurred, thresholded and dilated difference mask (255 = changed).
    fn motion_mask(&self, previous: &RgbImage, current: &RgbImage) -> GrayImage {
        let before = self.smoothed_intensity(previous);
        let after = self.smoothed_intensity(current);

        let mut mask = GrayImage::new(before.width(), before.height());
        for ((out, a), b) in mask.pixels_mut().zip(before.pixels()).zip(after.pixels()) {
            let changed = a[0].abs_diff(b[0]) > self.config.threshold;
            *out = Luma([if changed { 255 } else { 0 }]);
        }

        if self.config.dilate_radius > 0 {
            dilate(&mask, Norm::LInf, self.config.dilate_radius)
        } else {
            mask
        }
    }

    fn smoothed_intensity(&self, image: &RgbImage) -> GrayImage {
        let gray = image::imageops::grayscale(image);
        if self.config.blur_sigma > 0.0 {
            gaussian_blur_f32(&gray, self.config.blur_sigma)
        } else {
            gray
        }
    }
}

/// Copy of `mask` inside a one-pixel empty frame.
///
/// Components touching the image edge are otherwise traced as holes rather
/// than outer borders.
fn with_border(mask: &GrayImage) -> GrayImage {
    let mut bordered = GrayImage::new(mask.width() + 2, mask.height() + 2);
    image::imageops::replace(&mut bordered, mask, 1, 1);
    bordered
}

/// Shoelace area of a closed contour polygon.
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    (twice as f64).abs() / 2.0
}

/// Bounding box of the contour padded by half its larger side, clamped to the frame.
fn padded_bounding_box(points: &[Point<i32>], width: u32, height: u32) -> Option<PixelBox> {
    let min_x = points.iter().map(|p| p.x).min()?.max(0) as u32;
    let min_y = points.iter().map(|p| p.y).min()?.max(0) as u32;
    let max_x = points.iter().map(|p| p.x).max()?.max(0) as u32;
    let max_y = points.iter().map(|p| p.y).max()?.max(0) as u32;

    let bounds = PixelBox {
        x1: min_x,
        y1: min_y,
        x2: max_x + 1,
        y2: max_y + 1,
    };
    let padding = bounds.width().max(bounds.height()) / 2;
    Some(bounds.padded(padding, width, height))
}
