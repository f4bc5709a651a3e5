//! Post-hoc filtering of detector boxes.

use crate::detect::RawDetection;
use crate::frame::PixelBox;

pub const DEFAULT_MIN_BOX_AREA: f32 = 400.0;
pub const DEFAULT_DISPLAY_PADDING: u32 = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct ValidatorConfig {
    /// Boxes with a smaller (un-padded) area are dropped.
    pub min_box_area: f32,
    /// Extra margin around each box when drawing.
    pub display_padding: u32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_box_area: DEFAULT_MIN_BOX_AREA,
            display_padding: DEFAULT_DISPLAY_PADDING,
        }
    }
}

/// A detection that passed validation, plus the box used for annotation.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidDetection {
    pub detection: RawDetection,
    pub display_box: PixelBox,
}

/// Surviving detections and their aggregate statistics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Validation {
    pub detections: Vec<ValidDetection>,
    pub count: usize,
    /// Mean confidence of surviving detections; exactly 0.0 when none survive.
    pub avg_confidence: f32,
}

impl Validation {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn raw_detections(&self) -> Vec<RawDetection> {
        self.detections.iter().map(|d| d.detection).collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct DetectionValidator {
    config: ValidatorConfig,
}

impl DetectionValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Drop undersized boxes and recompute count and mean confidence.
    ///
    /// Feeding `raw_detections()` of the result back in yields the same result.
    pub fn validate(&self, raw: &[RawDetection], frame_width: u32, frame_height: u32) -> Validation {
        let detections: Vec<ValidDetection> = raw
            .iter()
            .filter(|d| d.bbox.area() >= self.config.min_box_area)
            .map(|d| ValidDetection {
                detection: *d,
                display_box: d.bbox.to_pixel_box(frame_width, frame_height).padded(
                    self.config.display_padding,
                    frame_width,
                    frame_height,
                ),
            })
            .collect();

        let count = detections.len();
        let avg_confidence = if count == 0 {
            0.0
        } else {
            detections.iter().map(|d| d.detection.confidence).sum::<f32>() / count as f32
        };

        Validation {
            detections,
            count,
            avg_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn detection(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> RawDetection {
        RawDetection::bird(BoundingBox::new(x1, y1, x2, y2), confidence)
    }

    #[test]
    fn minimum_area_is_inclusive() {
        let validator = DetectionValidator::default();
        let exact = detection(0.0, 0.0, 20.0, 20.0, 0.5);
        let below = detection(0.0, 0.0, 20.0, 19.0, 0.5);
        let result = validator.validate(&[exact, below], 640, 480);
        assert_eq!(result.count, 1);
        assert_eq!(result.detections[0].detection, exact);
    }

    #[test]
    fn empty_input_has_zero_confidence() {
        let result = DetectionValidator::default().validate(&[], 640, 480);
        assert_eq!(result.count, 0);
        assert_eq!(result.avg_confidence, 0.0);
        assert!(result.is_empty());
    }

    #[test]
    fn average_uses_survivors_only() {
        let raw = [
            detection(10.0, 10.0, 60.0, 60.0, 0.8),
            detection(100.0, 100.0, 150.0, 150.0, 0.4),
            detection(0.0, 0.0, 5.0, 5.0, 0.99),
        ];
        let result = DetectionValidator::default().validate(&raw, 640, 480);
        assert_eq!(result.count, 2);
        assert!((result.avg_confidence - 0.6).abs() < 1e-6);
    }

    #[test]
    fn display_box_is_padded_and_clamped() {
        let result =
            DetectionValidator::default().validate(&[detection(5.0, 100.0, 60.0, 475.0, 0.5)], 640, 480);
        assert_eq!(
            result.detections[0].display_box,
            PixelBox {
                x1: 0,
                y1: 90,
                x2: 70,
                y2: 480
            }
        );
    }

    #[test]
    fn validation_is_idempotent() {
        let validator = DetectionValidator::default();
        let raw = [
            detection(10.0, 10.0, 60.0, 60.0, 0.7),
            detection(0.0, 0.0, 10.0, 10.0, 0.9),
            detection(200.0, 200.0, 230.0, 240.0, 0.3),
        ];
        let once = validator.validate(&raw, 640, 480);
        let twice = validator.validate(&once.raw_detections(), 640, 480);
        assert_eq!(once, twice);
    }
}
