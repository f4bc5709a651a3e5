use anyhow::Result;
use image::RgbImage;

use crate::detect::result::{RawDetection, TargetClass};

/// Object detector trait.
///
/// The cascade calls a detector several times per tick: on the full frame, on
/// an enhanced copy, and on crops, each with its own confidence threshold.
/// Returned boxes are in the coordinates of the image passed in.
///
/// Implementations must treat the image as read-only and must not retain it
/// beyond the `detect` call.
pub trait ObjectDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Detect `target` objects with confidence at or above `threshold`.
    fn detect(
        &mut self,
        image: &RgbImage,
        target: TargetClass,
        threshold: f32,
    ) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
