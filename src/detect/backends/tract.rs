#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::ObjectDetector;
use crate::detect::result::{BoundingBox, RawDetection, TargetClass};

pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const LETTERBOX_FILL: Rgb<u8> = Rgb([114, 114, 114]);

/// YOLOv8 ONNX detector running on tract.
///
/// Expects a single `[1, 3, S, S]` input and a `[1, 4 + C, N]` output with
/// centre-format boxes followed by per-class scores. The model file is read
/// once at construction; no other I/O happens.
pub struct TractYoloDetector {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    iou_threshold: f32,
}

/// Placement of the source image inside the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f32,
    offset_x: f32,
    offset_y: f32,
}

impl TractYoloDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)))
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        })
    }

    /// Override the default NMS overlap threshold.
    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
        self.iou_threshold = iou_threshold;
        self
    }

    fn build_input(&self, image: &RgbImage) -> Result<(Tensor, Letterbox)> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot run detection on an empty {}x{} image", width, height));
        }
        let side = self.input_size;
        let scale = side as f32 / width.max(height) as f32;
        let new_width = ((width as f32 * scale) as u32).clamp(1, side);
        let new_height = ((height as f32 * scale) as u32).clamp(1, side);
        let resized = image::imageops::resize(image, new_width, new_height, FilterType::Triangle);

        let mut canvas = RgbImage::from_pixel(side, side, LETTERBOX_FILL);
        let offset_x = (side - new_width) / 2;
        let offset_y = (side - new_height) / 2;
        image::imageops::replace(&mut canvas, &resized, offset_x as i64, offset_y as i64);

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, side as usize, side as usize),
            |(_, channel, y, x)| canvas.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );

        Ok((
            input.into_tensor(),
            Letterbox {
                scale,
                offset_x: offset_x as f32,
                offset_y: offset_y as f32,
            },
        ))
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        letterbox: Letterbox,
        target: TargetClass,
        threshold: f32,
        width: u32,
        height: u32,
    ) -> Result<Vec<RawDetection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!("expected [1, 4 + C, N] output, got {:?}", shape));
        }
        let score_row = 4 + target.coco_index();
        if shape[1] <= score_row {
            return Err(anyhow!(
                "model has {} classes; class {} is out of range",
                shape[1].saturating_sub(4),
                target.coco_index()
            ));
        }

        let mut candidates = Vec::new();
        for i in 0..shape[2] {
            let confidence = view[[0, score_row, i]];
            if !(confidence >= threshold) {
                continue;
            }
            let cx = view[[0, 0, i]];
            let cy = view[[0, 1, i]];
            let w = view[[0, 2, i]];
            let h = view[[0, 3, i]];
            let unmap_x = |v: f32| ((v - letterbox.offset_x) / letterbox.scale).clamp(0.0, width as f32);
            let unmap_y = |v: f32| ((v - letterbox.offset_y) / letterbox.scale).clamp(0.0, height as f32);
            candidates.push(RawDetection {
                bbox: BoundingBox::new(
                    unmap_x(cx - w / 2.0),
                    unmap_y(cy - h / 2.0),
                    unmap_x(cx + w / 2.0),
                    unmap_y(cy + h / 2.0),
                ),
                confidence,
                class: target,
            });
        }

        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

/// Greedy NMS, highest confidence first.
fn non_max_suppression(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<RawDetection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept
            .iter()
            .all(|k| k.bbox.iou(&candidate.bbox) <= iou_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}

impl ObjectDetector for TractYoloDetector {
    fn name(&self) -> &'static str {
        "tract-yolo"
    }

    fn detect(
        &mut self,
        image: &RgbImage,
        target: TargetClass,
        threshold: f32,
    ) -> Result<Vec<RawDetection>> {
        let (input, letterbox) = self.build_input(image)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, letterbox, target, threshold, image.width(), image.height())
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = RgbImage::from_pixel(self.input_size, self.input_size, LETTERBOX_FILL);
        self.detect(&blank, TargetClass::Bird, 1.0).map(|_| ())
    }
}
