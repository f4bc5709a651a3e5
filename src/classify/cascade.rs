use std::cell::OnceCell;

use anyhow::Result;
use image::RgbImage;

use crate::classify::enhance::enhance_contrast;
use crate::detect::{ObjectDetector, RawDetection, TargetClass};
use crate::frame::Frame;
use crate::motion::MotionRegion;

pub const DEFAULT_CONFIDENCE: f32 = 0.15;
pub const DEFAULT_RELAXED_FACTOR: f32 = 0.6;
pub const DEFAULT_MIN_CROP_DIM: u32 = 50;

/// Cascade tuning.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifierConfig {
    pub target: TargetClass,
    /// Base confidence threshold for full-frame passes.
    pub confidence: f32,
    /// Multiplier applied to `confidence` for region crops.
    pub relaxed_factor: f32,
    /// Crops narrower or shorter than this are skipped.
    pub min_crop_dim: u32,
}

impl ClassifierConfig {
    pub fn relaxed_confidence(&self) -> f32 {
        self.confidence * self.relaxed_factor
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            target: TargetClass::Bird,
            confidence: DEFAULT_CONFIDENCE,
            relaxed_factor: DEFAULT_RELAXED_FACTOR,
            min_crop_dim: DEFAULT_MIN_CROP_DIM,
        }
    }
}

/// Which cascade step produced the detections.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadeStage {
    FullFrame,
    Enhanced,
    RegionConfirmed,
}

impl CascadeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CascadeStage::FullFrame => "full_frame",
            CascadeStage::Enhanced => "enhanced",
            CascadeStage::RegionConfirmed => "region_confirmed",
        }
    }
}

/// Outcome of one cascade run.
///
/// `stage` is `None` when every step came back empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    pub detections: Vec<RawDetection>,
    pub stage: Option<CascadeStage>,
}

impl Classification {
    pub fn found(&self) -> bool {
        !self.detections.is_empty()
    }
}

/// Per-tick state shared by the strategies.
pub struct CascadeContext<'a> {
    frame: &'a Frame,
    regions: &'a [MotionRegion],
    config: &'a ClassifierConfig,
    enhanced: OnceCell<RgbImage>,
}

impl<'a> CascadeContext<'a> {
    fn new(frame: &'a Frame, regions: &'a [MotionRegion], config: &'a ClassifierConfig) -> Self {
        Self {
            frame,
            regions,
            config,
            enhanced: OnceCell::new(),
        }
    }

    /// Contrast-enhanced frame, computed on first use.
    pub fn enhanced(&self) -> &RgbImage {
        self.enhanced
            .get_or_init(|| enhance_contrast(self.frame.image()))
    }
}

/// One step of the cascade.
pub trait CascadeStrategy {
    fn stage(&self) -> CascadeStage;

    fn attempt(
        &self,
        ctx: &CascadeContext<'_>,
        detector: &mut dyn ObjectDetector,
    ) -> Result<Vec<RawDetection>>;
}

/// Step 1: the raw frame at the base threshold.
pub struct FullFrame;

impl CascadeStrategy for FullFrame {
    fn stage(&self) -> CascadeStage {
        CascadeStage::FullFrame
    }

    fn attempt(
        &self,
        ctx: &CascadeContext<'_>,
        detector: &mut dyn ObjectDetector,
    ) -> Result<Vec<RawDetection>> {
        detector.detect(ctx.frame.image(), ctx.config.target, ctx.config.confidence)
    }
}

/// Step 2: the enhanced frame at the base threshold.
pub struct EnhancedFrame;

impl CascadeStrategy for EnhancedFrame {
    fn stage(&self) -> CascadeStage {
        CascadeStage::Enhanced
    }

    fn attempt(
        &self,
        ctx: &CascadeContext<'_>,
        detector: &mut dyn ObjectDetector,
    ) -> Result<Vec<RawDetection>> {
        detector.detect(ctx.enhanced(), ctx.config.target, ctx.config.confidence)
    }
}

/// Step 3: enhanced crops around motion regions at the relaxed threshold.
///
/// A hit on any crop confirms a bird is present; the enhanced full frame is
/// then re-run at the relaxed threshold so returned boxes are in frame
/// coordinates.
pub struct RegionCrops;

impl CascadeStrategy for RegionCrops {
    fn stage(&self) -> CascadeStage {
        CascadeStage::RegionConfirmed
    }

    fn attempt(
        &self,
        ctx: &CascadeContext<'_>,
        detector: &mut dyn ObjectDetector,
    ) -> Result<Vec<RawDetection>> {
        let relaxed = ctx.config.relaxed_confidence();
        let min_dim = ctx.config.min_crop_dim;

        let crops = ctx
            .regions
            .iter()
            .filter(|region| region.bbox.width() >= min_dim && region.bbox.height() >= min_dim);

        let confirmed = first_non_empty(crops, |region| {
            let bbox = region.bbox;
            let crop = image::imageops::crop_imm(
                ctx.enhanced(),
                bbox.x1,
                bbox.y1,
                bbox.width(),
                bbox.height(),
            )
            .to_image();
            detector.detect(&crop, ctx.config.target, relaxed)
        });

        match confirmed {
            Some((region, _)) => {
                log::debug!(
                    "bird confirmed in region ({}, {})-({}, {}); re-running enhanced frame at {:.3}",
                    region.bbox.x1,
                    region.bbox.y1,
                    region.bbox.x2,
                    region.bbox.y2,
                    relaxed
                );
                detector.detect(ctx.enhanced(), ctx.config.target, relaxed)
            }
            None => Ok(Vec::new()),
        }
    }
}

/// Run `attempt` on each candidate in order and return the first non-empty result.
///
/// Errors are logged and count as an empty result.
pub fn first_non_empty<K, T, I, F>(candidates: I, mut attempt: F) -> Option<(K, Vec<T>)>
where
    I: IntoIterator<Item = K>,
    F: FnMut(&K) -> Result<Vec<T>>,
{
    for candidate in candidates {
        match attempt(&candidate) {
            Ok(found) if !found.is_empty() => return Some((candidate, found)),
            Ok(_) => {}
            Err(err) => log::warn!("detector call failed, treating as no detection: {:#}", err),
        }
    }
    None
}

/// Escalating bird classifier: full frame, enhanced frame, then region crops.
pub struct CascadeClassifier {
    config: ClassifierConfig,
    detector: Box<dyn ObjectDetector>,
    strategies: Vec<Box<dyn CascadeStrategy>>,
}

impl CascadeClassifier {
    pub fn new(config: ClassifierConfig, detector: Box<dyn ObjectDetector>) -> Self {
        Self {
            config,
            detector,
            strategies: vec![Box::new(FullFrame), Box::new(EnhancedFrame), Box::new(RegionCrops)],
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.detector.warm_up()
    }

    /// Classify the current frame using its motion regions as crop hints.
    pub fn classify(&mut self, frame: &Frame, regions: &[MotionRegion]) -> Classification {
        let ctx = CascadeContext::new(frame, regions, &self.config);
        let detector = self.detector.as_mut();

        match first_non_empty(self.strategies.iter(), |strategy| strategy.attempt(&ctx, detector)) {
            Some((strategy, detections)) => Classification {
                detections,
                stage: Some(strategy.stage()),
            },
            None => Classification::default(),
        }
    }
}
