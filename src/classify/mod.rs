//! Multi-strategy bird classification over a motion-gated frame.

mod cascade;
mod enhance;

pub use cascade::{
    first_non_empty, CascadeClassifier, CascadeContext, CascadeStage, CascadeStrategy,
    Classification, ClassifierConfig, EnhancedFrame, FullFrame, RegionCrops, DEFAULT_CONFIDENCE,
    DEFAULT_MIN_CROP_DIM, DEFAULT_RELAXED_FACTOR,
};
pub use enhance::enhance_contrast;
