//! Motion gating: frame differencing plus a rolling-window debounce.

mod detector;
mod history;

pub use detector::{
    MotionConfig, MotionDetector, MotionRegion, MotionResult, DEFAULT_BLUR_SIGMA,
    DEFAULT_DILATE_RADIUS, DEFAULT_MAX_CONTOUR_AREA, DEFAULT_MIN_CONTOUR_AREA,
    DEFAULT_MOTION_THRESHOLD,
};
pub use history::{
    MotionHistory, PersistenceConfig, PersistenceFilter, DEFAULT_HISTORY_CAPACITY,
    DEFAULT_MOTION_PERSISTENCE,
};
