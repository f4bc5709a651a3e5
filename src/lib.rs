//! Bird camera
//!
//! Motion-gated bird detection for a fixed outdoor camera.
//!
//! # Architecture
//!
//! Each capture tick flows through a chain of gates; the first one that says
//! "no" ends the tick:
//!
//! 1. **Motion**: frame differencing against the previous capture.
//! 2. **Persistence**: motion must be seen on enough recent ticks.
//! 3. **Cascade**: the object detector is tried on the full frame, a
//!    contrast-enhanced frame, then padded crops of the motion regions.
//! 4. **Validation**: undersized boxes are dropped and aggregates recomputed.
//! 5. **Emission**: the frame is annotated, encoded, and uploaded with an
//!    optional local backup.
//!
//! # Module Structure
//!
//! - `frame`: captured frames and pixel boxes
//! - `ingest`: frame sources (synthetic, image replay, V4L2)
//! - `motion`: differencing and persistence filtering
//! - `detect`: object detector backends
//! - `classify`: the cascading classifier
//! - `validate`: detection validation
//! - `emit`: naming, annotation, and sighting emission
//! - `storage`: blob stores and local archives
//! - `pipeline`: the per-tick driver and run loop
//! - `digest`: daily sighting selection
//! - `config`: daemon configuration

pub mod classify;
pub mod config;
pub mod detect;
pub mod digest;
pub mod emit;
pub mod frame;
pub mod ingest;
pub mod motion;
pub mod pipeline;
pub mod storage;
pub mod validate;

pub use classify::{CascadeClassifier, CascadeStage, Classification, ClassifierConfig};
pub use config::BirdcamConfig;
pub use detect::{build_detector, BoundingBox, ObjectDetector, RawDetection, TargetClass};
pub use emit::{Annotator, SightingEmitter, SightingRecord};
pub use frame::{Frame, PixelBox};
pub use ingest::{CameraConfig, CameraSource, FrameSource};
pub use motion::{MotionConfig, MotionDetector, MotionResult, PersistenceConfig, PersistenceFilter};
pub use pipeline::{Pipeline, PipelineStats, RunOptions, TickOutcome};
pub use storage::{build_blob_store, BlobStore, BlobTarget, LocalArchive};
pub use validate::{DetectionValidator, Validation, ValidatorConfig};
