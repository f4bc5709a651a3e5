mod backend;
mod backends;
mod result;

use std::path::Path;

use anyhow::Result;

pub use backend::ObjectDetector;
pub use backends::{CallLog, DetectCall, Reply, ScriptedDetector};
pub use result::{BoundingBox, RawDetection, TargetClass};

#[cfg(feature = "backend-tract")]
pub use backends::TractYoloDetector;

/// Build the configured detector.
///
/// Without a model path the stub detector is used, which never reports a bird.
pub fn build_detector(model_path: Option<&Path>, input_size: u32) -> Result<Box<dyn ObjectDetector>> {
    match model_path {
        None => {
            log::warn!("no detector model configured; using stub detector (no sightings will be produced)");
            Ok(Box::new(ScriptedDetector::empty()))
        }
        Some(path) => load_model(path, input_size),
    }
}

#[cfg(feature = "backend-tract")]
fn load_model(path: &Path, input_size: u32) -> Result<Box<dyn ObjectDetector>> {
    Ok(Box::new(TractYoloDetector::new(path, input_size)?))
}

#[cfg(not(feature = "backend-tract"))]
fn load_model(path: &Path, _input_size: u32) -> Result<Box<dyn ObjectDetector>> {
    Err(anyhow::anyhow!(
        "model {} requires building with --features backend-tract",
        path.display()
    ))
}
