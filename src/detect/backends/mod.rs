pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::{CallLog, DetectCall, Reply, ScriptedDetector};

#[cfg(feature = "backend-tract")]
pub use tract::TractYoloDetector;
