//! Frame ingestion sources.
//!
//! - `stub://...`: synthetic scene with a periodic moving patch (testing, dry runs)
//! - a local directory of JPEG/PNG stills, replayed in file-name order
//! - `/dev/video*` devices (feature: ingest-v4l2)
//!
//! Every source stamps frames with the local capture time and a monotonically
//! increasing sequence number.

mod normalize;
mod replay;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub use normalize::{normalize_to_rgb, PixelFormat};
pub use replay::ImageDirSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;

/// Camera capture interface consumed by the pipeline driver.
pub trait FrameSource: Send {
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame.
    fn capture(&mut self) -> Result<Frame>;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// Configuration for the camera.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    /// `stub://name`, an image directory path, or a V4L2 device path.
    pub source: String,
    pub width: u32,
    pub height: u32,
    /// Requested device frame rate. Zero leaves the device default.
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: "stub://camera".to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            target_fps: 0,
        }
    }
}

/// Frame source selected from `CameraConfig::source`.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticSource),
    Replay(ImageDirSource),
    #[cfg(feature = "ingest-v4l2")]
    Device(V4l2Source),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!(
                "camera resolution must be non-zero, got {}x{}",
                config.width,
                config.height
            ));
        }
        let source = config.source.trim().to_string();
        if source.is_empty() {
            return Err(anyhow!("camera source cannot be empty"));
        }

        let backend = if source.starts_with("stub://") {
            CameraBackend::Synthetic(SyntheticSource::new(config))
        } else if source.starts_with("/dev/video") {
            Self::device_backend(config)?
        } else if source.contains("://") {
            return Err(anyhow!("unsupported camera source {}", source));
        } else {
            CameraBackend::Replay(ImageDirSource::new(config))
        };
        Ok(Self { backend })
    }

    #[cfg(feature = "ingest-v4l2")]
    fn device_backend(config: CameraConfig) -> Result<CameraBackend> {
        Ok(CameraBackend::Device(V4l2Source::new(config)))
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    fn device_backend(config: CameraConfig) -> Result<CameraBackend> {
        Err(anyhow!(
            "camera device {} requires building with --features ingest-v4l2",
            config.source
        ))
    }
}

impl FrameSource for CameraSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            CameraBackend::Replay(source) => source.connect(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    fn capture(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.capture(),
            CameraBackend::Replay(source) => source.capture(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.capture(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_healthy(),
            CameraBackend::Replay(source) => source.is_healthy(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            CameraBackend::Replay(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
        }
    }
}
