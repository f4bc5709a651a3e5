use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use image::imageops::FilterType;

use super::{CameraConfig, SourceStats};
use crate::frame::Frame;

/// Replays a directory of still images as a camera feed.
///
/// Files with a `.jpg`, `.jpeg` or `.png` extension are read in name order and
/// resized to the configured resolution when they differ. Capture fails once
/// every file has been consumed.
pub struct ImageDirSource {
    config: CameraConfig,
    files: Vec<PathBuf>,
    next: usize,
    frame_count: u64,
    last_error: Option<String>,
}

impl ImageDirSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            files: Vec::new(),
            next: 0,
            frame_count: 0,
            last_error: None,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        let dir = Path::new(&self.config.source);
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("open image directory {}", dir.display()))? {
            let path = entry?.path();
            if path.is_file() && is_supported_image(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            self.last_error = Some("no images".to_string());
            return Err(anyhow!("image directory {} has no JPEG or PNG files", dir.display()));
        }
        files.sort();

        log::info!("ImageDirSource: replaying {} images from {}", files.len(), dir.display());
        self.files = files;
        self.next = 0;
        self.last_error = None;
        Ok(())
    }

    pub fn capture(&mut self) -> Result<Frame> {
        let path = self
            .files
            .get(self.next)
            .cloned()
            .ok_or_else(|| {
                if self.files.is_empty() {
                    anyhow!("image directory source not connected; call connect() first")
                } else {
                    anyhow!("image directory {} exhausted after {} frames", self.config.source, self.frame_count)
                }
            })?;
        self.next += 1;

        let decoded = image::open(&path)
            .with_context(|| format!("decode {}", path.display()))
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                err
            })?;
        let mut image = decoded.into_rgb8();
        if image.dimensions() != (self.config.width, self.config.height) {
            image = image::imageops::resize(&image, self.config.width, self.config.height, FilterType::Triangle);
        }

        self.frame_count += 1;
        Ok(Frame::new(image, Local::now(), self.frame_count))
    }

    pub fn is_healthy(&self) -> bool {
        self.last_error.is_none() && self.next < self.files.len()
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.source.clone(),
        }
    }
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn config(dir: &Path) -> CameraConfig {
        CameraConfig {
            source: dir.display().to_string(),
            width: 32,
            height: 24,
            target_fps: 0,
        }
    }

    #[test]
    fn replays_in_name_order_then_exhausts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        RgbImage::from_pixel(32, 24, Rgb([200, 0, 0])).save(dir.path().join("b.png"))?;
        RgbImage::from_pixel(64, 48, Rgb([0, 0, 200])).save(dir.path().join("a.png"))?;
        fs::write(dir.path().join("notes.txt"), b"ignored")?;

        let mut source = ImageDirSource::new(config(dir.path()));
        source.connect()?;
        assert!(source.is_healthy());

        let first = source.capture()?;
        assert_eq!((first.width(), first.height()), (32, 24));
        assert_eq!(first.image().get_pixel(0, 0), &Rgb([0, 0, 200]));
        let second = source.capture()?;
        assert_eq!(second.image().get_pixel(0, 0), &Rgb([200, 0, 0]));
        assert_eq!(second.sequence(), 2);

        assert!(!source.is_healthy());
        assert!(source.capture().is_err());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn empty_directory_fails_to_connect() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut source = ImageDirSource::new(config(dir.path()));
        assert!(source.connect().is_err());
        assert!(source.capture().is_err());
        Ok(())
    }
}
