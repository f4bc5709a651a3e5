use anyhow::Result;
use chrono::Local;
use image::{Rgb, RgbImage};

use super::{CameraConfig, SourceStats};
use crate::frame::Frame;

/// Frames per synthetic cycle.
const CYCLE: u64 = 40;
/// The patch is visible for frames `PATCH_START..PATCH_END` of each cycle.
const PATCH_START: u64 = 20;
const PATCH_END: u64 = 26;
const PATCH_SIZE: u32 = 40;

/// Synthetic scene for `stub://` sources.
///
/// A static gradient background; once per cycle a bird-sized patch drifts
/// across the frame for a few consecutive frames.
pub struct SyntheticSource {
    config: CameraConfig,
    background: RgbImage,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: CameraConfig) -> Self {
        let background = RgbImage::from_fn(config.width, config.height, |x, y| {
            let shade = (60 + (y * 80) / config.height.max(1)) as u8;
            Rgb([shade / 2, shade, (shade as u32 + x % 4) as u8])
        });
        Self {
            config,
            background,
            frame_count: 0,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.source,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    pub fn capture(&mut self) -> Result<Frame> {
        self.frame_count += 1;
        let mut image = self.background.clone();

        let phase = self.frame_count % CYCLE;
        if (PATCH_START..PATCH_END).contains(&phase) {
            let step = (phase - PATCH_START) as u32;
            let x0 = (self.config.width / 4 + step * PATCH_SIZE / 2).min(self.config.width.saturating_sub(1));
            let y0 = self.config.height / 2;
            for y in y0..(y0 + PATCH_SIZE).min(self.config.height) {
                for x in x0..(x0 + PATCH_SIZE).min(self.config.width) {
                    image.put_pixel(x, y, Rgb([235, 235, 220]));
                }
            }
        }

        Ok(Frame::new(image, Local::now(), self.frame_count))
    }

    pub fn is_healthy(&self) -> bool {
        true
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.source.clone(),
        }
    }
}
