//! Captured frames.
//!
//! - `Frame`: RGB pixels plus local capture time, sequence number and a content fingerprint.
//! - `PixelBox`: integer box in frame coordinates, always clamped to frame bounds.
//!
//! A frame is owned by the tick that captured it. The pipeline driver keeps the
//! previous tick's frame around for differencing and drops it once overwritten.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use image::RgbImage;
use sha2::{Digest, Sha256};

/// One captured RGB frame.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
    captured_at: DateTime<Local>,
    sequence: u64,
    /// SHA-256 over the raw RGB bytes, computed at capture time.
    fingerprint: [u8; 32],
}

impl Frame {
    pub fn new(image: RgbImage, captured_at: DateTime<Local>, sequence: u64) -> Self {
        let fingerprint: [u8; 32] = Sha256::digest(image.as_raw()).into();
        Self {
            image,
            captured_at,
            sequence,
            fingerprint,
        }
    }

    /// Build a frame from packed RGB24 bytes. Called by ingestion sources.
    pub fn from_rgb(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        captured_at: DateTime<Local>,
        sequence: u64,
    ) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("RGB buffer does not match {}x{}", width, height))?;
        Ok(Self::new(image, captured_at, sequence))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn fingerprint(&self) -> [u8; 32] {
        self.fingerprint
    }

    /// Stable identifier used in sighting metadata and logs.
    pub fn source_frame_id(&self) -> String {
        format!("{:06}-{}", self.sequence, hex::encode(&self.fingerprint[..4]))
    }

    pub fn same_shape(&self, other: &Frame) -> bool {
        self.image.dimensions() == other.image.dimensions()
    }

    /// True when both frames carry bit-identical pixels.
    pub fn same_content(&self, other: &Frame) -> bool {
        self.same_shape(other) && self.fingerprint == other.fingerprint
    }
}

/// Axis-aligned integer box `[x1, x2) x [y1, y2)` in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl PixelBox {
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Grow by `pad` on every side, clamped to a `frame_width` x `frame_height` frame.
    pub fn padded(&self, pad: u32, frame_width: u32, frame_height: u32) -> Self {
        Self {
            x1: self.x1.saturating_sub(pad),
            y1: self.y1.saturating_sub(pad),
            x2: self.x2.saturating_add(pad).min(frame_width),
            y2: self.y2.saturating_add(pad).min(frame_height),
        }
    }
}
