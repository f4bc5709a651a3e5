use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use super::annotate::Annotator;
use super::naming::SightingName;
use crate::frame::Frame;
use crate::storage::{BlobStore, LocalArchive, JPEG_CONTENT_TYPE};
use crate::validate::Validation;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmitterConfig {
    pub jpeg_quality: u8,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// A confirmed sighting, ready to persist.
#[derive(Clone, Debug)]
pub struct Sighting {
    pub timestamp: DateTime<Local>,
    /// Frame with boxes and labels drawn on.
    pub image: RgbImage,
    pub count: usize,
    pub avg_confidence: f32,
    pub source_frame_id: String,
}

impl Sighting {
    pub fn name(&self) -> SightingName {
        SightingName::new(&self.timestamp, self.count, self.avg_confidence)
    }
}

/// What happened to a sighting once persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct SightingRecord {
    pub address: String,
    pub count: usize,
    pub avg_confidence: f32,
    pub source_frame_id: String,
    pub uploaded: bool,
    pub local_path: Option<PathBuf>,
}

/// Turns validated detections into stored, annotated JPEGs.
pub struct SightingEmitter {
    config: EmitterConfig,
    annotator: Annotator,
    store: Box<dyn BlobStore>,
    backup: Option<Box<dyn LocalArchive>>,
}

impl SightingEmitter {
    pub fn new(config: EmitterConfig, annotator: Annotator, store: Box<dyn BlobStore>) -> Self {
        Self {
            config,
            annotator,
            store,
            backup: None,
        }
    }

    /// Also keep a local copy of every sighting.
    pub fn with_backup(mut self, backup: Box<dyn LocalArchive>) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn store(&self) -> &dyn BlobStore {
        self.store.as_ref()
    }

    pub fn has_backup(&self) -> bool {
        self.backup.is_some()
    }

    /// Annotate the frame for a non-empty validation.
    pub fn build_sighting(&self, frame: &Frame, validation: &Validation) -> Option<Sighting> {
        if validation.count == 0 {
            return None;
        }
        Some(Sighting {
            timestamp: frame.captured_at(),
            image: self.annotator.annotate(frame.image(), &validation.detections),
            count: validation.count,
            avg_confidence: validation.avg_confidence,
            source_frame_id: frame.source_frame_id(),
        })
    }

    /// Build and persist a sighting. Returns `None` when nothing was validated.
    ///
    /// Upload and backup failures are logged and reflected in the record; only
    /// encoding failures are returned as errors.
    pub fn emit(&self, frame: &Frame, validation: &Validation) -> Result<Option<SightingRecord>> {
        match self.build_sighting(frame, validation) {
            Some(sighting) => self.persist(&sighting).map(Some),
            None => Ok(None),
        }
    }

    pub fn persist(&self, sighting: &Sighting) -> Result<SightingRecord> {
        let name = sighting.name();
        let address = name.address();
        let jpeg = encode_jpeg(&sighting.image, self.config.jpeg_quality)
            .with_context(|| format!("encode sighting {}", address))?;

        let uploaded = match self.store.put(&address, &jpeg, JPEG_CONTENT_TYPE) {
            Ok(()) => {
                log::info!("uploaded {} to {} store", address, self.store.name());
                true
            }
            Err(err) => {
                log::error!("upload of {} failed: {:#}", address, err);
                false
            }
        };

        let local_path = self.backup.as_ref().and_then(|backup| {
            match backup.write(&name.file_name, &jpeg) {
                Ok(path) => {
                    log::info!("local backup saved: {}", path.display());
                    Some(path)
                }
                Err(err) => {
                    log::error!("local backup of {} failed: {:#}", name.file_name, err);
                    None
                }
            }
        });

        Ok(SightingRecord {
            address,
            count: sighting.count,
            avg_confidence: sighting.avg_confidence,
            source_frame_id: sighting.source_frame_id.clone(),
            uploaded,
            local_path,
        })
    }
}

/// Encode an RGB image as baseline JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode_image(image)
        .context("jpeg encoding failed")?;
    Ok(bytes)
}
