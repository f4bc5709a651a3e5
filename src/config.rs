use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::ClassifierConfig;
use crate::emit::{AnnotationConfig, EmitterConfig};
use crate::ingest::CameraConfig;
use crate::motion::{MotionConfig, PersistenceConfig};
use crate::pipeline::{RunOptions, DEFAULT_CHECK_INTERVAL, DEFAULT_STATUS_EVERY};
use crate::storage::BlobTarget;
use crate::validate::ValidatorConfig;

const DEFAULT_SOURCE: &str = "stub://camera";
const DEFAULT_BLOB_ROOT: &str = "sightings";
const DEFAULT_BUCKET: &str = "bird-sightings";
const DEFAULT_MODEL_INPUT_SIZE: u32 = 640;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct BirdcamConfigFile {
    camera: Option<CameraConfigFile>,
    motion: Option<MotionConfigFile>,
    classifier: Option<ClassifierConfigFile>,
    validator: Option<ValidatorConfigFile>,
    storage: Option<StorageConfigFile>,
    annotation: Option<AnnotationConfigFile>,
    run: Option<RunConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    source: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MotionConfigFile {
    threshold: Option<u8>,
    min_contour_area: Option<f64>,
    max_contour_area: Option<f64>,
    blur_sigma: Option<f32>,
    dilate_radius: Option<u8>,
    history_len: Option<usize>,
    min_motion_ticks: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ClassifierConfigFile {
    model_path: Option<PathBuf>,
    model_input_size: Option<u32>,
    confidence: Option<f32>,
    relaxed_factor: Option<f32>,
    min_crop_dim: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ValidatorConfigFile {
    min_box_area: Option<f32>,
    display_padding: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct StorageConfigFile {
    blob_root: Option<PathBuf>,
    endpoint: Option<String>,
    bucket: Option<String>,
    token_env: Option<String>,
    local_backup_dir: Option<PathBuf>,
    motion_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AnnotationConfigFile {
    font_path: Option<PathBuf>,
    label_scale: Option<f32>,
    box_thickness: Option<u32>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RunConfigFile {
    check_interval_ms: Option<u64>,
    duration_hours: Option<f64>,
    status_every: Option<u64>,
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct BirdcamConfig {
    pub camera: CameraConfig,
    pub motion: MotionConfig,
    pub persistence: PersistenceConfig,
    pub classifier: ClassifierConfig,
    pub model: ModelSettings,
    pub validator: ValidatorConfig,
    pub storage: StorageSettings,
    pub annotation: AnnotationConfig,
    pub emitter: EmitterConfig,
    pub run: RunOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    /// ONNX model; the stub detector is used when unset.
    pub path: Option<PathBuf>,
    pub input_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    pub blob: BlobTarget,
    pub local_backup_dir: Option<PathBuf>,
    /// Raw motion captures are written here when set.
    pub motion_dir: Option<PathBuf>,
}

impl BirdcamConfig {
    /// Load from the file named by `BIRDCAM_CONFIG` (if any), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("BIRDCAM_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (if any), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: BirdcamConfigFile) -> Result<Self> {
        let camera_file = file.camera.unwrap_or_default();
        let default_camera = CameraConfig::default();
        let camera = CameraConfig {
            source: camera_file
                .source
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            width: camera_file.width.unwrap_or(default_camera.width),
            height: camera_file.height.unwrap_or(default_camera.height),
            target_fps: camera_file.target_fps.unwrap_or(default_camera.target_fps),
        };

        let motion_file = file.motion.unwrap_or_default();
        let default_motion = MotionConfig::default();
        let motion = MotionConfig {
            threshold: motion_file.threshold.unwrap_or(default_motion.threshold),
            min_contour_area: motion_file
                .min_contour_area
                .unwrap_or(default_motion.min_contour_area),
            max_contour_area: motion_file
                .max_contour_area
                .unwrap_or(default_motion.max_contour_area),
            blur_sigma: motion_file.blur_sigma.unwrap_or(default_motion.blur_sigma),
            dilate_radius: motion_file
                .dilate_radius
                .unwrap_or(default_motion.dilate_radius),
        };
        let default_persistence = PersistenceConfig::default();
        let persistence = PersistenceConfig {
            history_len: motion_file
                .history_len
                .unwrap_or(default_persistence.history_len),
            min_motion_ticks: motion_file
                .min_motion_ticks
                .unwrap_or(default_persistence.min_motion_ticks),
        };

        let classifier_file = file.classifier.unwrap_or_default();
        let default_classifier = ClassifierConfig::default();
        let classifier = ClassifierConfig {
            target: default_classifier.target,
            confidence: classifier_file
                .confidence
                .unwrap_or(default_classifier.confidence),
            relaxed_factor: classifier_file
                .relaxed_factor
                .unwrap_or(default_classifier.relaxed_factor),
            min_crop_dim: classifier_file
                .min_crop_dim
                .unwrap_or(default_classifier.min_crop_dim),
        };
        let model = ModelSettings {
            path: classifier_file.model_path,
            input_size: classifier_file
                .model_input_size
                .unwrap_or(DEFAULT_MODEL_INPUT_SIZE),
        };

        let validator_file = file.validator.unwrap_or_default();
        let default_validator = ValidatorConfig::default();
        let validator = ValidatorConfig {
            min_box_area: validator_file
                .min_box_area
                .unwrap_or(default_validator.min_box_area),
            display_padding: validator_file
                .display_padding
                .unwrap_or(default_validator.display_padding),
        };

        let storage_file = file.storage.unwrap_or_default();
        let blob = match storage_file.endpoint {
            Some(endpoint) => BlobTarget::Http {
                endpoint,
                bucket: storage_file
                    .bucket
                    .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
                token_env: storage_file.token_env,
            },
            None => BlobTarget::Filesystem(
                storage_file
                    .blob_root
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_BLOB_ROOT)),
            ),
        };
        let storage = StorageSettings {
            blob,
            local_backup_dir: storage_file.local_backup_dir,
            motion_dir: storage_file.motion_dir,
        };

        let annotation_file = file.annotation.unwrap_or_default();
        let default_annotation = AnnotationConfig::default();
        let annotation = AnnotationConfig {
            font_path: annotation_file.font_path,
            label_scale: annotation_file
                .label_scale
                .unwrap_or(default_annotation.label_scale),
            box_thickness: annotation_file
                .box_thickness
                .unwrap_or(default_annotation.box_thickness),
        };
        let emitter = EmitterConfig {
            jpeg_quality: annotation_file
                .jpeg_quality
                .unwrap_or(EmitterConfig::default().jpeg_quality),
        };

        let run_file = file.run.unwrap_or_default();
        let run = RunOptions {
            interval: run_file
                .check_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_CHECK_INTERVAL),
            duration: run_file
                .duration_hours
                .map(hours_to_duration)
                .transpose()
                .context("run.duration_hours")?,
            status_every: run_file.status_every.unwrap_or(DEFAULT_STATUS_EVERY),
            max_ticks: None,
        };

        Ok(Self {
            camera,
            motion,
            persistence,
            classifier,
            model,
            validator,
            storage,
            annotation,
            emitter,
            run,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(source) = non_empty_env("BIRDCAM_SOURCE") {
            self.camera.source = source;
        }
        if let Some(path) = non_empty_env("BIRDCAM_MODEL_PATH") {
            self.model.path = Some(PathBuf::from(path));
        }
        if let Some(confidence) = non_empty_env("BIRDCAM_CONFIDENCE") {
            self.classifier.confidence = confidence
                .parse()
                .map_err(|_| anyhow!("BIRDCAM_CONFIDENCE must be a number between 0 and 1"))?;
        }
        if let Some(root) = non_empty_env("BIRDCAM_BLOB_ROOT") {
            self.storage.blob = BlobTarget::Filesystem(PathBuf::from(root));
        }
        if let Some(endpoint) = non_empty_env("BIRDCAM_BLOB_ENDPOINT") {
            let (bucket, token_env) = match &self.storage.blob {
                BlobTarget::Http {
                    bucket, token_env, ..
                } => (bucket.clone(), token_env.clone()),
                _ => (DEFAULT_BUCKET.to_string(), None),
            };
            self.storage.blob = BlobTarget::Http {
                endpoint,
                bucket,
                token_env,
            };
        }
        if let Some(dir) = non_empty_env("BIRDCAM_LOCAL_BACKUP_DIR") {
            self.storage.local_backup_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = non_empty_env("BIRDCAM_MOTION_DIR") {
            self.storage.motion_dir = Some(PathBuf::from(dir));
        }
        if let Some(interval) = non_empty_env("BIRDCAM_CHECK_INTERVAL_MS") {
            let ms: u64 = interval.parse().map_err(|_| {
                anyhow!("BIRDCAM_CHECK_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.run.interval = Duration::from_millis(ms);
        }
        if let Some(hours) = non_empty_env("BIRDCAM_DURATION_HOURS") {
            let hours: f64 = hours
                .parse()
                .map_err(|_| anyhow!("BIRDCAM_DURATION_HOURS must be a number of hours"))?;
            self.run.duration = Some(hours_to_duration(hours).context("BIRDCAM_DURATION_HOURS")?);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        if self.motion.min_contour_area >= self.motion.max_contour_area {
            return Err(anyhow!(
                "motion.min_contour_area ({}) must be below motion.max_contour_area ({})",
                self.motion.min_contour_area,
                self.motion.max_contour_area
            ));
        }
        if !(self.motion.blur_sigma >= 0.0) {
            return Err(anyhow!("motion.blur_sigma cannot be negative"));
        }
        if self.persistence.history_len == 0 {
            return Err(anyhow!("motion.history_len must be at least 1"));
        }
        if self.persistence.min_motion_ticks == 0
            || self.persistence.min_motion_ticks > self.persistence.history_len
        {
            return Err(anyhow!(
                "motion.min_motion_ticks must be between 1 and history_len ({})",
                self.persistence.history_len
            ));
        }
        if !(self.classifier.confidence > 0.0 && self.classifier.confidence <= 1.0) {
            return Err(anyhow!("classifier.confidence must be in (0, 1]"));
        }
        if !(self.classifier.relaxed_factor > 0.0 && self.classifier.relaxed_factor <= 1.0) {
            return Err(anyhow!("classifier.relaxed_factor must be in (0, 1]"));
        }
        if self.model.input_size == 0 {
            return Err(anyhow!("classifier.model_input_size must be greater than zero"));
        }
        if !(self.validator.min_box_area >= 0.0) {
            return Err(anyhow!("validator.min_box_area cannot be negative"));
        }
        if !(1..=100).contains(&self.emitter.jpeg_quality) {
            return Err(anyhow!("annotation.jpeg_quality must be between 1 and 100"));
        }
        if let BlobTarget::Http {
            endpoint, bucket, ..
        } = &self.storage.blob
        {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(anyhow!("storage.endpoint must be an http(s) URL"));
            }
            if bucket.trim().is_empty() {
                return Err(anyhow!("storage.bucket cannot be empty"));
            }
        }
        if self.run.interval.is_zero() {
            return Err(anyhow!("run.check_interval_ms must be greater than zero"));
        }
        if let Some(duration) = self.run.duration {
            if duration.is_zero() {
                return Err(anyhow!("run duration must be greater than zero"));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<BirdcamConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Converts a run length in hours, rejecting values that are not positive or
/// do not fit a `Duration`.
pub fn hours_to_duration(hours: f64) -> Result<Duration> {
    if !(hours > 0.0) {
        return Err(anyhow!("run duration must be a positive number of hours, got {}", hours));
    }
    Duration::try_from_secs_f64(hours * 3600.0)
        .map_err(|e| anyhow!("run duration of {} hours is out of range: {}", hours, e))
}
