//! Per-tick driver: motion gate, debounce, cascade, validation, emission.
//!
//! The driver owns the previous frame and the motion history. Each stage
//! short-circuits the tick; the only side effect before a confirmed sighting
//! is the optional raw motion capture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::classify::{CascadeClassifier, CascadeStage};
use crate::emit::{encode_jpeg, motion_capture_name, SightingEmitter, SightingRecord};
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::motion::{MotionConfig, MotionDetector, PersistenceConfig, PersistenceFilter};
use crate::storage::LocalArchive;
use crate::validate::{DetectionValidator, ValidatorConfig};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(300);
pub const DEFAULT_STATUS_EVERY: u64 = 100;

/// What a single tick decided.
#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// First frame; nothing to compare against yet.
    Primed,
    NoMotion,
    /// Motion seen but not yet persistent.
    Debounced { regions: usize },
    /// Classifier found nothing.
    NoBird,
    /// Classifier found boxes but none survived validation.
    Rejected { stage: CascadeStage, raw: usize },
    Sighting(SightingRecord),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub checks: u64,
    pub motions: u64,
    pub classifier_runs: u64,
    pub sightings: u64,
    pub failed_uploads: u64,
}

impl PipelineStats {
    /// Sightings per motion tick, as a percentage.
    pub fn hit_rate(&self) -> f64 {
        if self.motions == 0 {
            0.0
        } else {
            self.sightings as f64 / self.motions as f64 * 100.0
        }
    }
}

/// Loop control for [`Pipeline::run`].
#[derive(Clone, Debug, PartialEq)]
pub struct RunOptions {
    pub interval: Duration,
    /// Stop after this much wall time.
    pub duration: Option<Duration>,
    /// Log a status line every N checks. Zero disables it.
    pub status_every: u64,
    /// Stop after N captures.
    pub max_ticks: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_CHECK_INTERVAL,
            duration: None,
            status_every: DEFAULT_STATUS_EVERY,
            max_ticks: None,
        }
    }
}

struct MotionArchive {
    archive: Box<dyn LocalArchive>,
    jpeg_quality: u8,
}

pub struct Pipeline {
    prev_frame: Option<Frame>,
    motion: MotionDetector,
    persistence: PersistenceFilter,
    classifier: CascadeClassifier,
    validator: DetectionValidator,
    emitter: SightingEmitter,
    motion_archive: Option<MotionArchive>,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        motion: MotionConfig,
        persistence: &PersistenceConfig,
        classifier: CascadeClassifier,
        validator: ValidatorConfig,
        emitter: SightingEmitter,
    ) -> Self {
        Self {
            prev_frame: None,
            motion: MotionDetector::new(motion),
            persistence: PersistenceFilter::new(persistence),
            classifier,
            validator: DetectionValidator::new(validator),
            emitter,
            motion_archive: None,
            stats: PipelineStats::default(),
        }
    }

    /// Save every raw motion frame before classification.
    pub fn with_motion_archive(mut self, archive: Box<dyn LocalArchive>, jpeg_quality: u8) -> Self {
        self.motion_archive = Some(MotionArchive {
            archive,
            jpeg_quality,
        });
        self
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn classifier_mut(&mut self) -> &mut CascadeClassifier {
        &mut self.classifier
    }

    pub fn emitter(&self) -> &SightingEmitter {
        &self.emitter
    }

    /// Process one captured frame.
    pub fn tick(&mut self, frame: Frame) -> Result<TickOutcome> {
        let Some(previous) = self.prev_frame.replace(frame) else {
            return Ok(TickOutcome::Primed);
        };
        let Some(current) = self.prev_frame.as_ref() else {
            return Ok(TickOutcome::Primed);
        };
        self.stats.checks += 1;

        let motion = self
            .motion
            .detect(&previous, current)
            .with_context(|| format!("motion detection on frame {}", current.source_frame_id()))?;
        let persistent = self.persistence.push(motion.has_motion);
        if !motion.has_motion {
            return Ok(TickOutcome::NoMotion);
        }

        self.stats.motions += 1;
        log::info!(
            "motion detected in {} region(s), areas {:?}",
            motion.regions.len(),
            motion.areas()
        );
        if let Some(archive) = &self.motion_archive {
            save_motion_capture(archive, current, motion.regions.len());
        }

        if !persistent {
            log::debug!(
                "motion not yet persistent ({}/{} ticks)",
                self.persistence.history().motion_count(),
                self.persistence.required_ticks()
            );
            return Ok(TickOutcome::Debounced {
                regions: motion.regions.len(),
            });
        }

        self.stats.classifier_runs += 1;
        let classification = self.classifier.classify(current, &motion.regions);
        let Some(stage) = classification.stage else {
            log::debug!("no bird in frame {}", current.source_frame_id());
            return Ok(TickOutcome::NoBird);
        };

        let validation =
            self.validator
                .validate(&classification.detections, current.width(), current.height());
        if validation.is_empty() {
            log::info!(
                "{} detection(s) from {} stage rejected as too small",
                classification.detections.len(),
                stage.as_str()
            );
            return Ok(TickOutcome::Rejected {
                stage,
                raw: classification.detections.len(),
            });
        }

        match self.emitter.emit(current, &validation)? {
            Some(record) => {
                self.stats.sightings += 1;
                if !record.uploaded {
                    self.stats.failed_uploads += 1;
                }
                log::info!(
                    "bird sighting #{}: {} bird(s), avg confidence {:.2}, stage {}, frame {}",
                    self.stats.sightings,
                    record.count,
                    record.avg_confidence,
                    stage.as_str(),
                    record.source_frame_id
                );
                Ok(TickOutcome::Sighting(record))
            }
            None => Ok(TickOutcome::NoBird),
        }
    }

    /// Capture and process frames until stopped.
    ///
    /// A capture failure or a tick error ends the loop with that error. Upload
    /// and backup failures are absorbed by the emitter and never surface here.
    /// The in-flight tick always completes before `stop` is honoured.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        options: &RunOptions,
        stop: &AtomicBool,
    ) -> Result<PipelineStats> {
        let started = Instant::now();
        let mut ticks = 0u64;

        let result = loop {
            if stop.load(Ordering::SeqCst) {
                log::info!("stop requested");
                break Ok(());
            }
            if let Some(limit) = options.duration {
                if started.elapsed() >= limit {
                    log::info!("run duration reached");
                    break Ok(());
                }
            }
            if options.max_ticks.is_some_and(|max| ticks >= max) {
                break Ok(());
            }

            let frame = match source.capture() {
                Ok(frame) => frame,
                Err(err) => break Err(err.context("frame capture failed")),
            };
            ticks += 1;

            let checks_before = self.stats.checks;
            if let Err(err) = self.tick(frame) {
                break Err(err.context("tick failed"));
            }

            let compared = self.stats.checks > checks_before;
            if compared && options.status_every > 0 && self.stats.checks % options.status_every == 0 {
                let source_stats = source.stats();
                log::info!(
                    "status: checks={} motions={} classifier_runs={} sightings={} source={} healthy={} frames={}",
                    self.stats.checks,
                    self.stats.motions,
                    self.stats.classifier_runs,
                    self.stats.sightings,
                    source_stats.source,
                    source.is_healthy(),
                    source_stats.frames_captured
                );
            }

            let done = options.max_ticks.is_some_and(|max| ticks >= max);
            if !done && !options.interval.is_zero() {
                std::thread::sleep(options.interval);
            }
        };

        self.log_summary(started.elapsed());
        result.map(|()| self.stats.clone())
    }

    fn log_summary(&self, runtime: Duration) {
        log::info!(
            "run summary: runtime {:.1} min, {} checks, {} motion events, {} classifier runs, {} sightings ({} upload failures), hit rate {:.1}%",
            runtime.as_secs_f64() / 60.0,
            self.stats.checks,
            self.stats.motions,
            self.stats.classifier_runs,
            self.stats.sightings,
            self.stats.failed_uploads,
            self.stats.hit_rate()
        );
    }
}

fn save_motion_capture(archive: &MotionArchive, frame: &Frame, regions: usize) {
    let name = motion_capture_name(&frame.captured_at(), regions);
    let written = encode_jpeg(frame.image(), archive.jpeg_quality)
        .and_then(|jpeg| archive.archive.write(&name, &jpeg));
    match written {
        Ok(path) => log::debug!("motion capture saved: {}", path.display()),
        Err(err) => log::warn!("motion capture {} failed: {:#}", name, err),
    }
}
