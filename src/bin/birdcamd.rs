//! birdcamd - bird camera daemon
//!
//! Captures frames, gates them on persistent motion, runs the cascading bird
//! classifier, and uploads annotated sightings until stopped (Ctrl-C, the
//! configured run duration, or `--max-ticks`).

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use birdcam::config::{hours_to_duration, BirdcamConfig};
use birdcam::{
    build_blob_store, build_detector, emit::Annotator, BlobStore, storage::FilesystemArchive,
    CameraSource, CascadeClassifier, FrameSource, Pipeline, SightingEmitter,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON or TOML config file.
    #[arg(long, env = "BIRDCAM_CONFIG")]
    config: Option<PathBuf>,
    /// Camera source, overriding the config file.
    #[arg(long)]
    source: Option<String>,
    /// Stop after this many hours.
    #[arg(long)]
    duration_hours: Option<f64>,
    /// Stop after this many captures.
    #[arg(long)]
    max_ticks: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = BirdcamConfig::load_from(args.config.as_deref())?;
    if let Some(source) = args.source {
        cfg.camera.source = source;
    }
    if let Some(hours) = args.duration_hours {
        cfg.run.duration = Some(hours_to_duration(hours).context("--duration-hours")?);
    }
    cfg.run.max_ticks = args.max_ticks;

    log::info!("birdcamd {} starting", env!("CARGO_PKG_VERSION"));
    log::info!(
        "camera {} at {}x{}",
        cfg.camera.source,
        cfg.camera.width,
        cfg.camera.height
    );
    log::info!(
        "motion threshold {}, contour area {}-{}, persistence {}/{}",
        cfg.motion.threshold,
        cfg.motion.min_contour_area,
        cfg.motion.max_contour_area,
        cfg.persistence.min_motion_ticks,
        cfg.persistence.history_len
    );
    log::info!(
        "classifier confidence {} (relaxed {}), min box area {}",
        cfg.classifier.confidence,
        cfg.classifier.relaxed_confidence(),
        cfg.validator.min_box_area
    );
    log::info!("check interval {:?}", cfg.run.interval);

    let store = build_blob_store(&cfg.storage.blob)?;
    log::info!("sightings upload to {} store ({:?})", store.name(), cfg.storage.blob);
    if let Err(err) = store.verify() {
        log::warn!("blob store check failed, uploads may fail: {:#}", err);
    }

    let annotator = Annotator::new(&cfg.annotation)?;
    match &cfg.annotation.font_path {
        Some(path) => log::info!("label font {}", path.display()),
        None => log::info!("label font: bundled DejaVu Sans"),
    }
    let mut emitter = SightingEmitter::new(cfg.emitter.clone(), annotator, store);
    if let Some(dir) = &cfg.storage.local_backup_dir {
        log::info!("local backups in {}", dir.display());
        emitter = emitter.with_backup(Box::new(FilesystemArchive::new(dir)?));
    }

    let detector = build_detector(cfg.model.path.as_deref(), cfg.model.input_size)?;
    let mut classifier = CascadeClassifier::new(cfg.classifier.clone(), detector);
    log::info!("detector backend: {}", classifier.detector_name());
    classifier.warm_up()?;

    let mut pipeline = Pipeline::new(
        cfg.motion.clone(),
        &cfg.persistence,
        classifier,
        cfg.validator.clone(),
        emitter,
    );
    if let Some(dir) = &cfg.storage.motion_dir {
        log::info!("raw motion captures in {}", dir.display());
        pipeline = pipeline.with_motion_archive(
            Box::new(FilesystemArchive::new(dir)?),
            cfg.emitter.jpeg_quality,
        );
    }

    let mut source = CameraSource::new(cfg.camera.clone())?;
    if let Err(err) = source.connect() {
        log::warn!("camera {} not ready: {:#}", cfg.camera.source, err);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let stats = pipeline.run(&mut source, &cfg.run, &stop)?;
    log::info!(
        "birdcamd stopped after {} checks with {} sightings",
        stats.checks,
        stats.sightings
    );
    Ok(())
}
