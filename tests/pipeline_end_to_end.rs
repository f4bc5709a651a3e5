use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::Result;
use birdcam::classify::{CascadeClassifier, ClassifierConfig};
use birdcam::detect::{BoundingBox, CallLog, RawDetection, Reply, ScriptedDetector};
use birdcam::emit::{AnnotationConfig, Annotator, EmitterConfig, SightingEmitter};
use birdcam::ingest::{CameraConfig, CameraSource, FrameSource};
use birdcam::motion::{MotionConfig, PersistenceConfig};
use birdcam::pipeline::{Pipeline, RunOptions, TickOutcome};
use birdcam::storage::{BlobStore, FilesystemArchive, InMemoryBlobStore};
use birdcam::validate::ValidatorConfig;
use birdcam::Frame;
use chrono::{Local, TimeZone};
use image::{Rgb, RgbImage};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

fn background() -> RgbImage {
    RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([20, 30, 40]))
}

fn with_patch() -> RgbImage {
    let mut image = background();
    for y in 480..520 {
        for x in 480..520 {
            image.put_pixel(x, y, Rgb([250, 250, 250]));
        }
    }
    image
}

fn frame_at(image: RgbImage, second: u32, sequence: u64) -> Frame {
    let at = Local
        .with_ymd_and_hms(2025, 2, 12, 23, 59, second)
        .unwrap();
    Frame::new(image, at, sequence)
}

fn perched_bird() -> RawDetection {
    RawDetection::bird(BoundingBox::new(475.0, 480.0, 525.0, 520.0), 0.5)
}

fn pipeline(detector: ScriptedDetector, store: &InMemoryBlobStore) -> Result<(Pipeline, CallLog)> {
    let calls = detector.call_log();
    let emitter = SightingEmitter::new(
        EmitterConfig::default(),
        Annotator::new(&AnnotationConfig::default())?,
        Box::new(store.clone()),
    );
    let pipeline = Pipeline::new(
        MotionConfig::default(),
        &PersistenceConfig::default(),
        CascadeClassifier::new(ClassifierConfig::default(), Box::new(detector)),
        ValidatorConfig::default(),
        emitter,
    );
    Ok((pipeline, calls))
}

#[test]
fn bird_visit_produces_one_sighting() -> Result<()> {
    let store = InMemoryBlobStore::new();
    let (mut pipeline, calls) = pipeline(ScriptedDetector::always(vec![perched_bird()]), &store)?;

    assert_eq!(pipeline.tick(frame_at(background(), 57, 1))?, TickOutcome::Primed);
    let outcome = pipeline.tick(frame_at(with_patch(), 58, 2))?;
    let TickOutcome::Sighting(record) = outcome else {
        panic!("expected a sighting, got {:?}", outcome);
    };
    assert_eq!(
        record.address,
        "02-12-2025/bird_20250212_235958_count_1_conf_0.50.jpg"
    );
    assert_eq!(record.count, 1);
    assert_eq!(record.avg_confidence, 0.5);
    assert!(record.uploaded);
    assert!(record.local_path.is_none());

    assert_eq!(store.keys(), vec![record.address.clone()]);
    let jpeg = store.get(&record.address)?;
    let decoded = image::load_from_memory(&jpeg)?;
    assert_eq!((decoded.width(), decoded.height()), (WIDTH, HEIGHT));

    // Found on the first attempt, at the configured confidence.
    let calls = calls.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!((calls[0].width, calls[0].height), (WIDTH, HEIGHT));
    assert_eq!(calls[0].threshold, 0.15);

    let stats = pipeline.stats();
    assert_eq!(stats.checks, 1);
    assert_eq!(stats.motions, 1);
    assert_eq!(stats.classifier_runs, 1);
    assert_eq!(stats.sightings, 1);
    Ok(())
}

#[test]
fn static_scene_never_calls_the_detector() -> Result<()> {
    let store = InMemoryBlobStore::new();
    let (mut pipeline, calls) = pipeline(ScriptedDetector::always(vec![perched_bird()]), &store)?;

    for i in 0..10u32 {
        let outcome = pipeline.tick(frame_at(background(), i, u64::from(i) + 1))?;
        if i > 0 {
            assert_eq!(outcome, TickOutcome::NoMotion);
        }
    }
    assert!(calls.is_empty());
    assert!(store.is_empty());
    assert_eq!(pipeline.stats().motions, 0);
    Ok(())
}

#[test]
fn single_scene_change_is_debounced() -> Result<()> {
    let store = InMemoryBlobStore::new();
    let (mut pipeline, calls) = pipeline(ScriptedDetector::always(vec![perched_bird()]), &store)?;

    pipeline.tick(frame_at(background(), 0, 1))?;
    assert_eq!(pipeline.tick(frame_at(background(), 1, 2))?, TickOutcome::NoMotion);
    assert_eq!(
        pipeline.tick(frame_at(with_patch(), 2, 3))?,
        TickOutcome::Debounced { regions: 1 }
    );
    assert_eq!(pipeline.tick(frame_at(with_patch(), 3, 4))?, TickOutcome::NoMotion);
    assert_eq!(pipeline.tick(frame_at(with_patch(), 4, 5))?, TickOutcome::NoMotion);

    assert!(calls.is_empty());
    assert!(store.is_empty());
    Ok(())
}

#[test]
fn enhanced_frame_is_tried_when_full_frame_misses() -> Result<()> {
    let store = InMemoryBlobStore::new();
    let detector = ScriptedDetector::empty().with_replies([
        Reply::Detections(Vec::new()),
        Reply::Detections(vec![perched_bird()]),
    ]);
    let (mut pipeline, calls) = pipeline(detector, &store)?;

    pipeline.tick(frame_at(background(), 0, 1))?;
    let outcome = pipeline.tick(frame_at(with_patch(), 1, 2))?;

    assert!(matches!(outcome, TickOutcome::Sighting(_)));
    assert_eq!(calls.len(), 2);
    assert_eq!(store.len(), 1);
    Ok(())
}

#[test]
fn failed_upload_keeps_the_local_backup() -> Result<()> {
    let backup_dir = tempfile::tempdir()?;
    let store = InMemoryBlobStore::new();
    store.set_failing(true);
    let emitter = SightingEmitter::new(
        EmitterConfig::default(),
        Annotator::new(&AnnotationConfig::default())?,
        Box::new(store.clone()),
    )
    .with_backup(Box::new(FilesystemArchive::new(backup_dir.path())?));
    let mut pipeline = Pipeline::new(
        MotionConfig::default(),
        &PersistenceConfig::default(),
        CascadeClassifier::new(
            ClassifierConfig::default(),
            Box::new(ScriptedDetector::always(vec![perched_bird()])),
        ),
        ValidatorConfig::default(),
        emitter,
    );

    pipeline.tick(frame_at(background(), 0, 1))?;
    let TickOutcome::Sighting(record) = pipeline.tick(frame_at(with_patch(), 1, 2))? else {
        panic!("expected a sighting");
    };

    assert!(!record.uploaded);
    let local = record.local_path.expect("backup written");
    assert!(local.starts_with(backup_dir.path()));
    assert!(local.exists());
    assert_eq!(pipeline.stats().failed_uploads, 1);
    Ok(())
}

#[test]
fn motion_frames_are_archived_before_classification() -> Result<()> {
    let motion_dir = tempfile::tempdir()?;
    let store = InMemoryBlobStore::new();
    let (pipeline, calls) = pipeline(ScriptedDetector::empty(), &store)?;
    let mut pipeline = pipeline.with_motion_archive(
        Box::new(FilesystemArchive::new(motion_dir.path())?),
        80,
    );

    pipeline.tick(frame_at(background(), 10, 1))?;
    assert_eq!(pipeline.tick(frame_at(with_patch(), 11, 2))?, TickOutcome::NoBird);
    assert_eq!(pipeline.tick(frame_at(background(), 12, 3))?, TickOutcome::NoBird);

    assert!(calls.len() >= 2);
    assert!(store.is_empty());
    let mut names = file_names(motion_dir.path())?;
    names.sort();
    assert_eq!(
        names,
        vec![
            "motion_20250212_235911_areas_1.jpg".to_string(),
            "motion_20250212_235912_areas_1.jpg".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn run_replays_an_image_directory() -> Result<()> {
    let frames_dir = tempfile::tempdir()?;
    background().save(frames_dir.path().join("000.png"))?;
    with_patch().save(frames_dir.path().join("001.png"))?;
    with_patch().save(frames_dir.path().join("002.png"))?;

    let mut source = CameraSource::new(CameraConfig {
        source: frames_dir.path().display().to_string(),
        width: WIDTH,
        height: HEIGHT,
        target_fps: 0,
    })?;
    source.connect()?;

    let store = InMemoryBlobStore::new();
    let (mut pipeline, _calls) = pipeline(ScriptedDetector::always(vec![perched_bird()]), &store)?;
    let options = RunOptions {
        interval: Duration::ZERO,
        max_ticks: Some(3),
        ..RunOptions::default()
    };
    let stats = pipeline.run(&mut source, &options, &AtomicBool::new(false))?;

    assert_eq!(stats.checks, 2);
    assert_eq!(stats.motions, 1);
    assert_eq!(stats.sightings, 1);
    let keys = store.keys();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].ends_with("_count_1_conf_0.50.jpg"));
    Ok(())
}

#[test]
fn run_stops_when_the_source_is_exhausted() -> Result<()> {
    let frames_dir = tempfile::tempdir()?;
    background().save(frames_dir.path().join("000.png"))?;

    let mut source = CameraSource::new(CameraConfig {
        source: frames_dir.path().display().to_string(),
        width: WIDTH,
        height: HEIGHT,
        target_fps: 0,
    })?;
    source.connect()?;

    let store = InMemoryBlobStore::new();
    let (mut pipeline, _calls) = pipeline(ScriptedDetector::empty(), &store)?;
    let options = RunOptions {
        interval: Duration::ZERO,
        ..RunOptions::default()
    };
    assert!(pipeline
        .run(&mut source, &options, &AtomicBool::new(false))
        .is_err());
    assert_eq!(pipeline.stats().checks, 0);
    Ok(())
}

fn file_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

#[test]
fn full_resolution_two_frame_visit() -> Result<()> {
    let store = InMemoryBlobStore::new();
    let (mut pipeline, _calls) =
        pipeline(ScriptedDetector::always(vec![perched_bird()]), &store)?;

    let mut before = RgbImage::from_pixel(1920, 1080, Rgb([20, 30, 40]));
    let at = Local.with_ymd_and_hms(2025, 6, 1, 7, 45, 10).unwrap();
    assert_eq!(
        pipeline.tick(Frame::new(before.clone(), at, 1))?,
        TickOutcome::Primed
    );

    for y in 480..520 {
        for x in 480..520 {
            before.put_pixel(x, y, Rgb([250, 250, 250]));
        }
    }
    let at = Local.with_ymd_and_hms(2025, 6, 1, 7, 45, 11).unwrap();
    let TickOutcome::Sighting(record) = pipeline.tick(Frame::new(before, at, 2))? else {
        panic!("expected a sighting on the second frame");
    };
    assert_eq!(record.count, 1);
    assert_eq!(record.avg_confidence, 0.5);
    assert_eq!(
        record.address,
        "06-01-2025/bird_20250601_074511_count_1_conf_0.50.jpg"
    );
    assert_eq!(store.len(), 1);
    Ok(())
}
