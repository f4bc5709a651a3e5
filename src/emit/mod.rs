//! Sighting emission: naming, annotation, and persistence.

mod annotate;
mod emitter;
mod naming;

pub use annotate::{AnnotationConfig, Annotator, DEFAULT_BOX_THICKNESS, DEFAULT_LABEL_SCALE};
pub use emitter::{
    encode_jpeg, EmitterConfig, Sighting, SightingEmitter, SightingRecord, DEFAULT_JPEG_QUALITY,
};
pub use naming::{motion_capture_name, partition_key, SightingName};
