use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::detect::backend::ObjectDetector;
use crate::detect::result::{RawDetection, TargetClass};

/// One scripted detector response.
#[derive(Clone, Debug)]
pub enum Reply {
    Detections(Vec<RawDetection>),
    Fail(String),
}

/// A recorded `detect` invocation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectCall {
    pub width: u32,
    pub height: u32,
    pub threshold: f32,
}

/// Shared view of the calls a [`ScriptedDetector`] received.
#[derive(Clone, Debug, Default)]
pub struct CallLog(Arc<Mutex<Vec<DetectCall>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<DetectCall> {
        match self.0.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.calls().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, call: DetectCall) {
        match self.0.lock() {
            Ok(mut guard) => guard.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }
}

/// Stub detector for tests and dry runs.
///
/// Replies are consumed in order; once the queue is empty the fallback reply
/// is used for every call. Detections below the per-call threshold are
/// dropped, as a real detector would.
pub struct ScriptedDetector {
    queue: VecDeque<Reply>,
    fallback: Reply,
    log: CallLog,
}

impl ScriptedDetector {
    /// Detector that never finds anything.
    pub fn empty() -> Self {
        Self::always(Vec::new())
    }

    /// Detector that returns the same detections on every call.
    pub fn always(detections: Vec<RawDetection>) -> Self {
        Self {
            queue: VecDeque::new(),
            fallback: Reply::Detections(detections),
            log: CallLog::default(),
        }
    }

    /// Queue replies ahead of the fallback.
    pub fn with_replies<I: IntoIterator<Item = Reply>>(mut self, replies: I) -> Self {
        self.queue.extend(replies);
        self
    }

    /// Replace the fallback reply.
    pub fn with_fallback(mut self, fallback: Reply) -> Self {
        self.fallback = fallback;
        self
    }

    /// Handle for inspecting calls after the detector has been moved.
    pub fn call_log(&self) -> CallLog {
        self.log.clone()
    }
}

impl Default for ScriptedDetector {
    fn default() -> Self {
        Self::empty()
    }
}

impl ObjectDetector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(
        &mut self,
        image: &RgbImage,
        target: TargetClass,
        threshold: f32,
    ) -> Result<Vec<RawDetection>> {
        self.log.record(DetectCall {
            width: image.width(),
            height: image.height(),
            threshold,
        });

        let reply = self.queue.pop_front().unwrap_or_else(|| self.fallback.clone());
        match reply {
            Reply::Detections(detections) => Ok(detections
                .into_iter()
                .filter(|d| d.class == target && d.confidence >= threshold)
                .collect()),
            Reply::Fail(message) => Err(anyhow!(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;

    fn detection(confidence: f32) -> RawDetection {
        RawDetection::bird(BoundingBox::new(0.0, 0.0, 10.0, 10.0), confidence)
    }

    #[test]
    fn replies_then_fallback() -> Result<()> {
        let mut detector = ScriptedDetector::empty()
            .with_replies([Reply::Detections(vec![detection(0.9)]), Reply::Fail("boom".into())]);
        let log = detector.call_log();
        let image = RgbImage::new(8, 6);

        assert_eq!(detector.detect(&image, TargetClass::Bird, 0.5)?.len(), 1);
        assert!(detector.detect(&image, TargetClass::Bird, 0.5).is_err());
        assert!(detector.detect(&image, TargetClass::Bird, 0.5)?.is_empty());

        let calls = log.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[0],
            DetectCall {
                width: 8,
                height: 6,
                threshold: 0.5
            }
        );
        Ok(())
    }

    #[test]
    fn threshold_filters_scripted_detections() -> Result<()> {
        let mut detector = ScriptedDetector::always(vec![detection(0.1)]);
        let image = RgbImage::new(4, 4);
        assert!(detector.detect(&image, TargetClass::Bird, 0.15)?.is_empty());
        assert_eq!(detector.detect(&image, TargetClass::Bird, 0.09)?.len(), 1);
        Ok(())
    }
}
