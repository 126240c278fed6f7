//! MonitorPipeline for combining detection, tracking and PPE verification.

use std::fmt::Display;

use tracing::warn;

use crate::config::TrackerConfig;
use crate::engine::{FrameDetections, FrameReport, TrackingEngine};
use crate::error::{ConfigError, EngineError};
use crate::integration::verifier::observe_track;
use crate::integration::{DetectionSource, Frame, PpeVerifier};

/// End-to-end monitor running the detector inline.
///
/// Bundles a `DetectionSource` and a `PpeVerifier` with the
/// `TrackingEngine`. The detector runs on detection frames only; every frame
/// is tracked and its confirmed identities verified.
pub struct MonitorPipeline<D: DetectionSource, V: PpeVerifier> {
    detector: D,
    verifier: V,
    engine: TrackingEngine,
    last_report: Option<FrameReport>,
}

impl<D, V> MonitorPipeline<D, V>
where
    D: DetectionSource,
    D::Error: Display,
    V: PpeVerifier,
    V::Error: Display,
{
    pub fn new(detector: D, verifier: V, config: TrackerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            detector,
            verifier,
            engine: TrackingEngine::new(config)?,
            last_report: None,
        })
    }

    /// Process a single frame and return its report.
    ///
    /// Detector and verifier failures are logged and absorbed; the only
    /// error is a frame number that does not increase.
    pub fn process_frame(
        &mut self,
        frame_number: u64,
        frame: &Frame,
    ) -> Result<FrameReport, EngineError> {
        let detections = if self.engine.is_detection_frame(frame_number) {
            match self.detector.detect(frame) {
                Ok(detections) => FrameDetections::Ready(detections),
                Err(err) => {
                    warn!(frame_number, error = %err, "detector failed, predicting only");
                    FrameDetections::Skipped
                }
            }
        } else {
            FrameDetections::Skipped
        };

        let items = self.engine.ppe_items();
        let verifier = &mut self.verifier;
        let report = self
            .engine
            .process_frame(frame_number, detections, |track_id, bbox| {
                observe_track(verifier, frame, &items, track_id, bbox)
            })?;

        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Stop and return the report of the last fully processed frame.
    pub fn finish(self) -> Option<FrameReport> {
        self.last_report
    }

    pub fn engine(&self) -> &TrackingEngine {
        &self.engine
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn verifier_mut(&mut self) -> &mut V {
        &mut self.verifier
    }
}
