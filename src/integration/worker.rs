//! Detector on a background thread, so slow inference never stalls tracking.

use std::fmt::Display;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, warn};

use crate::config::TrackerConfig;
use crate::engine::{FrameDetections, FrameReport, TrackingEngine};
use crate::error::{ConfigError, EngineError};
use crate::integration::verifier::observe_track;
use crate::integration::{DetectionSource, Frame, PpeVerifier};
use crate::tracker::Detection;

/// A finished request: the frame it was made for and the detector outcome.
pub type DetectionResult = (u64, Result<Vec<Detection>, String>);

/// Runs a `DetectionSource` on its own thread, one request at a time.
pub struct DetectorWorker {
    requests: Option<Sender<(u64, Frame)>>,
    results: Receiver<DetectionResult>,
    handle: Option<JoinHandle<()>>,
    in_flight: Option<u64>,
}

impl DetectorWorker {
    pub fn spawn<D>(mut detector: D) -> Self
    where
        D: DetectionSource + Send + 'static,
        D::Error: Display,
    {
        let (request_tx, request_rx) = channel::bounded::<(u64, Frame)>(1);
        let (result_tx, result_rx) = channel::bounded::<DetectionResult>(1);

        let handle = thread::spawn(move || {
            for (frame_number, frame) in request_rx {
                let result = detector.detect(&frame).map_err(|e| e.to_string());
                if result_tx.send((frame_number, result)).is_err() {
                    break;
                }
            }
        });

        Self {
            requests: Some(request_tx),
            results: result_rx,
            handle: Some(handle),
            in_flight: None,
        }
    }

    /// Frame currently being detected, if any.
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Hand a frame to the detector. Returns false if it is still busy.
    pub fn submit(&mut self, frame_number: u64, frame: Frame) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        let Some(requests) = &self.requests else {
            return false;
        };
        if requests.send((frame_number, frame)).is_err() {
            warn!(frame_number, "detector thread is gone");
            return false;
        }
        self.in_flight = Some(frame_number);
        true
    }

    /// Collect a finished result without blocking.
    pub fn poll(&mut self) -> Option<DetectionResult> {
        match self.results.try_recv() {
            Ok(result) => {
                self.in_flight = None;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.in_flight = None;
                None
            }
        }
    }

    /// Block until the in-flight request finishes or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Option<DetectionResult> {
        self.in_flight?;
        match self.results.recv_timeout(timeout) {
            Ok(result) => {
                self.in_flight = None;
                Some(result)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.in_flight = None;
                None
            }
        }
    }

    /// Stop the thread, discarding any result not yet collected.
    ///
    /// An idle thread is joined. A thread still inside `detect` is detached
    /// instead; it exits on its own once the call returns and its result
    /// has nowhere to go.
    pub fn shutdown(&mut self) {
        self.requests.take();
        let in_flight = self.in_flight.take();
        let finished = match in_flight {
            Some(frame_number) => match self.results.try_recv() {
                Ok(_) => true,
                Err(_) => {
                    debug!(frame_number, "discarding in-flight detection");
                    false
                }
            },
            None => true,
        };
        let Some(handle) = self.handle.take() else {
            return;
        };
        if !finished {
            drop(handle);
            return;
        }
        if handle.join().is_err() {
            warn!("detector thread panicked");
        }
    }
}

impl Drop for DetectorWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// End-to-end monitor with the detector on a `DetectorWorker`.
///
/// On a detection frame the frame is handed to the worker and tracking goes
/// on by prediction. When the batch lands it is applied as of the frame it
/// was requested for.
pub struct ThreadedPipeline<V: PpeVerifier> {
    worker: DetectorWorker,
    verifier: V,
    engine: TrackingEngine,
    last_report: Option<FrameReport>,
}

impl<V> ThreadedPipeline<V>
where
    V: PpeVerifier,
    V::Error: Display,
{
    pub fn new<D>(detector: D, verifier: V, config: TrackerConfig) -> Result<Self, ConfigError>
    where
        D: DetectionSource + Send + 'static,
        D::Error: Display,
    {
        Ok(Self {
            engine: TrackingEngine::new(config)?,
            worker: DetectorWorker::spawn(detector),
            verifier,
            last_report: None,
        })
    }

    pub fn process_frame(
        &mut self,
        frame_number: u64,
        frame: &Frame,
    ) -> Result<FrameReport, EngineError> {
        if let Some(result) = self.worker.poll() {
            self.apply(result);
        }

        let detections = if !self.engine.is_detection_frame(frame_number) {
            FrameDetections::Skipped
        } else if self.worker.submit(frame_number, frame.clone()) {
            FrameDetections::Pending
        } else {
            debug!(
                frame_number,
                busy_with = ?self.worker.in_flight(),
                "detector busy, skipping detection"
            );
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

    /// Wait up to `timeout` for the in-flight batch and apply it.
    /// Returns true if a batch was applied.
    pub fn sync_detections(&mut self, timeout: Duration) -> bool {
        match self.worker.wait(timeout) {
            Some(result) => {
                self.apply(result);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, (frame_number, result): DetectionResult) {
        match result {
            Ok(detections) => {
                if let Err(err) = self.engine.reconcile(frame_number, detections) {
                    warn!(error = %err, "dropping detection batch");
                }
            }
            Err(err) => {
                warn!(frame_number, error = %err, "detector failed, predicting only");
                self.engine.abandon_pending();
            }
        }
    }

    /// Stop the worker, discard unapplied detections and return the report
    /// of the last fully processed frame.
    pub fn finish(mut self) -> Option<FrameReport> {
        self.worker.shutdown();
        self.last_report.take()
    }

    pub fn engine(&self) -> &TrackingEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::{Observations, RawObservation};
    use std::time::Instant;

    struct SlowDetector {
        delay: Duration,
    }

    impl DetectionSource for SlowDetector {
        type Error = String;

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
            thread::sleep(self.delay);
            Ok(vec![Detection::new(10.0, 20.0, 60.0, 120.0, 0.9)])
        }
    }

    struct AlwaysCompliant;

    impl PpeVerifier for AlwaysCompliant {
        type Error = String;

        fn verify(&mut self, _crop: &Frame, items: &[String]) -> Result<Observations, Self::Error> {
            Ok(items
                .iter()
                .map(|item| (item.clone(), RawObservation::Compliant))
                .collect())
        }
    }

    fn config() -> TrackerConfig {
        TrackerConfig {
            detection_interval: 3,
            min_hits: 1,
            ppe_items: vec!["helmet".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_worker_round_trip() {
        let mut worker = DetectorWorker::spawn(SlowDetector {
            delay: Duration::from_millis(1),
        });
        assert!(worker.submit(4, Frame::blank(8, 8, 1)));
        assert!(!worker.submit(5, Frame::blank(8, 8, 1)));

        let (frame_number, result) = worker.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(frame_number, 4);
        assert_eq!(result.unwrap().len(), 1);
        assert_eq!(worker.in_flight(), None);
        worker.shutdown();
    }

    #[test]
    fn test_late_batch_applied_as_of_requested_frame() {
        let detector = SlowDetector {
            delay: Duration::from_millis(20),
        };
        let mut pipeline = ThreadedPipeline::new(detector, AlwaysCompliant, config()).unwrap();
        let frame = Frame::blank(320, 240, 3);

        let report = pipeline.process_frame(0, &frame).unwrap();
        assert_eq!(report.active_tracks, 0);
        assert_eq!(pipeline.engine().pending_frame(), Some(0));

        // The batch may already have landed while frame 1 was processed.
        pipeline.process_frame(1, &frame).unwrap();
        pipeline.sync_detections(Duration::from_secs(5));
        assert_eq!(pipeline.engine().pending_frame(), None);

        let report = pipeline.process_frame(2, &frame).unwrap();
        assert_eq!(report.active_tracks, 1);
        let track = pipeline.engine().tracks().get(1).unwrap();
        assert_eq!(track.start_frame, 0);
    }

    #[test]
    fn test_finish_does_not_wait_for_stalled_detector() {
        let detector = SlowDetector {
            delay: Duration::from_secs(30),
        };
        let mut pipeline = ThreadedPipeline::new(detector, AlwaysCompliant, config()).unwrap();
        let frame = Frame::blank(320, 240, 3);
        pipeline.process_frame(0, &frame).unwrap();
        pipeline.process_frame(1, &frame).unwrap();

        let started = Instant::now();
        let last = pipeline.finish().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(last.frame_number, 1);
        assert_eq!(last.active_tracks, 0);
    }

    #[test]
    fn test_finish_discards_in_flight_detections() {
        let detector = SlowDetector {
            delay: Duration::from_millis(50),
        };
        let mut pipeline = ThreadedPipeline::new(detector, AlwaysCompliant, config()).unwrap();
        let frame = Frame::blank(320, 240, 3);
        pipeline.process_frame(0, &frame).unwrap();

        let last = pipeline.finish().unwrap();
        assert_eq!(last.frame_number, 0);
        assert_eq!(last.active_tracks, 0);
    }
}
