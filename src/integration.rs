//! Integration module for connecting detectors and PPE verifiers to the
//! tracking engine.
//!
//! The tracker itself never sees pixels. This module owns the frame type,
//! the traits external models implement, and pipelines that drive a
//! [`TrackingEngine`](crate::TrackingEngine) frame by frame, either inline or
//! with the detector on a background thread.

mod detector;
mod frame;
mod pipeline;
mod verifier;
mod worker;

pub use detector::DetectionSource;
pub use frame::Frame;
pub use pipeline::MonitorPipeline;
pub use verifier::PpeVerifier;
pub use worker::{DetectionResult, DetectorWorker, ThreadedPipeline};
