//! Person tracking with sticky PPE compliance state.
//!
//! A SORT-style tracker (Kalman motion model, IoU cost, optimal assignment)
//! keeps a persistent id per person while the detector runs only every Nth
//! frame. Each confirmed identity carries one state machine per PPE item that
//! holds its last confident verdict through occlusion.

pub mod compliance;
pub mod config;
pub mod engine;
pub mod error;
pub mod integration;
pub mod tracker;

pub use compliance::{ComplianceState, Observations, PpeStates, RawObservation};
pub use config::{MonitorConfig, TrackerConfig};
pub use engine::{FrameDetections, FrameReport, TrackReport, TrackingEngine};
pub use error::{ConfigError, EngineError};
pub use integration::{
    DetectionSource, DetectorWorker, Frame, MonitorPipeline, PpeVerifier, ThreadedPipeline,
};
pub use tracker::{BoundingBox, Detection, Track, TrackId, TrackState, TrackTable};
