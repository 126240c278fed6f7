//! Tracker configuration and the deployment YAML layout it is loaded from.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::tracker::MotionNoise;

/// Configuration for the tracking engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Run the detector every N frames
    pub detection_interval: u32,
    /// Matches required before a track is confirmed
    pub min_hits: u32,
    /// Missed detection cycles tolerated before a track is deleted
    pub max_age: u32,
    /// Minimum IoU to accept a track/detection pair
    pub iou_threshold: f32,
    /// Detections scoring below this are ignored
    pub min_confidence: f32,
    /// PPE items in report order
    pub ppe_items: Vec<String>,
    /// Verify confirmed tracks on frames where their box is only predicted
    pub verify_predicted_boxes: bool,
    pub motion: MotionNoise,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            detection_interval: 5,
            min_hits: 3,
            max_age: 30,
            iou_threshold: 0.3,
            min_confidence: 0.5,
            ppe_items: ["helmet", "uniform", "glasses", "breathing_device"]
                .into_iter()
                .map(String::from)
                .collect(),
            verify_predicted_boxes: true,
            motion: MotionNoise::default(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detection_interval == 0 {
            return Err(ConfigError::invalid("detection_interval", "must be at least 1"));
        }
        if self.min_hits == 0 {
            return Err(ConfigError::invalid("min_hits", "must be at least 1"));
        }
        if self.max_age == 0 {
            return Err(ConfigError::invalid("max_age", "must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.iou_threshold) {
            return Err(ConfigError::invalid(
                "iou_threshold",
                format!("{} is outside [0, 1)", self.iou_threshold),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::invalid(
                "min_confidence",
                format!("{} is outside [0, 1]", self.min_confidence),
            ));
        }
        if self.ppe_items.is_empty() {
            return Err(ConfigError::invalid("ppe_items", "at least one item is required"));
        }
        let mut seen = HashSet::new();
        for item in &self.ppe_items {
            if item.trim().is_empty() {
                return Err(ConfigError::invalid("ppe_items", "item names cannot be blank"));
            }
            if !seen.insert(item.as_str()) {
                return Err(ConfigError::invalid(
                    "ppe_items",
                    format!("duplicate item {item:?}"),
                ));
            }
        }
        if !self.motion.is_valid() {
            return Err(ConfigError::invalid(
                "motion",
                "noise must be finite and non-negative, measurement noise positive",
            ));
        }
        Ok(())
    }
}

/// `tracker:` section of the deployment file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackerSection {
    pub max_age: Option<u32>,
    pub min_hits: Option<u32>,
    pub iou_threshold: Option<f32>,
    pub verify_predicted_boxes: Option<bool>,
    pub motion: Option<MotionNoise>,
}

/// `person_detector:` section of the deployment file. Only the confidence
/// gate concerns the tracker; model settings belong to the detector.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectorSection {
    pub confidence_threshold: Option<f32>,
}

/// Deployment configuration file.
///
/// ```yaml
/// run_detection_every_n_frames: 5
/// ppe_items: [helmet, uniform]
/// tracker:
///   max_age: 30
///   min_hits: 3
///   iou_threshold: 0.3
/// person_detector:
///   confidence_threshold: 0.5
/// ```
///
/// Unrelated keys such as the video source are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorConfig {
    pub run_detection_every_n_frames: Option<u32>,
    pub ppe_items: Option<Vec<String>>,
    #[serde(default)]
    pub tracker: TrackerSection,
    #[serde(default)]
    pub person_detector: DetectorSection,
}

impl MonitorConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "loading config");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Resolve against the defaults and validate.
    pub fn into_tracker_config(self) -> Result<TrackerConfig, ConfigError> {
        let defaults = TrackerConfig::default();
        let config = TrackerConfig {
            detection_interval: self
                .run_detection_every_n_frames
                .unwrap_or(defaults.detection_interval),
            min_hits: self.tracker.min_hits.unwrap_or(defaults.min_hits),
            max_age: self.tracker.max_age.unwrap_or(defaults.max_age),
            iou_threshold: self.tracker.iou_threshold.unwrap_or(defaults.iou_threshold),
            min_confidence: self
                .person_detector
                .confidence_threshold
                .unwrap_or(defaults.min_confidence),
            ppe_items: self.ppe_items.unwrap_or(defaults.ppe_items),
            verify_predicted_boxes: self
                .tracker
                .verify_predicted_boxes
                .unwrap_or(defaults.verify_predicted_boxes),
            motion: self.tracker.motion.unwrap_or(defaults.motion),
        };
        config.validate()?;
        Ok(config)
    }
}
