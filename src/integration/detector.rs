//! Trait for person detection backends.

use crate::integration::Frame;
use crate::tracker::Detection;

/// Trait for person detection backends.
///
/// Implement this trait to connect any detection model to the tracker. The
/// detector is only run on detection frames, every `detection_interval`
/// frames.
///
/// # Example
///
/// ```ignore
/// use ppe_track::{DetectionSource, Detection, Frame};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error> {
///         // Run inference and return person boxes
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for detection failures.
    type Error;

    /// Run inference on a frame and return person detections.
    ///
    /// An error is not fatal: the frame is tracked by prediction only.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Self::Error>;
}
