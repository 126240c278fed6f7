//! Trait for per-person PPE classifiers.

use std::fmt::Display;

use tracing::{debug, warn};

use crate::compliance::Observations;
use crate::integration::Frame;
use crate::tracker::{BoundingBox, TrackId};

/// Classifies the PPE items worn by one cropped person.
pub trait PpeVerifier {
    type Error;

    /// Return an observation per item. Items left out of the map are read
    /// as `Unknown`.
    fn verify(&mut self, crop: &Frame, items: &[String]) -> Result<Observations, Self::Error>;
}

/// Crop `bbox` out of `frame` and run the verifier on it.
///
/// Empty crops and verifier failures yield `None`, which leaves the
/// identity's compliance state as it was.
pub(crate) fn observe_track<V>(
    verifier: &mut V,
    frame: &Frame,
    items: &[String],
    track_id: TrackId,
    bbox: &BoundingBox,
) -> Option<Observations>
where
    V: PpeVerifier,
    V::Error: Display,
{
    let Some(crop) = frame.crop(bbox) else {
        debug!(track_id, "track box is outside the frame, skipping verification");
        return None;
    };
    match verifier.verify(&crop, items) {
        Ok(observations) => Some(observations),
        Err(err) => {
            warn!(track_id, error = %err, "PPE verification failed");
            None
        }
    }
}
