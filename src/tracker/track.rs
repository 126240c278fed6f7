//! A single tracked identity.

use crate::compliance::PpeStates;
use crate::tracker::bbox::BoundingBox;
use crate::tracker::kalman_filter::{KalmanFilter, MotionModel};
use crate::tracker::matching::Detection;
use crate::tracker::track_state::TrackState;

/// Identity assigned by the track table; unique for the lifetime of the table.
pub type TrackId = u64;

/// Single tracked person.
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique track identifier, never reused
    pub track_id: TrackId,
    /// Current lifecycle state
    pub state: TrackState,
    /// Successful matches since creation, the creating detection included
    pub hits: u32,
    /// Consecutive matches since the last miss; gates confirmation
    pub hit_streak: u32,
    /// Detection cycles since the last successful match
    pub age_since_update: u32,
    /// Score of the last matched detection
    pub score: f32,
    /// Frame the track was created on
    pub start_frame: u64,
    /// Frame of the last successful match
    pub frame_id: u64,
    motion: MotionModel,
    ppe: PpeStates,
}

impl Track {
    /// Create a tentative track from an unmatched detection.
    pub(crate) fn new(
        track_id: TrackId,
        detection: &Detection,
        kalman_filter: &KalmanFilter,
        ppe: PpeStates,
        frame_id: u64,
    ) -> Self {
        Self {
            track_id,
            state: TrackState::Tentative,
            hits: 1,
            hit_streak: 1,
            age_since_update: 0,
            score: detection.score,
            start_frame: frame_id,
            frame_id,
            motion: MotionModel::new(kalman_filter, &detection.bbox),
            ppe,
        }
    }

    /// Current box estimate, predicted or corrected.
    pub fn bbox(&self) -> BoundingBox {
        self.motion.bbox()
    }

    pub fn motion(&self) -> &MotionModel {
        &self.motion
    }

    pub fn ppe(&self) -> &PpeStates {
        &self.ppe
    }

    pub fn ppe_mut(&mut self) -> &mut PpeStates {
        &mut self.ppe
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    /// Whether this track was matched on the most recent detection cycle.
    pub fn is_fresh(&self) -> bool {
        self.age_since_update == 0
    }

    pub(crate) fn predict(&mut self) -> BoundingBox {
        self.motion.predict()
    }

    /// Promote to `Confirmed` after `min_hits` consecutive matches.
    pub(crate) fn try_confirm(&mut self, min_hits: u32) -> bool {
        if self.state == TrackState::Tentative && self.hit_streak >= min_hits {
            self.state = TrackState::Confirmed;
            true
        } else {
            false
        }
    }

    /// Apply a successful match. Returns true if the track was just confirmed.
    pub(crate) fn mark_matched(&mut self, detection: &Detection, min_hits: u32, frame_id: u64) -> bool {
        self.motion.update(&detection.bbox);
        self.hits += 1;
        self.hit_streak += 1;
        self.age_since_update = 0;
        self.score = detection.score;
        self.frame_id = frame_id;
        self.try_confirm(min_hits)
    }

    /// Apply a missed detection cycle. Returns true if the track is now deleted.
    ///
    /// `hits` is kept; only the streak toward confirmation starts over.
    pub(crate) fn mark_missed(&mut self, max_age: u32) -> bool {
        self.age_since_update += 1;
        self.hit_streak = 0;
        if self.age_since_update > max_age {
            self.state = TrackState::Deleted;
        }
        self.state == TrackState::Deleted
    }
}
