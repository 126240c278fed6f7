//! Owner of all live identities and their lifecycle transitions.

use std::sync::Arc;

use tracing::debug;

use crate::compliance::PpeStates;
use crate::config::TrackerConfig;
use crate::tracker::bbox::BoundingBox;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, Association, Detection};
use crate::tracker::track::{Track, TrackId};
use crate::tracker::track_state::TrackState;

/// What one detection cycle did to the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub matched: usize,
    pub created: Vec<TrackId>,
    pub confirmed: Vec<TrackId>,
    pub deleted: Vec<TrackId>,
    pub discarded_detections: usize,
}

/// The set of live tracks.
///
/// Tracks are kept in ascending id order. Ids come from a counter owned by
/// the table and are never handed out twice.
#[derive(Debug, Clone)]
pub struct TrackTable {
    tracks: Vec<Track>,
    next_id: TrackId,
    kalman_filter: KalmanFilter,
    ppe_items: Arc<[String]>,
    min_hits: u32,
    max_age: u32,
    iou_threshold: f32,
}

impl TrackTable {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            kalman_filter: KalmanFilter::new(&config.motion),
            ppe_items: config.ppe_items.iter().cloned().collect(),
            min_hits: config.min_hits,
            max_age: config.max_age,
            iou_threshold: config.iou_threshold,
        }
    }

    /// Advance every live track one frame without touching lifecycle counters.
    pub fn predict(&mut self) -> Vec<BoundingBox> {
        self.tracks.iter_mut().map(Track::predict).collect()
    }

    /// Run one detection cycle: predict, associate, then create, confirm,
    /// age and delete tracks.
    pub fn update(&mut self, detections: &[Detection], frame_id: u64) -> CycleSummary {
        let predicted = self.predict();

        let Association {
            matches,
            unmatched_tracks,
            unmatched_detections,
            discarded_detections,
        } = matching::associate(&predicted, detections, self.iou_threshold);

        let mut summary = CycleSummary {
            matched: matches.len(),
            discarded_detections: discarded_detections.len(),
            ..Default::default()
        };

        for (itrack, idet) in matches {
            let track = &mut self.tracks[itrack];
            if track.mark_matched(&detections[idet], self.min_hits, frame_id) {
                debug!(track_id = track.track_id, frame_id, "track confirmed");
                summary.confirmed.push(track.track_id);
            }
        }

        for itrack in unmatched_tracks {
            let track = &mut self.tracks[itrack];
            if track.mark_missed(self.max_age) {
                debug!(
                    track_id = track.track_id,
                    frame_id,
                    age = track.age_since_update,
                    "track deleted"
                );
                summary.deleted.push(track.track_id);
            }
        }
        self.tracks.retain(|t| t.state != TrackState::Deleted);

        for idet in unmatched_detections {
            let track_id = self.next_track_id();
            let mut track = Track::new(
                track_id,
                &detections[idet],
                &self.kalman_filter,
                PpeStates::new(Arc::clone(&self.ppe_items)),
                frame_id,
            );
            debug!(track_id, frame_id, "track created");
            summary.created.push(track_id);
            if track.try_confirm(self.min_hits) {
                summary.confirmed.push(track_id);
            }
            self.tracks.push(track);
        }

        summary
    }

    fn next_track_id(&mut self) -> TrackId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The id the next created track will receive.
    pub fn next_id(&self) -> TrackId {
        self.next_id
    }

    /// Make sure this table never issues an id `other` may already have issued.
    pub(crate) fn advance_ids_past(&mut self, other: &TrackTable) {
        self.next_id = self.next_id.max(other.next_id);
    }

    /// Take compliance states from `other` for every identity both tables hold.
    pub(crate) fn adopt_compliance(&mut self, other: &TrackTable) {
        for track in &mut self.tracks {
            if let Some(source) = other.get(track.track_id) {
                track.ppe_mut().copy_from(source.ppe());
            }
        }
    }

    pub fn get(&self, track_id: TrackId) -> Option<&Track> {
        self.tracks
            .binary_search_by_key(&track_id, |t| t.track_id)
            .ok()
            .map(|idx| &self.tracks[idx])
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Confirmed tracks, in ascending id order.
    pub fn confirmed(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.is_confirmed())
    }

    pub(crate) fn tracks_mut(&mut self) -> &mut [Track] {
        &mut self.tracks
    }

    pub fn ppe_items(&self) -> &Arc<[String]> {
        &self.ppe_items
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
