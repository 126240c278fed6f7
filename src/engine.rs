//! Per-frame coordination of tracking and compliance.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::compliance::{Observations, PpeStates};
use crate::config::TrackerConfig;
use crate::error::{ConfigError, EngineError};
use crate::tracker::{BoundingBox, CycleSummary, Detection, TrackId, TrackTable};

/// Detector output available for a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameDetections {
    /// Detections for this frame. An empty batch is still a detection cycle.
    Ready(Vec<Detection>),
    /// The detector was started on this frame and will deliver later
    /// through [`TrackingEngine::reconcile`].
    Pending,
    /// No detector result for this frame: an intermediate frame, or a
    /// detector failure.
    Skipped,
}

/// One frame's output, serialized as
/// `{"frame_number", "active_tracks", "compliance_status": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame_number: u64,
    pub active_tracks: usize,
    pub compliance_status: Vec<TrackReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackReport {
    pub track_id: TrackId,
    pub ppe_status: PpeStates,
    #[serde(skip)]
    pub bbox: BoundingBox,
}

impl FrameReport {
    pub fn track(&self, track_id: TrackId) -> Option<&TrackReport> {
        self.compliance_status.iter().find(|t| t.track_id == track_id)
    }
}

/// Table state saved at the start of a frame whose detections are pending.
#[derive(Debug, Clone)]
struct Checkpoint {
    frame_number: u64,
    table: TrackTable,
    /// Frames processed after `frame_number`, each one a prediction to replay.
    frames_after: u32,
}

/// Tracks identities across frames and folds verifier observations into
/// their compliance states.
///
/// Single-threaded: each frame is fully processed before the next.
#[derive(Debug)]
pub struct TrackingEngine {
    config: TrackerConfig,
    table: TrackTable,
    last_frame: Option<u64>,
    checkpoint: Option<Checkpoint>,
}

impl TrackingEngine {
    pub fn new(config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            table: TrackTable::new(&config),
            config,
            last_frame: None,
            checkpoint: None,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn tracks(&self) -> &TrackTable {
        &self.table
    }

    pub fn ppe_items(&self) -> Arc<[String]> {
        Arc::clone(self.table.ppe_items())
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// Whether the detector is due on `frame_number`.
    pub fn is_detection_frame(&self, frame_number: u64) -> bool {
        frame_number % self.config.detection_interval as u64 == 0
    }

    /// Frame whose detections are still outstanding, if any.
    pub fn pending_frame(&self) -> Option<u64> {
        self.checkpoint.as_ref().map(|c| c.frame_number)
    }

    /// Process one frame.
    ///
    /// `observe` is asked for the current observations of each confirmed
    /// track; `None` leaves that track's compliance state untouched.
    pub fn process_frame<F>(
        &mut self,
        frame_number: u64,
        detections: FrameDetections,
        mut observe: F,
    ) -> Result<FrameReport, EngineError>
    where
        F: FnMut(TrackId, &BoundingBox) -> Option<Observations>,
    {
        if let Some(previous) = self.last_frame {
            if frame_number <= previous {
                return Err(EngineError::OutOfOrderFrame {
                    previous,
                    got: frame_number,
                });
            }
        }

        if let Some(checkpoint) = self.checkpoint.as_mut() {
            checkpoint.frames_after += 1;
        }

        let fresh = match detections {
            FrameDetections::Ready(detections) => {
                if let Some(stale) = self.checkpoint.take() {
                    warn!(
                        pending = stale.frame_number,
                        frame_number, "fresh detections supersede pending batch"
                    );
                }
                let detections = self.confidence_gate(detections);
                let summary = self.table.update(&detections, frame_number);
                log_cycle(frame_number, &summary);
                true
            }
            FrameDetections::Pending => {
                if let Some(stale) = self.checkpoint.take() {
                    warn!(
                        pending = stale.frame_number,
                        frame_number, "dropping unfinished detection request"
                    );
                }
                self.checkpoint = Some(Checkpoint {
                    frame_number,
                    table: self.table.clone(),
                    frames_after: 0,
                });
                self.table.predict();
                false
            }
            FrameDetections::Skipped => {
                self.table.predict();
                false
            }
        };

        self.observe_confirmed(fresh, &mut observe);
        self.last_frame = Some(frame_number);

        Ok(self.report(frame_number))
    }

    /// Apply a detection batch that completed after its frame was processed.
    ///
    /// The association is replayed from the table as it stood at the start
    /// of `requested_frame`, then predicted forward over the frames handled
    /// since. Identities that survive keep the compliance states gathered in
    /// the meantime.
    pub fn reconcile(
        &mut self,
        requested_frame: u64,
        detections: Vec<Detection>,
    ) -> Result<CycleSummary, EngineError> {
        let checkpoint = match self.checkpoint.take() {
            None => {
                return Err(EngineError::NoPendingDetections {
                    requested: requested_frame,
                });
            }
            Some(checkpoint) if checkpoint.frame_number != requested_frame => {
                let pending = checkpoint.frame_number;
                self.checkpoint = Some(checkpoint);
                return Err(EngineError::StaleDetections {
                    requested: requested_frame,
                    pending,
                });
            }
            Some(checkpoint) => checkpoint,
        };

        let Checkpoint {
            frame_number,
            mut table,
            frames_after,
        } = checkpoint;

        table.advance_ids_past(&self.table);
        let detections = self.confidence_gate(detections);
        let summary = table.update(&detections, frame_number);
        for _ in 0..frames_after {
            table.predict();
        }
        table.adopt_compliance(&self.table);
        self.table = table;

        debug!(
            requested_frame,
            replayed = frames_after,
            "reconciled late detections"
        );
        log_cycle(frame_number, &summary);
        Ok(summary)
    }

    /// Forget an outstanding detection request, e.g. after a detector failure.
    pub fn abandon_pending(&mut self) -> Option<u64> {
        self.checkpoint.take().map(|c| c.frame_number)
    }

    /// Snapshot of the current confirmed tracks.
    pub fn report(&self, frame_number: u64) -> FrameReport {
        let compliance_status: Vec<TrackReport> = self
            .table
            .confirmed()
            .map(|track| TrackReport {
                track_id: track.track_id,
                ppe_status: track.ppe().clone(),
                bbox: track.bbox(),
            })
            .collect();

        FrameReport {
            frame_number,
            active_tracks: compliance_status.len(),
            compliance_status,
        }
    }

    fn confidence_gate(&self, mut detections: Vec<Detection>) -> Vec<Detection> {
        let min_confidence = self.config.min_confidence;
        detections.retain(|d| d.score >= min_confidence);
        detections
    }

    /// Gather observations for every eligible confirmed track first, then
    /// apply them one by one.
    fn observe_confirmed<F>(&mut self, fresh: bool, observe: &mut F)
    where
        F: FnMut(TrackId, &BoundingBox) -> Option<Observations>,
    {
        let verify_predicted = self.config.verify_predicted_boxes;
        let collected: Vec<(usize, Observations)> = self
            .table
            .tracks()
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_confirmed())
            .filter(|(_, t)| verify_predicted || (fresh && t.is_fresh()))
            .filter_map(|(idx, t)| observe(t.track_id, &t.bbox()).map(|obs| (idx, obs)))
            .collect();

        let tracks = self.table.tracks_mut();
        for (idx, observations) in collected {
            tracks[idx].ppe_mut().apply(&observations);
        }
    }
}

fn log_cycle(frame_number: u64, summary: &CycleSummary) {
    debug!(
        frame_number,
        matched = summary.matched,
        created = summary.created.len(),
        confirmed = summary.confirmed.len(),
        deleted = summary.deleted.len(),
        discarded = summary.discarded_detections,
        "detection cycle"
    );
}
