//! Association of predicted track boxes with fresh detections.

use ndarray::Array2;
use tracing::debug;

use crate::tracker::bbox::{BoundingBox, iou_batch};

/// Detection input for the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Detection confidence score
    pub score: f32,
}

impl Detection {
    /// Create a detection from corner coordinates (x1, y1, x2, y2).
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self {
            bbox: BoundingBox::from_tlbr(x1, y1, x2, y2),
            score,
        }
    }

    pub fn from_bbox(bbox: BoundingBox, score: f32) -> Self {
        Self { bbox, score }
    }
}

/// Compute IoU distance matrix between tracks and detections.
pub fn iou_distance(track_boxes: &[BoundingBox], det_boxes: &[BoundingBox]) -> Array2<f32> {
    iou_batch(track_boxes, det_boxes).mapv(|iou| 1.0 - iou)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Solve the minimum-cost assignment and drop pairs whose cost exceeds `thresh`.
///
/// Rejected pairs fall back into both unmatched sets. Indices in every list
/// are ascending.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: vec![],
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    if num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: vec![],
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);

    for i in 0..num_rows {
        for j in 0..num_cols {
            padded[[i, j]] = cost_matrix[[i, j]] as f64;
        }
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask: Vec<bool> = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
                if col_idx < num_cols && cost_matrix[[row_idx, col_idx]] <= thresh {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(err) => {
            debug!(?err, rows = num_rows, cols = num_cols, "assignment solver failed");
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections: Vec<usize> = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| if u { Some(i) } else { None })
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

/// Output of one association cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Association {
    /// (track index, detection index) pairs.
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    /// Valid detections left without a track; each seeds a new identity.
    pub unmatched_detections: Vec<usize>,
    /// Detections with degenerate geometry, never matched and never used to
    /// create a track.
    pub discarded_detections: Vec<usize>,
}

/// Match predicted track boxes to detections by IoU.
///
/// A pair is only accepted when its IoU is at least `iou_threshold`, even if
/// the optimal assignment selected it.
pub fn associate(
    predicted: &[BoundingBox],
    detections: &[Detection],
    iou_threshold: f32,
) -> Association {
    let (valid, discarded_detections): (Vec<usize>, Vec<usize>) =
        (0..detections.len()).partition(|&j| !detections[j].bbox.is_degenerate());

    if !discarded_detections.is_empty() {
        debug!(
            count = discarded_detections.len(),
            "discarding degenerate detections"
        );
    }

    let det_boxes: Vec<BoundingBox> = valid.iter().map(|&j| detections[j].bbox).collect();
    let dists = iou_distance(predicted, &det_boxes);

    let AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    } = linear_assignment(&dists, 1.0 - iou_threshold);

    // Map the compacted detection indices back to the caller's indices.
    Association {
        matches: matches.into_iter().map(|(i, j)| (i, valid[j])).collect(),
        unmatched_tracks,
        unmatched_detections: unmatched_detections.into_iter().map(|j| valid[j]).collect(),
        discarded_detections,
    }
}
