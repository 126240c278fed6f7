mod bbox;
mod kalman_filter;
mod matching;
mod track;
mod track_state;
mod track_table;

pub use bbox::{BoundingBox, iou_batch};
pub use kalman_filter::{KalmanFilter, MotionModel, MotionNoise};
pub use matching::{Association, Detection, associate};
pub use track::{Track, TrackId};
pub use track_state::TrackState;
pub use track_table::{CycleSummary, TrackTable};
