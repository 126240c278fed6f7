//! Constant-velocity Kalman filter over bounding boxes, using ndarray and a
//! nalgebra-based 4x4 inverse.
//!
//! State is `[cx, cy, s, r, vcx, vcy, vs, vr]` where `s` is box area and `r`
//! the aspect ratio. The aspect ratio is assumed to change slowly, so `vr` is
//! pinned to zero.

use ndarray::{Array1, Array2};
use serde::Deserialize;
use tracing::warn;

use crate::tracker::bbox::BoundingBox;

const NDIM: usize = 4;
const ASPECT_VELOCITY: usize = 7;

/// Noise and initial-uncertainty constants for the motion model.
///
/// Each field is the diagonal of the corresponding covariance matrix.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MotionNoise {
    /// Measurement noise R over `[cx, cy, s, r]`.
    pub measurement: [f64; 4],
    /// Process noise Q over the full state.
    pub process: [f64; 8],
    /// Initial covariance P. Velocities start far less certain than
    /// positions because a single detection cannot observe them.
    pub initial: [f64; 8],
}

impl Default for MotionNoise {
    fn default() -> Self {
        Self {
            measurement: [1.0, 1.0, 10.0, 10.0],
            process: [1.0, 1.0, 1.0, 1.0, 1e-2, 1e-2, 1e-4, 0.0],
            initial: [10.0, 10.0, 10.0, 10.0, 1e4, 1e4, 1e4, 0.0],
        }
    }
}

impl MotionNoise {
    /// Whether every constant is finite and non-negative, with strictly
    /// positive measurement noise so the innovation covariance stays invertible.
    pub fn is_valid(&self) -> bool {
        self.measurement.iter().all(|v| v.is_finite() && *v > 0.0)
            && self
                .process
                .iter()
                .chain(self.initial.iter())
                .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Shared, immutable filter matrices.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    motion_cov: Array2<f64>,
    innovation_cov: Array2<f64>,
    initial_cov: Array2<f64>,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(&MotionNoise::default())
    }
}

impl KalmanFilter {
    pub fn new(noise: &MotionNoise) -> Self {
        // Position, scale and aspect all integrate their velocity except the
        // aspect ratio, which is held constant.
        let mut motion_mat = Array2::eye(2 * NDIM);
        for i in 0..NDIM - 1 {
            motion_mat[[i, NDIM + i]] = 1.0;
        }

        let mut update_mat = Array2::zeros((NDIM, 2 * NDIM));
        for i in 0..NDIM {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            motion_cov: Array2::from_diag(&Array1::from_vec(noise.process.to_vec())),
            innovation_cov: Array2::from_diag(&Array1::from_vec(noise.measurement.to_vec())),
            initial_cov: Array2::from_diag(&Array1::from_vec(noise.initial.to_vec())),
        }
    }

    /// Mean and covariance for a track born from `measurement`, with zero velocity.
    pub fn initiate(&self, measurement: [f64; 4]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::zeros(2 * NDIM);
        for i in 0..NDIM {
            mean[i] = measurement[i];
        }
        (mean, self.initial_cov.clone())
    }

    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let mut mean = mean.clone();
        // Area cannot shrink through zero.
        if mean[2] + mean[6] <= 0.0 {
            mean[6] = 0.0;
        }
        mean[ASPECT_VELOCITY] = 0.0;

        let new_mean = self.motion_mat.dot(&mean);
        let new_covariance =
            self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + &self.motion_cov;

        (new_mean, new_covariance)
    }

    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + &self.innovation_cov;

        (mean_proj, covariance_proj)
    }

    /// Correction step. Returns `None` if the innovation covariance is singular.
    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 4],
    ) -> Option<(Array1<f64>, Array2<f64>)> {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let measurement_arr = Array1::from_vec(measurement.to_vec());
        let innovation = measurement_arr - projected_mean;

        // K = P * H^T * S^-1
        let s_inv = invert_4x4(&projected_cov)?;
        let pht = covariance.dot(&self.update_mat.t()); // 8x4
        let kalman_gain = pht.dot(&s_inv); // 8x4

        let mut new_mean = mean + &kalman_gain.dot(&innovation);
        new_mean[ASPECT_VELOCITY] = 0.0;
        let new_covariance = covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        Some((new_mean, new_covariance))
    }
}

/// Invert a 4x4 matrix through nalgebra (pure Rust, no LAPACK).
fn invert_4x4(m: &Array2<f64>) -> Option<Array2<f64>> {
    let mut nm = nalgebra::Matrix4::zeros();
    for i in 0..4 {
        for j in 0..4 {
            nm[(i, j)] = m[[i, j]];
        }
    }
    let inv = nm.try_inverse()?;
    let mut res = Array2::zeros((4, 4));
    for i in 0..4 {
        for j in 0..4 {
            res[[i, j]] = inv[(i, j)];
        }
    }
    Some(res)
}

/// Per-identity motion estimate.
///
/// Owns its state and covariance; the filter matrices are copied in at
/// creation so the model can step on its own.
#[derive(Debug, Clone)]
pub struct MotionModel {
    filter: KalmanFilter,
    mean: Array1<f64>,
    covariance: Array2<f64>,
}

impl MotionModel {
    /// Start a model centered on the first observed box, at rest.
    pub fn new(filter: &KalmanFilter, initial: &BoundingBox) -> Self {
        let (mean, covariance) = filter.initiate(initial.to_measurement());
        Self {
            filter: filter.clone(),
            mean,
            covariance,
        }
    }

    /// Advance one frame and return the predicted box.
    pub fn predict(&mut self) -> BoundingBox {
        let (mean, covariance) = self.filter.predict(&self.mean, &self.covariance);
        self.mean = mean;
        self.covariance = covariance;
        self.bbox()
    }

    /// Fold in a matched observation.
    pub fn update(&mut self, observed: &BoundingBox) {
        match self
            .filter
            .update(&self.mean, &self.covariance, observed.to_measurement())
        {
            Some((mean, covariance)) => {
                self.mean = mean;
                self.covariance = covariance;
            }
            None => warn!("singular innovation covariance, skipping correction"),
        }
    }

    /// Current box estimate.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(
            self.mean[0] as f32,
            self.mean[1] as f32,
            self.mean[2] as f32,
            self.mean[3] as f32,
        )
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }
}
