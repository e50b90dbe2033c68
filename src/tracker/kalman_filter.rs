//! Kalman filter for bounding box tracking in XYAH space.
//!
//! The 8-dimensional state is `[cx, cy, a, h, vcx, vcy, va, vh]`: box center,
//! aspect ratio, height and their velocities. Process and measurement noise
//! scale with the box height.

use nalgebra::Matrix4;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Smallest height used to scale noise, keeps covariances non-singular for
/// degenerate boxes.
const MIN_SCALE: f64 = 1e-3;
/// Floor applied to every variance on the covariance diagonal.
const MIN_VARIANCE: f64 = 1e-9;
/// Diagonal loading tried in turn when the innovation covariance is not
/// positive definite.
const REGULARIZATION: [f64; 4] = [0.0, 1e-9, 1e-6, 1e-3];

/// Dynamics used by [`KalmanFilter::predict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionModel {
    /// Position advances by the estimated velocity every frame.
    #[default]
    ConstantVelocity,
    /// Velocity is held at zero; prediction only inflates uncertainty.
    Stationary,
}

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_model: MotionModel,
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        Self::with_motion_model(MotionModel::ConstantVelocity)
    }

    pub fn with_motion_model(motion_model: MotionModel) -> Self {
        let ndim = 4;
        let mut motion_mat = Array2::eye(2 * ndim);
        if motion_model == MotionModel::ConstantVelocity {
            for i in 0..ndim {
                motion_mat[[i, ndim + i]] = 1.0;
            }
        }

        let mut update_mat = Array2::zeros((ndim, 2 * ndim));
        for i in 0..ndim {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_model,
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    pub fn motion_model(&self) -> MotionModel {
        self.motion_model
    }

    /// Create a track state from an unassociated XYAH measurement.
    pub fn initiate(&self, measurement: [f64; 4]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::zeros(8);
        for i in 0..4 {
            mean[i] = measurement[i];
        }

        let h = scale(measurement[3]);
        let std = [
            2.0 * self.std_weight_position * h,
            2.0 * self.std_weight_position * h,
            1e-2,
            2.0 * self.std_weight_position * h,
            10.0 * self.std_weight_velocity * h,
            10.0 * self.std_weight_velocity * h,
            1e-5,
            10.0 * self.std_weight_velocity * h,
        ];

        (mean, stabilize(diagonal(&std)))
    }

    /// Advance the state by one frame.
    ///
    /// Positional variance never decreases here, so a track that keeps missing
    /// detections gets an increasingly wide but finite estimate.
    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let mut mean_in = mean.clone();
        if self.motion_model == MotionModel::Stationary {
            for i in 4..8 {
                mean_in[i] = 0.0;
            }
        }

        let h = scale(mean_in[3]);
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-2,
            self.std_weight_position * h,
            self.std_weight_velocity * h,
            self.std_weight_velocity * h,
            1e-5,
            self.std_weight_velocity * h,
        ];
        let motion_cov = diagonal(&std);

        let new_mean = self.motion_mat.dot(&mean_in);
        let propagated = self.motion_mat.dot(covariance).dot(&self.motion_mat.t());
        let new_covariance = stabilize(propagated + motion_cov);

        if !all_finite(&new_mean, &new_covariance) {
            log::warn!("kalman prediction is not finite, keeping previous estimate");
            return (mean.clone(), covariance.clone());
        }
        (new_mean, new_covariance)
    }

    /// Project the state distribution into measurement space.
    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        let h = scale(mean[3]);
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-1,
            self.std_weight_position * h,
        ];
        let innovation_cov = diagonal(&std);

        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + innovation_cov;

        (mean_proj, covariance_proj)
    }

    /// Fuse an XYAH measurement into the state (Kalman correction step).
    ///
    /// If the innovation covariance cannot be inverted even after
    /// regularisation the predicted state is returned unchanged.
    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 4],
    ) -> (Array1<f64>, Array2<f64>) {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let measurement_arr = Array1::from_vec(measurement.to_vec());
        let innovation = measurement_arr - projected_mean;

        let Some(s_inv) = invert_4x4(&projected_cov) else {
            log::warn!("innovation covariance is singular, skipping correction");
            return (mean.clone(), covariance.clone());
        };

        // H is [I 0], so P * H^T is the first four columns of P.
        let pht = covariance.dot(&self.update_mat.t());
        let kalman_gain = pht.dot(&s_inv);

        let new_mean = mean + &kalman_gain.dot(&innovation);
        let explained = kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());
        let new_covariance = stabilize(covariance - &explained);

        if !all_finite(&new_mean, &new_covariance) {
            log::warn!("kalman correction is not finite, keeping prediction");
            return (mean.clone(), covariance.clone());
        }
        (new_mean, new_covariance)
    }

    /// Apply a 2x3 affine image warp (camera motion) to the state.
    ///
    /// Position and velocity of the box center are rotated/scaled by the
    /// linear part, the position is translated. Aspect ratio and height are
    /// left untouched.
    pub fn warp(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        affine: &[[f64; 3]; 2],
    ) -> (Array1<f64>, Array2<f64>) {
        let mut transform = Array2::<f64>::eye(8);
        for offset in [0, 4] {
            for r in 0..2 {
                for c in 0..2 {
                    transform[[offset + r, offset + c]] = affine[r][c];
                }
            }
        }

        let mut new_mean = transform.dot(mean);
        new_mean[0] += affine[0][2];
        new_mean[1] += affine[1][2];
        let new_covariance = stabilize(transform.dot(covariance).dot(&transform.t()));

        if !all_finite(&new_mean, &new_covariance) {
            log::warn!("camera motion produced non-finite state, ignoring it");
            return (mean.clone(), covariance.clone());
        }
        (new_mean, new_covariance)
    }
}

fn scale(h: f64) -> f64 {
    if h.is_finite() {
        h.abs().max(MIN_SCALE)
    } else {
        MIN_SCALE
    }
}

fn diagonal(std: &[f64]) -> Array2<f64> {
    let mut cov = Array2::zeros((std.len(), std.len()));
    for (i, s) in std.iter().enumerate() {
        cov[[i, i]] = s * s;
    }
    cov
}

/// Re-symmetrise and floor the diagonal of a covariance matrix.
fn stabilize(covariance: Array2<f64>) -> Array2<f64> {
    let mut sym = (&covariance + &covariance.t()) * 0.5;
    for i in 0..sym.nrows() {
        if !(sym[[i, i]] >= MIN_VARIANCE) {
            sym[[i, i]] = MIN_VARIANCE;
        }
    }
    sym
}

fn all_finite(mean: &Array1<f64>, covariance: &Array2<f64>) -> bool {
    mean.iter().all(|v| v.is_finite()) && covariance.iter().all(|v| v.is_finite())
}

/// Invert a 4x4 innovation covariance using nalgebra (pure Rust).
fn invert_4x4(m: &Array2<f64>) -> Option<Array2<f64>> {
    let mut nm = Matrix4::zeros();
    for i in 0..4 {
        for j in 0..4 {
            nm[(i, j)] = m[[i, j]];
        }
    }

    let inv = REGULARIZATION
        .iter()
        .find_map(|&eps| (nm + Matrix4::identity() * eps).cholesky())
        .map(|chol| chol.inverse())
        .or_else(|| nm.try_inverse())?;

    let mut res = Array2::zeros((4, 4));
    for i in 0..4 {
        for j in 0..4 {
            res[[i, j]] = inv[(i, j)];
        }
    }
    Some(res)
}
