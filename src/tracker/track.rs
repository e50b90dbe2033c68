//! Single object track for multi-object tracking.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2};

use crate::tracker::detection::Detection;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::lifecycle::ClassVote;
use crate::tracker::matching::l2_normalize;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// Single object track.
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique track identifier, never reused within a tracker
    pub track_id: u64,
    /// Current track state
    pub state: TrackState,
    /// Whether the track has ever been promoted to confirmed
    pub is_confirmed: bool,
    /// Confidence of the last matched detection
    pub score: f32,
    /// Class label, fixed at creation unless re-voted
    pub class_id: usize,
    /// Frame in which the track was last matched
    pub frame_id: u32,
    /// Frame in which the track was created
    pub start_frame: u32,
    /// Consecutive frames with a matched detection
    pub hit_streak: u32,
    /// Frames since the last matched detection
    pub time_since_update: u32,
    /// Frames since creation
    pub age: u32,
    /// Kalman filter state mean (8-dim)
    pub mean: Array1<f64>,
    /// Kalman filter state covariance (8x8)
    pub covariance: Array2<f64>,
    /// Smoothed, L2-normalised appearance descriptor
    pub embedding: Option<Vec<f32>>,
    class_votes: BTreeMap<usize, u32>,
}

impl Track {
    /// Start a tentative track from an unmatched detection.
    pub fn new(
        track_id: u64,
        detection: &Detection,
        kalman_filter: &KalmanFilter,
        frame_id: u32,
    ) -> Self {
        let (mean, covariance) = kalman_filter.initiate(xyah(&detection.bbox));
        Self {
            track_id,
            state: TrackState::Tentative,
            is_confirmed: false,
            score: detection.score,
            class_id: detection.class_id,
            frame_id,
            start_frame: frame_id,
            hit_streak: 1,
            time_since_update: 0,
            age: 0,
            mean,
            covariance,
            embedding: detection.embedding.as_deref().and_then(l2_normalize),
            class_votes: BTreeMap::from([(detection.class_id, 1)]),
        }
    }

    /// Current box estimate from the Kalman state.
    pub fn rect(&self) -> Rect {
        Rect::from_xyah(
            self.mean[0] as f32,
            self.mean[1] as f32,
            self.mean[2] as f32,
            self.mean[3] as f32,
        )
    }

    /// Number of frames between creation and the last match.
    pub fn history_len(&self) -> u32 {
        self.frame_id - self.start_frame
    }

    /// Advance the motion state one frame and return the predicted box.
    pub fn predict(&mut self, kalman_filter: &KalmanFilter) -> Rect {
        let mut mean_to_predict = self.mean.clone();
        if self.state != TrackState::Confirmed {
            mean_to_predict[7] = 0.0;
        }
        (self.mean, self.covariance) = kalman_filter.predict(&mean_to_predict, &self.covariance);
        self.age += 1;
        self.rect()
    }

    /// Fuse an observed box into the motion state.
    pub fn correct(&mut self, bbox: &Rect, kalman_filter: &KalmanFilter) {
        (self.mean, self.covariance) =
            kalman_filter.update(&self.mean, &self.covariance, xyah(bbox));
    }

    /// Record a matched detection: correct the motion state and reset the
    /// miss counter. Promotion is left to the lifecycle policy.
    pub fn update(&mut self, detection: &Detection, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.correct(&detection.bbox, kalman_filter);
        self.frame_id = frame_id;
        self.hit_streak += 1;
        self.time_since_update = 0;
        self.score = detection.score;
        if self.is_confirmed {
            self.state = TrackState::Confirmed;
        }
    }

    /// Record a frame without a matching detection.
    pub fn mark_missed(&mut self) {
        self.time_since_update += 1;
        self.hit_streak = 0;
        if self.is_confirmed {
            self.state = TrackState::Lost;
        }
    }

    /// Promote to confirmed; the track is reported from now on.
    pub fn confirm(&mut self) {
        self.is_confirmed = true;
        self.state = TrackState::Confirmed;
    }

    /// Mark as removed before it leaves the track set.
    pub fn mark_removed(&mut self) {
        self.state = TrackState::Removed;
    }

    /// Record a matched class and update the label per `vote`.
    pub fn vote_class(&mut self, class_id: usize, vote: ClassVote) {
        *self.class_votes.entry(class_id).or_insert(0) += 1;
        match vote {
            ClassVote::Fixed => {}
            ClassVote::MostRecent => self.class_id = class_id,
            ClassVote::Majority => {
                let current = self.class_votes.get(&self.class_id).copied().unwrap_or(0);
                let candidate = self.class_votes[&class_id];
                if candidate > current {
                    self.class_id = class_id;
                }
            }
        }
    }

    /// Blend a new embedding into the running descriptor.
    ///
    /// `momentum` is the weight kept by the previous descriptor.
    pub fn update_embedding(&mut self, embedding: &[f32], momentum: f32) {
        let Some(new) = l2_normalize(embedding) else {
            return;
        };
        self.embedding = match self.embedding.take() {
            Some(old) if old.len() == new.len() => {
                let blended: Vec<f32> = old
                    .iter()
                    .zip(&new)
                    .map(|(o, n)| momentum * o + (1.0 - momentum) * n)
                    .collect();
                l2_normalize(&blended).or(Some(new))
            }
            Some(old) => {
                log::warn!(
                    "track {} embedding size changed from {} to {}, restarting descriptor",
                    self.track_id,
                    old.len(),
                    new.len()
                );
                Some(new)
            }
            None => Some(new),
        };
    }

    /// Compensate camera motion with a 2x3 affine warp.
    pub fn apply_camera_motion(&mut self, kalman_filter: &KalmanFilter, affine: &[[f64; 3]; 2]) {
        (self.mean, self.covariance) = kalman_filter.warp(&self.mean, &self.covariance, affine);
    }
}

fn xyah(bbox: &Rect) -> [f64; 4] {
    bbox.to_xyah().map(f64::from)
}
