//! The per-frame tracking loop shared by all tracker kinds.

use crate::error::TrackerError;
use crate::tracker::association::Association;
use crate::tracker::config::{TrackerConfig, TrackerKind};
use crate::tracker::detection::Detection;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::lifecycle::LifecyclePolicy;
use crate::tracker::rect::Rect;
use crate::tracker::track::Track;
use crate::tracker::track_set::TrackSet;

/// Per-frame information beyond the detections themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameContext {
    /// Affine warp (2x3, row major) from the previous frame to this one,
    /// used to compensate camera motion before association.
    pub camera_motion: Option<[[f64; 3]; 2]>,
}

impl FrameContext {
    /// Context carrying a previous-to-current frame warp.
    pub fn with_camera_motion(affine: [[f64; 3]; 2]) -> Self {
        Self {
            camera_motion: Some(affine),
        }
    }
}

/// A confirmed track as reported to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    /// Kalman estimate of the box: corrected when matched this frame,
    /// predicted otherwise
    pub rect: Rect,
    pub track_id: u64,
    /// Confidence of the last matched detection
    pub score: f32,
    pub class_id: usize,
    /// Zero when the track was matched in this frame
    pub time_since_update: u32,
}

impl TrackedObject {
    fn from_track(track: &Track) -> Self {
        Self {
            rect: track.rect(),
            track_id: track.track_id,
            score: track.score,
            class_id: track.class_id,
            time_since_update: track.time_since_update,
        }
    }

    /// `[x1, y1, x2, y2, track_id, score, class]`.
    pub fn to_row(&self) -> [f32; 7] {
        let [x1, y1, x2, y2] = self.rect.to_tlbr();
        [x1, y1, x2, y2, self.track_id as f32, self.score, self.class_id as f32]
    }
}

/// Multi-object tracker.
///
/// Owns its tracks and identity counter; instances share nothing. Feed it
/// once per frame, in frame order.
#[derive(Debug)]
pub struct Tracker {
    kind: TrackerKind,
    tracks: TrackSet,
    association: Association,
    lifecycle: LifecyclePolicy,
    kalman_filter: KalmanFilter,
    frame_id: u32,
}

/// Build a tracker for the given configuration variant.
pub fn build_tracker(config: TrackerConfig) -> Result<Tracker, TrackerError> {
    Tracker::new(config)
}

impl Tracker {
    /// Validate `config` and build an empty tracker.
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        Self::with_first_id(config, 1)
    }

    /// Like [`Tracker::new`], with identities allocated from `first_id` on.
    pub fn with_first_id(config: TrackerConfig, first_id: u64) -> Result<Self, TrackerError> {
        config.validate()?;
        log::debug!("building {} tracker: {config:?}", config.kind());
        Ok(Self {
            kind: config.kind(),
            tracks: TrackSet::with_first_id(first_id),
            association: config.association(),
            lifecycle: config.lifecycle(),
            kalman_filter: KalmanFilter::with_motion_model(config.motion_model()),
            frame_id: 0,
        })
    }

    /// Tracker variant this instance was built from.
    pub fn kind(&self) -> TrackerKind {
        self.kind
    }

    /// Number of frames processed since creation or the last reset.
    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    /// All live tracks, tentative ones included, in identity order.
    pub fn tracks(&self) -> &[Track] {
        self.tracks.as_slice()
    }

    /// Number of confirmed tracks, lost ones included.
    pub fn confirmed_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_confirmed).count()
    }

    /// Drop all tracks. Identities issued before the reset are not reused.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.frame_id = 0;
    }

    /// Process one frame without camera motion information.
    pub fn update(&mut self, detections: Vec<Detection>) -> Vec<TrackedObject> {
        self.update_with_context(detections, &FrameContext::default())
    }

    /// Process one frame and return the confirmed tracks in identity order.
    ///
    /// Malformed detections are dropped; an empty detection list only ages
    /// the existing tracks.
    pub fn update_with_context(
        &mut self,
        detections: Vec<Detection>,
        context: &FrameContext,
    ) -> Vec<TrackedObject> {
        self.frame_id += 1;

        let detections: Vec<Detection> = detections
            .into_iter()
            .filter_map(Detection::sanitized)
            .collect();

        // Step 1: Predict every track, compensating camera motion if known
        for track in self.tracks.as_mut_slice() {
            track.predict(&self.kalman_filter);
            if let Some(affine) = &context.camera_motion {
                track.apply_camera_motion(&self.kalman_filter, affine);
            }
        }

        // Step 2: Associate
        let assignment = self
            .association
            .associate(self.tracks.as_slice(), &detections);
        log::debug!(
            "frame {}: {} tracks, {} detections, {} matched",
            self.frame_id,
            self.tracks.len(),
            detections.len(),
            assignment.matches.len()
        );

        // Step 3: Update track states
        self.lifecycle.apply(
            &mut self.tracks,
            &assignment,
            &detections,
            &self.kalman_filter,
            self.frame_id,
        );

        self.tracks
            .iter()
            .filter(|t| t.is_confirmed)
            .map(TrackedObject::from_track)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::config::SortConfig;
    use crate::tracker::track_state::TrackState;

    fn sort(min_hits: u32, max_age: u32) -> Tracker {
        Tracker::new(
            SortConfig {
                min_hits,
                max_age,
                ..SortConfig::default()
            }
            .into(),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_config_fails_to_build() {
        let config = SortConfig {
            min_hits: 0,
            ..SortConfig::default()
        };
        assert!(build_tracker(config.into()).is_err());
    }

    #[test]
    fn test_tracker_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Tracker>();
    }

    #[test]
    fn test_empty_frames() {
        let mut tracker = sort(3, 1);
        assert!(tracker.update(vec![]).is_empty());
        assert_eq!(tracker.frame_id(), 1);
    }

    #[test]
    fn test_tentative_tracks_are_hidden() {
        let mut tracker = sort(3, 1);
        let det = Detection::new(10.0, 10.0, 20.0, 20.0, 0.9);
        assert!(tracker.update(vec![det.clone()]).is_empty());
        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(tracker.tracks()[0].state, TrackState::Tentative);
    }

    #[test]
    fn test_malformed_detection_is_dropped() {
        let mut tracker = sort(1, 1);
        let out = tracker.update(vec![
            Detection::new(f32::NAN, 0.0, 10.0, 10.0, 0.9),
            Detection::new(50.0, 50.0, 40.0, 60.0, 0.9),
            Detection::new(0.0, 0.0, 10.0, 10.0, 0.9),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].track_id, 1);
    }

    #[test]
    fn test_camera_motion_shifts_prediction() {
        let mut tracker = sort(1, 1);
        tracker.update(vec![Detection::new(0.0, 0.0, 10.0, 10.0, 0.9)]);
        let shift = FrameContext::with_camera_motion([[1.0, 0.0, 100.0], [0.0, 1.0, 0.0]]);
        let moved = Detection::new(100.0, 0.0, 110.0, 10.0, 0.9);
        let out = tracker.update_with_context(vec![moved], &shift);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].track_id, 1);
        assert_eq!(out[0].time_since_update, 0);
    }

    #[test]
    fn test_to_row() {
        let obj = TrackedObject {
            rect: Rect::from_tlbr(1.0, 2.0, 3.0, 4.0),
            track_id: 5,
            score: 0.5,
            class_id: 2,
            time_since_update: 0,
        };
        assert_eq!(obj.to_row(), [1.0, 2.0, 3.0, 4.0, 5.0, 0.5, 2.0]);
    }
}
