//! Confirmation, aging and retirement of tracks.

use serde::{Deserialize, Serialize};

use crate::tracker::assignment::AssignmentResult;
use crate::tracker::detection::Detection;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::track::Track;
use crate::tracker::track_set::TrackSet;

/// How a track's class label follows its matched detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassVote {
    /// Keep the class of the detection that created the track.
    #[default]
    Fixed,
    /// Take the class of the latest matched detection.
    MostRecent,
    /// Take the most frequent class seen so far; ties keep the current one.
    Majority,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifecyclePolicy {
    /// Consecutive matches needed to confirm a track.
    pub min_hits: u32,
    /// Frames without a match after which a track is removed.
    pub max_age: u32,
    /// Minimum confidence of an unmatched detection to start a track.
    pub birth_thresh: f32,
    pub class_vote: ClassVote,
    /// Weight kept by the previous appearance descriptor.
    pub embedding_momentum: f32,
    /// IoU above which a lost track duplicating an active one is dropped.
    pub duplicate_iou: Option<f32>,
}

impl LifecyclePolicy {
    /// Apply one frame's association outcome to the track set.
    ///
    /// Indices in `assignment` refer to `tracks.as_slice()` and `detections`.
    pub fn apply(
        &self,
        tracks: &mut TrackSet,
        assignment: &AssignmentResult,
        detections: &[Detection],
        kalman_filter: &KalmanFilter,
        frame_id: u32,
    ) {
        let slice = tracks.as_mut_slice();
        for &(itrack, idet) in &assignment.matches {
            let track = &mut slice[itrack];
            let det = &detections[idet];
            track.update(det, kalman_filter, frame_id);
            track.vote_class(det.class_id, self.class_vote);
            if let Some(embedding) = det.embedding.as_deref() {
                track.update_embedding(embedding, self.embedding_momentum);
            }
            self.promote(track);
        }
        for &itrack in &assignment.unmatched_tracks {
            slice[itrack].mark_missed();
        }

        for &idet in &assignment.unmatched_detections {
            let det = &detections[idet];
            if det.score < self.birth_thresh {
                continue;
            }
            let track = tracks.spawn(det, kalman_filter, frame_id);
            log::debug!(
                "frame {frame_id}: new track {} at {:?}",
                track.track_id,
                det.bbox.to_tlbr()
            );
            self.promote(track);
        }

        let retired = tracks.retire(self.max_age);
        if !retired.is_empty() {
            log::debug!(
                "frame {frame_id}: removed tracks {retired:?} after {} missed frames",
                self.max_age + 1
            );
        }

        if let Some(iou) = self.duplicate_iou {
            let duplicates = tracks.remove_duplicates(iou);
            if !duplicates.is_empty() {
                log::debug!("frame {frame_id}: removed duplicate tracks {duplicates:?}");
            }
        }
    }

    fn promote(&self, track: &mut Track) {
        if !track.is_confirmed && track.hit_streak >= self.min_hits {
            track.confirm();
            log::debug!("track {} confirmed", track.track_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::track_state::TrackState;

    fn policy(min_hits: u32, max_age: u32) -> LifecyclePolicy {
        LifecyclePolicy {
            min_hits,
            max_age,
            birth_thresh: 0.5,
            class_vote: ClassVote::Fixed,
            embedding_momentum: 0.9,
            duplicate_iou: None,
        }
    }

    fn det() -> Detection {
        Detection::new(0.0, 0.0, 10.0, 10.0, 0.9)
    }

    fn matched(n: usize) -> AssignmentResult {
        AssignmentResult {
            matches: (0..n).map(|i| (i, i)).collect(),
            ..Default::default()
        }
    }

    fn missed(n: usize) -> AssignmentResult {
        AssignmentResult {
            unmatched_tracks: (0..n).collect(),
            ..Default::default()
        }
    }

    fn born(n: usize) -> AssignmentResult {
        AssignmentResult {
            unmatched_detections: (0..n).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_confirmation_after_min_hits() {
        let kf = KalmanFilter::new();
        let policy = policy(3, 1);
        let mut tracks = TrackSet::new();

        policy.apply(&mut tracks, &born(1), &[det()], &kf, 1);
        assert_eq!(tracks.as_slice()[0].state, TrackState::Tentative);
        policy.apply(&mut tracks, &matched(1), &[det()], &kf, 2);
        assert!(!tracks.as_slice()[0].is_confirmed);
        policy.apply(&mut tracks, &matched(1), &[det()], &kf, 3);
        assert_eq!(tracks.as_slice()[0].state, TrackState::Confirmed);
    }

    #[test]
    fn test_min_hits_one_confirms_at_birth() {
        let kf = KalmanFilter::new();
        let mut tracks = TrackSet::new();
        policy(1, 1).apply(&mut tracks, &born(1), &[det()], &kf, 1);
        assert!(tracks.as_slice()[0].is_confirmed);
    }

    #[test]
    fn test_broken_streak_restarts() {
        let kf = KalmanFilter::new();
        let policy = policy(3, 5);
        let mut tracks = TrackSet::new();
        policy.apply(&mut tracks, &born(1), &[det()], &kf, 1);
        policy.apply(&mut tracks, &matched(1), &[det()], &kf, 2);
        policy.apply(&mut tracks, &missed(1), &[], &kf, 3);
        policy.apply(&mut tracks, &matched(1), &[det()], &kf, 4);
        assert_eq!(tracks.as_slice()[0].hit_streak, 1);
        assert!(!tracks.as_slice()[0].is_confirmed);
    }

    #[test]
    fn test_removal_after_max_age() {
        let kf = KalmanFilter::new();
        let policy = policy(1, 2);
        let mut tracks = TrackSet::new();
        policy.apply(&mut tracks, &born(1), &[det()], &kf, 1);
        policy.apply(&mut tracks, &missed(1), &[], &kf, 2);
        policy.apply(&mut tracks, &missed(1), &[], &kf, 3);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks.as_slice()[0].state, TrackState::Lost);
        policy.apply(&mut tracks, &missed(1), &[], &kf, 4);
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_low_confidence_does_not_spawn() {
        let kf = KalmanFilter::new();
        let mut tracks = TrackSet::new();
        let weak = Detection::new(0.0, 0.0, 10.0, 10.0, 0.3);
        policy(1, 1).apply(&mut tracks, &born(1), &[weak], &kf, 1);
        assert!(tracks.is_empty());
        assert_eq!(tracks.next_id(), 1);
    }
}
