//! Multi-stage association between tracks and detections.
//!
//! SORT, ByteTrack and BoT-SORT differ only in which tracks and detections
//! take part in each matching round and how the cost is computed. An
//! [`Association`] is the ordered list of those rounds; each round works on
//! whatever earlier rounds left unmatched.

use crate::tracker::assignment::{AssignmentResult, linear_assignment};
use crate::tracker::detection::Detection;
use crate::tracker::matching::CostMetric;
use crate::tracker::track::Track;

/// Half-open confidence interval `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBand {
    pub min: f32,
    pub max: Option<f32>,
}

impl ScoreBand {
    /// Every score, including non-finite ones.
    pub const ALL: Self = Self {
        min: f32::NEG_INFINITY,
        max: None,
    };

    /// `[min, inf)`.
    pub fn at_least(min: f32) -> Self {
        Self { min, max: None }
    }

    /// `[min, max)`.
    pub fn between(min: f32, max: f32) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub fn contains(&self, score: f32) -> bool {
        score >= self.min && self.max.is_none_or(|max| score < max)
    }
}

/// Which tracks take part in a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFilter {
    All,
    /// Tracks that have been promoted, including lost ones.
    Confirmed,
    /// Tracks that have not been promoted yet.
    Tentative,
    /// Promoted tracks that were matched in the previous frame.
    Active,
}

impl TrackFilter {
    pub fn accepts(&self, track: &Track) -> bool {
        match self {
            Self::All => true,
            Self::Confirmed => track.is_confirmed,
            Self::Tentative => !track.is_confirmed,
            Self::Active => track.is_confirmed && track.time_since_update == 0,
        }
    }
}

#[derive(Debug)]
pub struct MatchStage {
    pub name: &'static str,
    pub tracks: TrackFilter,
    pub detections: ScoreBand,
    pub metric: Box<dyn CostMetric>,
    pub match_thresh: f32,
}

#[derive(Debug)]
pub struct Association {
    stages: Vec<MatchStage>,
}

impl Association {
    pub fn new(stages: Vec<MatchStage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[MatchStage] {
        &self.stages
    }

    /// Run every stage in order. Indices refer to `tracks` and `detections`.
    ///
    /// Matches are returned sorted by track index.
    pub fn associate(&self, tracks: &[Track], detections: &[Detection]) -> AssignmentResult {
        let mut track_free = vec![true; tracks.len()];
        let mut det_free = vec![true; detections.len()];
        let mut matches = Vec::new();

        for stage in &self.stages {
            let track_idx: Vec<usize> = (0..tracks.len())
                .filter(|&i| track_free[i] && stage.tracks.accepts(&tracks[i]))
                .collect();
            let det_idx: Vec<usize> = (0..detections.len())
                .filter(|&j| det_free[j])
                .filter(|&j| stage.detections.contains(detections[j].score))
                .collect();
            if track_idx.is_empty() || det_idx.is_empty() {
                continue;
            }

            let stage_tracks: Vec<&Track> = track_idx.iter().map(|&i| &tracks[i]).collect();
            let stage_dets: Vec<&Detection> = det_idx.iter().map(|&j| &detections[j]).collect();
            let costs = stage.metric.cost_matrix(&stage_tracks, &stage_dets);
            let result = linear_assignment(&costs, stage.match_thresh);

            log::trace!(
                "stage {}: {} tracks x {} detections -> {} matches",
                stage.name,
                track_idx.len(),
                det_idx.len(),
                result.matches.len()
            );

            for (ti, dj) in result.matches {
                let (i, j) = (track_idx[ti], det_idx[dj]);
                track_free[i] = false;
                det_free[j] = false;
                matches.push((i, j));
            }
        }

        matches.sort();
        AssignmentResult {
            matches,
            unmatched_tracks: free_indices(&track_free),
            unmatched_detections: free_indices(&det_free),
        }
    }
}

fn free_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &free)| free.then_some(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::kalman_filter::KalmanFilter;
    use crate::tracker::matching::IouCost;

    fn confirmed_track(id: u64, x: f32) -> Track {
        let det = Detection::new(x, 0.0, x + 20.0, 20.0, 0.9);
        let mut track = Track::new(id, &det, &KalmanFilter::new(), 1);
        track.confirm();
        track
    }

    fn two_stage() -> Association {
        Association::new(vec![
            MatchStage {
                name: "high",
                tracks: TrackFilter::All,
                detections: ScoreBand::at_least(0.5),
                metric: Box::new(IouCost { gate: 0.8 }),
                match_thresh: 0.8,
            },
            MatchStage {
                name: "low",
                tracks: TrackFilter::Active,
                detections: ScoreBand::between(0.1, 0.5),
                metric: Box::new(IouCost { gate: 0.5 }),
                match_thresh: 0.5,
            },
        ])
    }

    #[test]
    fn test_score_band() {
        let band = ScoreBand::between(0.1, 0.5);
        assert!(band.contains(0.1));
        assert!(!band.contains(0.5));
        assert!(ScoreBand::ALL.contains(0.0));
        assert!(ScoreBand::at_least(0.5).contains(0.9));
    }

    #[test]
    fn test_low_score_detection_recovers_active_track() {
        let tracks = vec![confirmed_track(1, 0.0), confirmed_track(2, 100.0)];
        let detections = vec![
            Detection::new(101.0, 0.0, 121.0, 20.0, 0.9),
            Detection::new(1.0, 0.0, 21.0, 20.0, 0.3),
            Detection::new(300.0, 0.0, 320.0, 20.0, 0.05),
        ];
        let result = two_stage().associate(&tracks, &detections);
        assert_eq!(result.matches, vec![(0, 1), (1, 0)]);
        assert!(result.unmatched_tracks.is_empty());
        assert_eq!(result.unmatched_detections, vec![2]);
    }

    #[test]
    fn test_low_score_ignores_tentative_track() {
        let det = Detection::new(0.0, 0.0, 20.0, 20.0, 0.9);
        let tracks = vec![Track::new(1, &det, &KalmanFilter::new(), 1)];
        let detections = vec![Detection::new(1.0, 0.0, 21.0, 20.0, 0.3)];
        let result = two_stage().associate(&tracks, &detections);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_tracks, vec![0]);
        assert_eq!(result.unmatched_detections, vec![0]);
    }

    #[test]
    fn test_no_tracks() {
        let detections = vec![Detection::new(0.0, 0.0, 20.0, 20.0, 0.9)];
        let result = two_stage().associate(&[], &detections);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_detections, vec![0]);
    }
}
