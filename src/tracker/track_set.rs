use crate::tracker::detection::Detection;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::rect::{Rect, iou_batch};
use crate::tracker::track::Track;

/// All live tracks of one tracker plus its identity counter.
///
/// Tracks are kept in creation order, which is also ascending id order.
/// Identities are never handed out twice, not even after [`TrackSet::clear`].
#[derive(Debug, Clone)]
pub struct TrackSet {
    tracks: Vec<Track>,
    next_id: u64,
}

impl Default for TrackSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackSet {
    /// Empty set allocating identities from 1.
    pub fn new() -> Self {
        Self::with_first_id(1)
    }

    /// Start allocating identities at `first_id` (at least 1).
    pub fn with_first_id(first_id: u64) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: first_id.max(1),
        }
    }

    /// Number of live tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// True when no track is alive.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn as_slice(&self) -> &[Track] {
        &self.tracks
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Track] {
        &mut self.tracks
    }

    /// Iterate live tracks in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Look up a live track by identity.
    pub fn get(&self, track_id: u64) -> Option<&Track> {
        self.tracks.iter().find(|t| t.track_id == track_id)
    }

    /// Identity the next spawned track will receive.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Start a track from `detection` under the next identity.
    pub fn spawn(
        &mut self,
        detection: &Detection,
        kalman_filter: &KalmanFilter,
        frame_id: u32,
    ) -> &mut Track {
        let track_id = self.next_id;
        self.next_id += 1;
        self.tracks.push(Track::new(track_id, detection, kalman_filter, frame_id));
        let last = self.tracks.len() - 1;
        &mut self.tracks[last]
    }

    /// Drop every track but keep the identity counter.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Remove tracks that have gone more than `max_age` frames without a
    /// match. Returns the removed identities.
    pub fn retire(&mut self, max_age: u32) -> Vec<u64> {
        let mut removed = Vec::new();
        self.tracks.retain_mut(|track| {
            if track.time_since_update > max_age {
                track.mark_removed();
                removed.push(track.track_id);
                false
            } else {
                true
            }
        });
        removed
    }

    /// Remove lost tracks that overlap a freshly matched confirmed track
    /// with IoU above `iou_thresh`; of each such pair the track with the
    /// shorter history goes. Returns the removed identities.
    pub fn remove_duplicates(&mut self, iou_thresh: f32) -> Vec<u64> {
        let (active, lost): (Vec<usize>, Vec<usize>) = (0..self.tracks.len())
            .filter(|&i| self.tracks[i].is_confirmed)
            .partition(|&i| self.tracks[i].time_since_update == 0);
        if active.is_empty() || lost.is_empty() {
            return Vec::new();
        }

        let a_rects: Vec<Rect> = active.iter().map(|&i| self.tracks[i].rect()).collect();
        let b_rects: Vec<Rect> = lost.iter().map(|&i| self.tracks[i].rect()).collect();
        let ious = iou_batch(&a_rects, &b_rects);

        let mut duplicate = vec![false; self.tracks.len()];
        let (rows, cols) = ious.dim();
        for i in 0..rows {
            for j in 0..cols {
                if ious[[i, j]] > iou_thresh {
                    let (a, b) = (active[i], lost[j]);
                    if self.tracks[a].history_len() > self.tracks[b].history_len() {
                        duplicate[b] = true;
                    } else {
                        duplicate[a] = true;
                    }
                }
            }
        }

        let mut removed = Vec::new();
        let mut index = 0;
        self.tracks.retain_mut(|track| {
            let keep = !duplicate[index];
            index += 1;
            if !keep {
                track.mark_removed();
                removed.push(track.track_id);
            }
            keep
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32) -> Detection {
        Detection::new(x, 0.0, x + 10.0, 10.0, 0.9)
    }

    #[test]
    fn test_ids_are_monotonic_and_survive_clear() {
        let kf = KalmanFilter::new();
        let mut set = TrackSet::new();
        assert_eq!(set.spawn(&det(0.0), &kf, 1).track_id, 1);
        assert_eq!(set.spawn(&det(50.0), &kf, 1).track_id, 2);
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.spawn(&det(0.0), &kf, 2).track_id, 3);
    }

    #[test]
    fn test_first_id() {
        let kf = KalmanFilter::new();
        let mut set = TrackSet::with_first_id(1000);
        assert_eq!(set.spawn(&det(0.0), &kf, 1).track_id, 1000);
        assert_eq!(TrackSet::with_first_id(0).next_id(), 1);
    }

    #[test]
    fn test_retire() {
        let kf = KalmanFilter::new();
        let mut set = TrackSet::new();
        set.spawn(&det(0.0), &kf, 1);
        set.spawn(&det(50.0), &kf, 1);
        set.as_mut_slice()[0].mark_missed();
        set.as_mut_slice()[0].mark_missed();
        set.as_mut_slice()[1].mark_missed();

        assert_eq!(set.retire(1), vec![1]);
        assert_eq!(set.len(), 1);
        assert!(set.get(2).is_some());
    }

    #[test]
    fn test_remove_duplicates_keeps_longer_history() {
        let kf = KalmanFilter::new();
        let mut set = TrackSet::new();
        set.spawn(&det(0.0), &kf, 1);
        set.spawn(&det(0.5), &kf, 5);
        {
            let tracks = set.as_mut_slice();
            tracks[0].confirm();
            tracks[0].frame_id = 4;
            tracks[0].mark_missed();
            tracks[1].confirm();
        }
        assert_eq!(set.remove_duplicates(0.85), vec![2]);
        assert_eq!(set.as_slice()[0].track_id, 1);
    }

    #[test]
    fn test_remove_duplicates_drops_short_lost_track() {
        let kf = KalmanFilter::new();
        let mut set = TrackSet::new();
        set.spawn(&det(0.0), &kf, 5);
        set.spawn(&det(0.5), &kf, 1);
        {
            let tracks = set.as_mut_slice();
            tracks[0].confirm();
            tracks[0].mark_missed();
            tracks[1].confirm();
            tracks[1].frame_id = 6;
        }
        assert_eq!(set.remove_duplicates(0.85), vec![1]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].track_id, 2);
    }

    #[test]
    fn test_remove_duplicates_ignores_distant_tracks() {
        let kf = KalmanFilter::new();
        let mut set = TrackSet::new();
        set.spawn(&det(0.0), &kf, 1);
        set.spawn(&det(50.0), &kf, 1);
        {
            let tracks = set.as_mut_slice();
            tracks[0].confirm();
            tracks[0].mark_missed();
            tracks[1].confirm();
        }
        assert!(set.remove_duplicates(0.85).is_empty());
        assert_eq!(set.len(), 2);
    }
}
