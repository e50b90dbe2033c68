//! Tracker configuration.
//!
//! One tagged variant per tracker kind. Configurations are validated before a
//! tracker is built; nothing falls back to defaults behind the caller's back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;
use crate::tracker::association::{Association, MatchStage, ScoreBand, TrackFilter};
use crate::tracker::kalman_filter::MotionModel;
use crate::tracker::lifecycle::{ClassVote, LifecyclePolicy};
use crate::tracker::matching::{
    AppearanceCost, CostMetric, EmbeddingMetric, IouCost, ScoreFusedIouCost,
};

/// Geometric-only tracking: one IoU matching round over all tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortConfig {
    pub max_age: u32,
    pub min_hits: u32,
    /// Minimum IoU for a match.
    pub iou_threshold: f32,
    #[serde(default)]
    pub motion_model: MotionModel,
    #[serde(default)]
    pub class_vote: ClassVote,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            max_age: 1,
            min_hits: 3,
            iou_threshold: 0.3,
            motion_model: MotionModel::default(),
            class_vote: ClassVote::default(),
        }
    }
}

/// Confidence-tiered tracking: high-score detections first, then low-score
/// detections against the tracks that are still unmatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ByteTrackConfig {
    pub max_age: u32,
    pub min_hits: u32,
    pub track_high_thresh: f32,
    pub track_low_thresh: f32,
    pub new_track_thresh: f32,
    pub match_thresh: f32,
    pub low_match_thresh: f32,
    pub unconfirmed_match_thresh: f32,
    pub fuse_score: bool,
    pub duplicate_iou: f32,
    #[serde(default)]
    pub motion_model: MotionModel,
    #[serde(default)]
    pub class_vote: ClassVote,
}

impl Default for ByteTrackConfig {
    fn default() -> Self {
        Self {
            max_age: 30,
            min_hits: 2,
            track_high_thresh: 0.5,
            track_low_thresh: 0.1,
            new_track_thresh: 0.6,
            match_thresh: 0.8,
            low_match_thresh: 0.5,
            unconfirmed_match_thresh: 0.7,
            fuse_score: true,
            duplicate_iou: 0.85,
            motion_model: MotionModel::default(),
            class_vote: ClassVote::default(),
        }
    }
}

/// ByteTrack with appearance embeddings blended into the high-score rounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotSortConfig {
    pub max_age: u32,
    pub min_hits: u32,
    pub track_high_thresh: f32,
    pub track_low_thresh: f32,
    pub new_track_thresh: f32,
    pub match_thresh: f32,
    pub low_match_thresh: f32,
    pub unconfirmed_match_thresh: f32,
    pub fuse_score: bool,
    pub duplicate_iou: f32,
    /// IoU cost above which appearance cannot help a pair.
    pub proximity_thresh: f32,
    /// Appearance distance above which embeddings count as dissimilar.
    pub appearance_thresh: f32,
    /// Weight of the appearance distance in the blended cost.
    pub appearance_weight: f32,
    /// Weight kept by a track's previous descriptor on each update.
    pub embedding_momentum: f32,
    #[serde(default)]
    pub embedding_metric: EmbeddingMetric,
    #[serde(default)]
    pub motion_model: MotionModel,
    #[serde(default)]
    pub class_vote: ClassVote,
}

impl Default for BotSortConfig {
    fn default() -> Self {
        let byte = ByteTrackConfig::default();
        Self {
            max_age: byte.max_age,
            min_hits: byte.min_hits,
            track_high_thresh: byte.track_high_thresh,
            track_low_thresh: byte.track_low_thresh,
            new_track_thresh: byte.new_track_thresh,
            match_thresh: byte.match_thresh,
            low_match_thresh: byte.low_match_thresh,
            unconfirmed_match_thresh: byte.unconfirmed_match_thresh,
            fuse_score: byte.fuse_score,
            duplicate_iou: byte.duplicate_iou,
            proximity_thresh: 0.5,
            appearance_thresh: 0.25,
            appearance_weight: 0.5,
            embedding_momentum: 0.9,
            embedding_metric: EmbeddingMetric::default(),
            motion_model: byte.motion_model,
            class_vote: byte.class_vote,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerKind {
    Sort,
    ByteTrack,
    BotSort,
}

impl TrackerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sort => "sort",
            Self::ByteTrack => "bytetrack",
            Self::BotSort => "botsort",
        }
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackerKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sort" => Ok(Self::Sort),
            "bytetrack" => Ok(Self::ByteTrack),
            "botsort" => Ok(Self::BotSort),
            other => Err(TrackerError::UnknownTracker(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tracker_type")]
pub enum TrackerConfig {
    #[serde(rename = "sort")]
    Sort(SortConfig),
    #[serde(rename = "bytetrack")]
    ByteTrack(ByteTrackConfig),
    #[serde(rename = "botsort")]
    BotSort(BotSortConfig),
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::Sort(SortConfig::default())
    }
}

impl From<SortConfig> for TrackerConfig {
    fn from(config: SortConfig) -> Self {
        Self::Sort(config)
    }
}

impl From<ByteTrackConfig> for TrackerConfig {
    fn from(config: ByteTrackConfig) -> Self {
        Self::ByteTrack(config)
    }
}

impl From<BotSortConfig> for TrackerConfig {
    fn from(config: BotSortConfig) -> Self {
        Self::BotSort(config)
    }
}

impl TrackerConfig {
    /// Documented defaults for `kind`.
    pub fn defaults_for(kind: TrackerKind) -> Self {
        match kind {
            TrackerKind::Sort => SortConfig::default().into(),
            TrackerKind::ByteTrack => ByteTrackConfig::default().into(),
            TrackerKind::BotSort => BotSortConfig::default().into(),
        }
    }

    /// Parse and validate a JSON configuration tagged with `tracker_type`.
    pub fn from_json_str(json: &str) -> Result<Self, TrackerError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn kind(&self) -> TrackerKind {
        match self {
            Self::Sort(_) => TrackerKind::Sort,
            Self::ByteTrack(_) => TrackerKind::ByteTrack,
            Self::BotSort(_) => TrackerKind::BotSort,
        }
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        match self {
            Self::Sort(c) => {
                check_lifecycle(c.max_age, c.min_hits)?;
                check_unit("iou_threshold", c.iou_threshold)
            }
            Self::ByteTrack(c) => {
                check_lifecycle(c.max_age, c.min_hits)?;
                check_tiers(
                    c.track_high_thresh,
                    c.track_low_thresh,
                    c.new_track_thresh,
                    c.match_thresh,
                    c.low_match_thresh,
                    c.unconfirmed_match_thresh,
                )?;
                check_unit("duplicate_iou", c.duplicate_iou)
            }
            Self::BotSort(c) => {
                check_lifecycle(c.max_age, c.min_hits)?;
                check_tiers(
                    c.track_high_thresh,
                    c.track_low_thresh,
                    c.new_track_thresh,
                    c.match_thresh,
                    c.low_match_thresh,
                    c.unconfirmed_match_thresh,
                )?;
                check_unit("duplicate_iou", c.duplicate_iou)?;
                check_unit("proximity_thresh", c.proximity_thresh)?;
                check_unit("appearance_thresh", c.appearance_thresh)?;
                check_unit("appearance_weight", c.appearance_weight)?;
                check_unit("embedding_momentum", c.embedding_momentum)?;
                if c.embedding_momentum >= 1.0 {
                    return Err(TrackerError::invalid_config(
                        "embedding_momentum",
                        "must be below 1, otherwise descriptors never update",
                    ));
                }
                Ok(())
            }
        }
    }

    pub(crate) fn motion_model(&self) -> MotionModel {
        match self {
            Self::Sort(c) => c.motion_model,
            Self::ByteTrack(c) => c.motion_model,
            Self::BotSort(c) => c.motion_model,
        }
    }

    /// Tiered variants never start tracks from low-band detections.
    pub(crate) fn lifecycle(&self) -> LifecyclePolicy {
        match self {
            Self::Sort(c) => LifecyclePolicy {
                min_hits: c.min_hits,
                max_age: c.max_age,
                birth_thresh: 0.0,
                class_vote: c.class_vote,
                embedding_momentum: 0.9,
                duplicate_iou: None,
            },
            Self::ByteTrack(c) => LifecyclePolicy {
                min_hits: c.min_hits,
                max_age: c.max_age,
                birth_thresh: c.new_track_thresh.max(c.track_high_thresh),
                class_vote: c.class_vote,
                embedding_momentum: 0.9,
                duplicate_iou: Some(c.duplicate_iou),
            },
            Self::BotSort(c) => LifecyclePolicy {
                min_hits: c.min_hits,
                max_age: c.max_age,
                birth_thresh: c.new_track_thresh.max(c.track_high_thresh),
                class_vote: c.class_vote,
                embedding_momentum: c.embedding_momentum,
                duplicate_iou: Some(c.duplicate_iou),
            },
        }
    }

    pub(crate) fn association(&self) -> Association {
        match self {
            Self::Sort(c) => {
                let thresh = 1.0 - c.iou_threshold;
                Association::new(vec![MatchStage {
                    name: "iou",
                    tracks: TrackFilter::All,
                    detections: ScoreBand::ALL,
                    metric: Box::new(IouCost { gate: thresh }),
                    match_thresh: thresh,
                }])
            }
            Self::ByteTrack(c) => {
                let geometric = |gate: f32| -> Box<dyn CostMetric> {
                    if c.fuse_score {
                        Box::new(ScoreFusedIouCost { gate })
                    } else {
                        Box::new(IouCost { gate })
                    }
                };
                tiered_stages(
                    c.track_high_thresh,
                    c.track_low_thresh,
                    c.low_match_thresh,
                    (geometric(c.match_thresh), c.match_thresh),
                    (geometric(c.unconfirmed_match_thresh), c.unconfirmed_match_thresh),
                )
            }
            Self::BotSort(c) => {
                let appearance = |gate: f32| -> Box<dyn CostMetric> {
                    Box::new(AppearanceCost {
                        gate,
                        proximity_thresh: c.proximity_thresh,
                        appearance_thresh: c.appearance_thresh,
                        weight: c.appearance_weight,
                        metric: c.embedding_metric,
                        fuse_score: c.fuse_score,
                    })
                };
                tiered_stages(
                    c.track_high_thresh,
                    c.track_low_thresh,
                    c.low_match_thresh,
                    (appearance(c.match_thresh), c.match_thresh),
                    (appearance(c.unconfirmed_match_thresh), c.unconfirmed_match_thresh),
                )
            }
        }
    }
}

/// Confirmed tracks vs. high-score detections, then still-active confirmed
/// tracks vs. low-score detections, then tentative tracks vs. the remaining
/// high-score detections.
fn tiered_stages(
    high: f32,
    low: f32,
    low_match_thresh: f32,
    (first_metric, first_thresh): (Box<dyn CostMetric>, f32),
    (unconfirmed_metric, unconfirmed_thresh): (Box<dyn CostMetric>, f32),
) -> Association {
    Association::new(vec![
        MatchStage {
            name: "high",
            tracks: TrackFilter::Confirmed,
            detections: ScoreBand::at_least(high),
            metric: first_metric,
            match_thresh: first_thresh,
        },
        MatchStage {
            name: "low",
            tracks: TrackFilter::Active,
            detections: ScoreBand::between(low, high),
            metric: Box::new(IouCost { gate: low_match_thresh }),
            match_thresh: low_match_thresh,
        },
        MatchStage {
            name: "unconfirmed",
            tracks: TrackFilter::Tentative,
            detections: ScoreBand::at_least(high),
            metric: unconfirmed_metric,
            match_thresh: unconfirmed_thresh,
        },
    ])
}

fn check_lifecycle(max_age: u32, min_hits: u32) -> Result<(), TrackerError> {
    if max_age < 1 {
        return Err(TrackerError::invalid_config(
            "max_age",
            "must be at least 1",
        ));
    }
    if min_hits < 1 {
        return Err(TrackerError::invalid_config(
            "min_hits",
            "must be at least 1",
        ));
    }
    Ok(())
}

fn check_unit(field: &'static str, value: f32) -> Result<(), TrackerError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(TrackerError::invalid_config(
            field,
            format!("must be within [0, 1], got {value}"),
        ));
    }
    Ok(())
}

fn check_tiers(
    high: f32,
    low: f32,
    new_track: f32,
    match_thresh: f32,
    low_match: f32,
    unconfirmed_match: f32,
) -> Result<(), TrackerError> {
    check_unit("track_high_thresh", high)?;
    check_unit("track_low_thresh", low)?;
    check_unit("new_track_thresh", new_track)?;
    check_unit("match_thresh", match_thresh)?;
    check_unit("low_match_thresh", low_match)?;
    check_unit("unconfirmed_match_thresh", unconfirmed_match)?;
    if low > high {
        return Err(TrackerError::invalid_config(
            "track_low_thresh",
            format!("must not exceed track_high_thresh ({high}), got {low}"),
        ));
    }
    Ok(())
}
