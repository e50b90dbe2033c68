mod assignment;
mod association;
mod config;
mod detection;
mod engine;
mod kalman_filter;
mod lifecycle;
mod matching;
mod rect;
mod track;
mod track_set;
mod track_state;

pub use assignment::{AssignmentResult, linear_assignment};
pub use association::{Association, MatchStage, ScoreBand, TrackFilter};
pub use config::{BotSortConfig, ByteTrackConfig, SortConfig, TrackerConfig, TrackerKind};
pub use detection::Detection;
pub use engine::{FrameContext, TrackedObject, Tracker, build_tracker};
pub use kalman_filter::{KalmanFilter, MotionModel};
pub use lifecycle::{ClassVote, LifecyclePolicy};
pub use matching::{
    AppearanceCost, CostMetric, EmbeddingMetric, IouCost, ScoreFusedIouCost, UNMATCHABLE,
    embedding_distance, fuse_score, gate, iou_distance, l2_normalize,
};
pub use rect::{Rect, iou_batch};
pub use track::Track;
pub use track_set::TrackSet;
pub use track_state::TrackState;
