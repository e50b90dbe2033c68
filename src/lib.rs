//! Multi-object tracking core.
//!
//! Assigns persistent identities to per-frame detections using a Kalman
//! motion model, IoU/appearance cost matrices and exact linear assignment.
//! SORT, ByteTrack and BoT-SORT style association are available as
//! configurations of the same [`Tracker`] engine.

pub mod error;
pub mod integration;
pub mod tracker;

pub use error::TrackerError;
pub use integration::{DetectionBuilder, DetectionSource, IntoDetections, TrackerPipeline};
pub use tracker::{
    BotSortConfig, ByteTrackConfig, ClassVote, Detection, EmbeddingMetric, FrameContext,
    MotionModel, Rect, SortConfig, Track, TrackState, TrackedObject, Tracker, TrackerConfig,
    TrackerKind, build_tracker,
};
