//! Glue between external detectors and the tracker.
//!
//! Detection itself is out of scope for this crate; these traits and helpers
//! only adapt detector output to [`Detection`](crate::tracker::Detection)
//! and drive a [`Tracker`](crate::tracker::Tracker) frame by frame.

mod builder;
mod detector;
mod pipeline;

pub use builder::DetectionBuilder;
pub use detector::{DetectionSource, IntoDetections};
pub use pipeline::TrackerPipeline;
