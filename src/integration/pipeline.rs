//! TrackerPipeline for combining detection with tracking.

use crate::error::TrackerError;
use crate::tracker::{FrameContext, TrackedObject, Tracker, TrackerConfig};

use super::DetectionSource;

/// Bundles any [`DetectionSource`] with a [`Tracker`] for end-to-end
/// per-frame tracking.
pub struct TrackerPipeline<D: DetectionSource> {
    detector: D,
    tracker: Tracker,
}

impl<D: DetectionSource> TrackerPipeline<D> {
    /// Build a pipeline with a fresh tracker for `config`.
    pub fn new(detector: D, config: TrackerConfig) -> Result<Self, TrackerError> {
        Ok(Self {
            detector,
            tracker: Tracker::new(config)?,
        })
    }

    /// Pair a detector with an already constructed tracker.
    pub fn with_tracker(detector: D, tracker: Tracker) -> Self {
        Self { detector, tracker }
    }

    /// Run detection on one frame and feed the result to the tracker.
    ///
    /// # Arguments
    /// * `input` - Raw image bytes
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    pub fn process_frame(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<TrackedObject>, D::Error> {
        self.process_frame_with_context(input, width, height, &FrameContext::default())
    }

    /// Like [`TrackerPipeline::process_frame`], with camera motion for the frame.
    pub fn process_frame_with_context(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
        context: &FrameContext,
    ) -> Result<Vec<TrackedObject>, D::Error> {
        let detections = self.detector.detect(input, width, height)?;
        Ok(self.tracker.update_with_context(detections, context))
    }

    /// Get reference to the detector.
    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Get mutable reference to the detector.
    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// Get reference to the tracker.
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Get mutable reference to the tracker.
    pub fn tracker_mut(&mut self) -> &mut Tracker {
        &mut self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Detection;

    struct MockDetector {
        detections: Vec<Detection>,
    }

    impl DetectionSource for MockDetector {
        type Error = std::convert::Infallible;

        fn detect(
            &mut self,
            _input: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Vec<Detection>, Self::Error> {
            Ok(self.detections.clone())
        }
    }

    #[test]
    fn test_tracker_pipeline() {
        let detector = MockDetector {
            detections: vec![Detection::new(10.0, 20.0, 50.0, 80.0, 0.9)],
        };

        let config = TrackerConfig::default();
        let mut pipeline = TrackerPipeline::new(detector, config).unwrap();
        for _ in 0..2 {
            assert!(pipeline.process_frame(&[], 640, 480).unwrap().is_empty());
        }
        let tracks = pipeline.process_frame(&[], 640, 480).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_id, 1);
        assert_eq!(pipeline.tracker().frame_id(), 3);
    }

    #[test]
    fn test_pipeline_rejects_invalid_config() {
        let detector = MockDetector { detections: vec![] };
        let mut config = crate::tracker::SortConfig::default();
        config.max_age = 0;
        assert!(TrackerPipeline::new(detector, config.into()).is_err());
    }
}
