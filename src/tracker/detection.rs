use crate::error::TrackerError;
use crate::tracker::rect::Rect;

/// Detection input for the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Bounding box (constructed from left, top, right, bottom)
    pub bbox: Rect,
    /// Detection confidence score in [0, 1]
    pub score: f32,
    /// Class label assigned by the detector
    pub class_id: usize,
    /// Appearance embedding, if the detector provides one
    pub embedding: Option<Vec<f32>>,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self::from_rect(Rect::from_tlbr(x1, y1, x2, y2), score)
    }

    pub fn from_rect(bbox: Rect, score: f32) -> Self {
        Self {
            bbox,
            score,
            class_id: 0,
            embedding: None,
        }
    }

    /// Build a detection from a `[x1, y1, x2, y2, score, class]` row.
    pub fn from_row(row: [f32; 6]) -> Result<Self, TrackerError> {
        let [x1, y1, x2, y2, score, class] = row;
        if !class.is_finite() || class < 0.0 {
            return Err(TrackerError::InvalidDetection(format!(
                "class id {class} is not a non-negative number"
            )));
        }
        Ok(Self::new(x1, y1, x2, y2, score).with_class(class as usize))
    }

    pub fn with_class(mut self, class_id: usize) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Check the box and score.
    ///
    /// The embedding is not checked here, see [`Detection::sanitized`].
    pub fn validate(&self) -> Result<(), TrackerError> {
        if !self.bbox.is_valid() {
            return Err(TrackerError::InvalidDetection(format!(
                "box {:?} is non-finite, inverted or empty",
                self.bbox.to_tlbr()
            )));
        }
        if !self.score.is_finite() {
            return Err(TrackerError::InvalidDetection(format!(
                "score {} is not finite",
                self.score
            )));
        }
        Ok(())
    }

    /// Validate the detection and drop an unusable embedding.
    ///
    /// Returns `None` for detections that must not reach the tracker. An
    /// embedding that is empty, non-finite or all zeros is removed while the
    /// detection itself is kept.
    pub(crate) fn sanitized(mut self) -> Option<Self> {
        if let Err(err) = self.validate() {
            log::warn!("dropping detection: {err}");
            return None;
        }
        self.score = self.score.clamp(0.0, 1.0);
        let unusable = self.embedding.as_deref().is_some_and(|e| {
            e.is_empty() || e.iter().any(|v| !v.is_finite()) || e.iter().all(|v| *v == 0.0)
        });
        if unusable {
            log::warn!(
                "dropping unusable embedding of detection {:?}",
                self.bbox.to_tlbr()
            );
            self.embedding = None;
        }
        Some(self)
    }
}
