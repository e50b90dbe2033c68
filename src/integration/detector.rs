//! Traits connecting external detectors to the tracker.

use crate::tracker::Detection;

/// Trait for object detection backends.
///
/// Implement this trait to feed any detection model into a
/// [`TrackerPipeline`](super::TrackerPipeline).
///
/// # Example
///
/// ```ignore
/// use objtracker_rs::{DetectionSource, Detection};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(
///         &mut self,
///         input: &[u8],
///         width: u32,
///         height: u32,
///     ) -> Result<Vec<Detection>, Self::Error> {
///         Ok(vec![])
///     }
/// }
/// ```
pub trait DetectionSource {
    type Error;

    /// Run inference on raw image data and return detections.
    ///
    /// # Arguments
    /// * `input` - Raw image bytes (format depends on implementation)
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    fn detect(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, Self::Error>;
}

/// Conversion of model-specific outputs into detections.
pub trait IntoDetections {
    fn into_detections(self) -> Vec<Detection>;
}

impl IntoDetections for Vec<Detection> {
    fn into_detections(self) -> Vec<Detection> {
        self
    }
}

/// Rows of `[x1, y1, x2, y2, score, class]`. Rows with an unusable class
/// are dropped; box and score problems are left to the tracker.
impl IntoDetections for &[[f32; 6]] {
    fn into_detections(self) -> Vec<Detection> {
        self.iter()
            .filter_map(|row| match Detection::from_row(*row) {
                Ok(det) => Some(det),
                Err(err) => {
                    log::warn!("dropping detection row {row:?}: {err}");
                    None
                }
            })
            .collect()
    }
}

impl IntoDetections for Vec<[f32; 6]> {
    fn into_detections(self) -> Vec<Detection> {
        self.as_slice().into_detections()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_into_detections() {
        let rows = vec![
            [0.1, 0.2, 0.3, 0.4, 0.5, 0.0],
            [0.2, 0.3, 0.4, 0.5, 0.6, 1.0],
            [0.2, 0.3, 0.4, 0.5, 0.6, -1.0],
        ];
        let dets = rows.into_detections();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[1].class_id, 1);
        assert_eq!(dets[1].score, 0.6);
    }
}
