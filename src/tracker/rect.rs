use ndarray::Array2;

/// Axis-aligned box, stored as left, top, width and height.
///
/// Detectors and callers speak TLBR (`x1, y1, x2, y2`); the Kalman filter
/// measures XYAH (center x, center y, width / height, height).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Left, top, width, height.
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Left, top, right, bottom. Inverted corners give a negative extent,
    /// which [`Rect::is_valid`] rejects.
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    #[inline]
    pub fn from_xyah(cx: f32, cy: f32, aspect_ratio: f32, height: f32) -> Self {
        let width = aspect_ratio * height;
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.right(), self.bottom()]
    }

    /// Zero aspect ratio for a flat box; the filter floors the height.
    #[inline]
    pub fn to_xyah(&self) -> [f32; 4] {
        let (cx, cy) = self.center();
        let aspect_ratio = if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        };
        [cx, cy, aspect_ratio, self.height]
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// True when every coordinate is finite and the box has positive extent.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0
    }

    fn intersection_area(&self, other: &Rect) -> f32 {
        let w = self.right().min(other.right()) - self.x.max(other.x);
        let h = self.bottom().min(other.bottom()) - self.y.max(other.y);
        w.max(0.0) * h.max(0.0)
    }

    /// Intersection over union, in [0, 1]. Zero when the union is empty.
    pub fn iou(&self, other: &Rect) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.width * self.height + other.width * other.height - inter;
        if union > 0.0 {
            (inter / union).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Pairwise IoU, shape `(boxes_a.len(), boxes_b.len())`.
pub fn iou_batch(boxes_a: &[Rect], boxes_b: &[Rect]) -> Array2<f32> {
    Array2::from_shape_fn((boxes_a.len(), boxes_b.len()), |(i, j)| {
        boxes_a[i].iou(&boxes_b[j])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tlbr_and_xyah() {
        let rect = Rect::from_tlbr(10.0, 20.0, 40.0, 60.0);
        assert_eq!(rect, Rect::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(rect.to_tlbr(), [10.0, 20.0, 40.0, 60.0]);
        assert_eq!(rect.to_xyah(), [25.0, 40.0, 0.75, 40.0]);

        let back = Rect::from_xyah(25.0, 40.0, 0.75, 40.0);
        for (got, want) in back.to_tlbr().iter().zip(rect.to_tlbr()) {
            assert!((got - want).abs() < 1e-5);
        }
    }

    #[test]
    fn test_iou() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        // 25 / (100 + 100 - 25)
        let iou = a.iou(&Rect::new(5.0, 5.0, 10.0, 10.0));
        assert!((iou - 25.0 / 175.0).abs() < 1e-6);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&Rect::new(20.0, 20.0, 10.0, 10.0)), 0.0);
        // touching edges
        assert_eq!(a.iou(&Rect::new(10.0, 0.0, 10.0, 10.0)), 0.0);
    }

    #[test]
    fn test_iou_of_empty_boxes() {
        let point = Rect::new(1.0, 1.0, 0.0, 0.0);
        assert_eq!(point.iou(&point), 0.0);
    }

    #[test]
    fn test_is_valid() {
        assert!(Rect::from_tlbr(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Rect::from_tlbr(10.0, 0.0, 5.0, 1.0).is_valid());
        assert!(!Rect::from_tlbr(0.0, 0.0, 0.0, 1.0).is_valid());
        assert!(!Rect::from_tlbr(f32::NAN, 0.0, 1.0, 1.0).is_valid());
        assert!(!Rect::from_tlbr(0.0, 0.0, f32::INFINITY, 1.0).is_valid());
    }

    #[test]
    fn test_iou_batch() {
        let a = [
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(50.0, 0.0, 10.0, 10.0),
        ];
        let b = [Rect::new(0.0, 0.0, 10.0, 10.0); 3];
        let ious = iou_batch(&a, &b);
        assert_eq!(ious.dim(), (2, 3));
        assert!((ious[[0, 2]] - 1.0).abs() < 1e-6);
        assert_eq!(ious[[1, 0]], 0.0);
        assert_eq!(iou_batch(&[], &b).dim(), (0, 3));
    }
}
