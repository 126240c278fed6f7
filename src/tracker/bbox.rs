use ndarray::Array2;

/// Bounding box in the form the motion model works in.
///
/// Detections, predictions and reported boxes all use this representation:
/// - `cx`, `cy`: box center
/// - `scale`: box area (width * height)
/// - `aspect`: width / height
///
/// Corner forms (TLBR and TLWH) are only used at the boundary, when boxes come
/// in from a detector or go out to a cropper.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    /// Center x coordinate
    pub cx: f32,
    /// Center y coordinate
    pub cy: f32,
    /// Area of the box
    pub scale: f32,
    /// Width divided by height
    pub aspect: f32,
}

impl BoundingBox {
    #[inline]
    pub fn new(cx: f32, cy: f32, scale: f32, aspect: f32) -> Self {
        Self {
            cx,
            cy,
            scale,
            aspect,
        }
    }

    /// Create a box from corner coordinates (x1, y1, x2, y2).
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let width = x2 - x1;
        let height = y2 - y1;
        let aspect = if height > 0.0 { width / height } else { 0.0 };
        Self {
            cx: x1 + width / 2.0,
            cy: y1 + height / 2.0,
            scale: width * height,
            aspect,
        }
    }

    /// Create a box from its top-left corner and dimensions.
    #[inline]
    pub fn from_tlwh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_tlbr(x, y, x + width, y + height)
    }

    /// Width recovered from scale and aspect ratio.
    #[inline]
    pub fn width(&self) -> f32 {
        if self.is_degenerate() {
            0.0
        } else {
            (self.scale * self.aspect).sqrt()
        }
    }

    /// Height recovered from scale and aspect ratio.
    #[inline]
    pub fn height(&self) -> f32 {
        let width = self.width();
        if width > 0.0 { self.scale / width } else { 0.0 }
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Convert to corner coordinates: [x1, y1, x2, y2].
    pub fn to_tlbr(&self) -> [f32; 4] {
        let half_w = self.width() / 2.0;
        let half_h = self.height() / 2.0;
        [
            self.cx - half_w,
            self.cy - half_h,
            self.cx + half_w,
            self.cy + half_h,
        ]
    }

    /// Convert to top-left corner plus dimensions: [x, y, width, height].
    pub fn to_tlwh(&self) -> [f32; 4] {
        let [x1, y1, _, _] = self.to_tlbr();
        [x1, y1, self.width(), self.height()]
    }

    /// The four state components as `f64`, in motion-model order.
    #[inline]
    pub fn to_measurement(&self) -> [f64; 4] {
        [
            self.cx as f64,
            self.cy as f64,
            self.scale as f64,
            self.aspect as f64,
        ]
    }

    /// A box with no usable area: non-finite components, or non-positive
    /// scale or aspect ratio.
    pub fn is_degenerate(&self) -> bool {
        !(self.cx.is_finite()
            && self.cy.is_finite()
            && self.scale.is_finite()
            && self.aspect.is_finite())
            || self.scale <= 0.0
            || self.aspect <= 0.0
    }

    /// Intersection over Union computed on the corner form.
    ///
    /// Degenerate boxes have an IoU of 0 against everything, themselves included.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        if self.is_degenerate() || other.is_degenerate() {
            return 0.0;
        }

        let [ax1, ay1, ax2, ay2] = self.to_tlbr();
        let [bx1, by1, bx2, by2] = other.to_tlbr();

        let inter_width = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
        let inter_height = (ay2.min(by2) - ay1.max(by1)).max(0.0);
        let inter_area = inter_width * inter_height;

        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            (inter_area / union_area).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Calculate IoU matrix between two sets of bounding boxes.
///
/// Returns a matrix of shape (M, N) where M is the length of `boxes_a`
/// and N is the length of `boxes_b`.
pub fn iou_batch(boxes_a: &[BoundingBox], boxes_b: &[BoundingBox]) -> Array2<f32> {
    let mut ious = Array2::zeros((boxes_a.len(), boxes_b.len()));
    for (i, a) in boxes_a.iter().enumerate() {
        for (j, b) in boxes_b.iter().enumerate() {
            ious[[i, j]] = a.iou(b);
        }
    }
    ious
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tlbr_round_trip() {
        let bbox = BoundingBox::from_tlbr(10.0, 20.0, 40.0, 60.0);

        assert_eq!(bbox.cx, 25.0);
        assert_eq!(bbox.cy, 40.0);
        assert_eq!(bbox.scale, 1200.0);
        assert!((bbox.aspect - 0.75).abs() < 1e-6);

        let [x1, y1, x2, y2] = bbox.to_tlbr();
        assert!((x1 - 10.0).abs() < 1e-4);
        assert!((y1 - 20.0).abs() < 1e-4);
        assert!((x2 - 40.0).abs() < 1e-4);
        assert!((y2 - 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_from_tlwh() {
        let bbox = BoundingBox::from_tlwh(10.0, 20.0, 30.0, 40.0);
        let [x, y, w, h] = bbox.to_tlwh();
        assert!((x - 10.0).abs() < 1e-4);
        assert!((y - 20.0).abs() < 1e-4);
        assert!((w - 30.0).abs() < 1e-4);
        assert!((h - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_iou() {
        let a = BoundingBox::from_tlwh(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::from_tlwh(5.0, 5.0, 10.0, 10.0);

        // Intersection: 5x5 = 25
        // Union: 100 + 100 - 25 = 175
        let iou = a.iou(&b);
        assert!((iou - 25.0 / 175.0).abs() < 1e-5);
    }

    #[test]
    fn test_iou_no_overlap() {
        let a = BoundingBox::from_tlwh(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::from_tlwh(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_same_box() {
        let a = BoundingBox::from_tlwh(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_boxes() {
        let zero_width = BoundingBox::from_tlbr(10.0, 10.0, 10.0, 50.0);
        let inverted = BoundingBox::from_tlbr(50.0, 50.0, 10.0, 10.0);
        let nan = BoundingBox::new(f32::NAN, 0.0, 100.0, 1.0);
        let normal = BoundingBox::from_tlwh(0.0, 0.0, 10.0, 10.0);

        for bbox in [zero_width, inverted, nan] {
            assert!(bbox.is_degenerate());
            assert_eq!(bbox.iou(&normal), 0.0);
            assert_eq!(normal.iou(&bbox), 0.0);
            assert_eq!(bbox.iou(&bbox), 0.0);
        }
        assert!(!normal.is_degenerate());
    }

    #[test]
    fn test_iou_batch_shape() {
        let a = [
            BoundingBox::from_tlwh(0.0, 0.0, 10.0, 10.0),
            BoundingBox::from_tlwh(50.0, 50.0, 10.0, 10.0),
        ];
        let b = [BoundingBox::from_tlwh(0.0, 0.0, 10.0, 10.0)];
        let ious = iou_batch(&a, &b);
        assert_eq!(ious.dim(), (2, 1));
        assert!((ious[[0, 0]] - 1.0).abs() < 1e-6);
        assert_eq!(ious[[1, 0]], 0.0);
    }

    fn arb_box() -> impl Strategy<Value = BoundingBox> {
        (0.0f32..500.0, 0.0f32..500.0, 0.5f32..200.0, 0.5f32..200.0)
            .prop_map(|(x, y, w, h)| BoundingBox::from_tlwh(x, y, w, h))
    }

    proptest! {
        #[test]
        fn iou_is_symmetric_and_bounded(a in arb_box(), b in arb_box()) {
            let ab = a.iou(&b);
            let ba = b.iou(&a);
            prop_assert!((ab - ba).abs() < 1e-6);
            prop_assert!((0.0..=1.0).contains(&ab));
        }

        #[test]
        fn iou_of_box_with_itself_is_one(a in arb_box()) {
            prop_assert!((a.iou(&a) - 1.0).abs() < 1e-4);
        }
    }
}
