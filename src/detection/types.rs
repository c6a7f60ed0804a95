// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// Data structures shared by the watch loop and the HTTP endpoint

/// One decoded video frame (RGB, 8 bit per channel)
pub type Frame = image::RgbImage;

/// Detection bounding box in pixel coordinates (x1 <= x2, y1 <= y2)
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    /// Build from two corners, normalising the order
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// `[x, y, width, height]`, the layout the HTTP endpoint returns
    pub fn to_xywh(&self) -> [f32; 4] {
        [self.x1, self.y1, self.width(), self.height()]
    }

    pub fn intersection_area(&self, other: &BBox) -> f32 {
        let l = self.x1.max(other.x1);
        let r = self.x2.min(other.x2);
        let t = self.y1.max(other.y1);
        let b = self.y2.min(other.y2);
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0. {
            0.
        } else {
            inter / union
        }
    }
}

/// One object reported by the detector
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f32, // [0, 1]
    pub bbox: BBox,
}

impl Detection {
    pub fn new(class_name: impl Into<String>, confidence: f32, bbox: BBox) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            bbox,
        }
    }

    /// `"BEAR: 0.91"`
    pub fn label(&self) -> String {
        format!("{}: {:.2}", self.class_name.to_uppercase(), self.confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_normalises_corners() {
        let b = BBox::new(50., 60., 10., 20.);
        assert_eq!(b, BBox { x1: 10., y1: 20., x2: 50., y2: 60. });
        assert_eq!(b.to_xywh(), [10., 20., 40., 40.]);
    }

    #[test]
    fn test_iou() {
        let a = BBox::new(0., 0., 10., 10.);
        let b = BBox::new(5., 0., 15., 10.);
        assert!((a.iou(&b) - 50. / 150.).abs() < 1e-6);
        assert_eq!(a.iou(&BBox::new(20., 20., 30., 30.)), 0.);
    }

    #[test]
    fn test_label_format() {
        let d = Detection::new("bear", 0.906, BBox::new(0., 0., 1., 1.));
        assert_eq!(d.label(), "BEAR: 0.91");
    }
}
