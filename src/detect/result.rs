use crate::frame::PixelBox;

/// Object classes the pipeline can ask a detector for.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TargetClass {
    #[default]
    Bird,
}

impl TargetClass {
    /// Column index in an 80-class COCO detector head.
    pub fn coco_index(&self) -> usize {
        match self {
            TargetClass::Bird => 14,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TargetClass::Bird => "bird",
        }
    }
}

/// Axis-aligned box in image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Round outward to whole pixels and clamp to a `width` x `height` frame.
    pub fn to_pixel_box(&self, width: u32, height: u32) -> PixelBox {
        let clamp = |v: f32, max: u32| -> u32 {
            if v.is_nan() || v <= 0.0 {
                0
            } else {
                (v as u32).min(max)
            }
        };
        PixelBox {
            x1: clamp(self.x1.floor(), width),
            y1: clamp(self.y1.floor(), height),
            x2: clamp(self.x2.ceil(), width),
            y2: clamp(self.y2.ceil(), height),
        }
    }
}

/// One detector output, in the coordinates of the image it was run on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class: TargetClass,
}

impl RawDetection {
    pub fn bird(bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            bbox,
            confidence,
            class: TargetClass::Bird,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_and_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        assert_eq!(a.area(), 100.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.iou(&BoundingBox::new(20.0, 20.0, 30.0, 30.0)), 0.0);
    }

    #[test]
    fn inverted_box_has_zero_area() {
        let b = BoundingBox::new(10.0, 10.0, 5.0, 5.0);
        assert_eq!(b.area(), 0.0);
    }

    #[test]
    fn pixel_box_is_clamped() {
        let b = BoundingBox::new(-4.5, 2.2, 120.7, 48.1);
        let p = b.to_pixel_box(100, 50);
        assert_eq!(
            p,
            PixelBox {
                x1: 0,
                y1: 2,
                x2: 100,
                y2: 49
            }
        );
    }

    #[test]
    fn bird_is_coco_fourteen() {
        assert_eq!(TargetClass::Bird.coco_index(), 14);
        assert_eq!(TargetClass::default().label(), "bird");
    }
}
