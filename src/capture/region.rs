//! Capture rectangle — pure geometry, no OS calls.
//!
//! A region is fixed for the whole session: the user draws it once over
//! the reader window and every page is grabbed from the same rectangle.

use image::DynamicImage;
use serde::Deserialize;

/// Region descriptor as produced by the (excluded) selection overlay:
/// virtual-screen corner coordinates plus the 1-based monitor index the
/// rectangle was drawn on. An index above 1 means the rectangle may
/// cross monitor boundaries. Unknown keys are tolerated.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionDescriptor {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    #[serde(default = "default_monitor")]
    pub monitor: u32,
}

fn default_monitor() -> u32 {
    1
}

/// Axis-aligned capture rectangle in virtual-screen coordinates.
/// Immutable once constructed for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRegion {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    spans_multiple_monitors: bool,
}

impl CaptureRegion {
    pub fn from_descriptor(descriptor: &RegionDescriptor) -> Result<Self, RegionError> {
        if descriptor.x2 <= descriptor.x1 || descriptor.y2 <= descriptor.y1 {
            return Err(RegionError::EmptyRectangle {
                x1: descriptor.x1,
                y1: descriptor.y1,
                x2: descriptor.x2,
                y2: descriptor.y2,
            });
        }
        Ok(Self {
            x1: descriptor.x1,
            y1: descriptor.y1,
            x2: descriptor.x2,
            y2: descriptor.y2,
            spans_multiple_monitors: descriptor.monitor > 1,
        })
    }

    pub fn left(&self) -> i32 {
        self.x1
    }

    pub fn top(&self) -> i32 {
        self.y1
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1) as u32
    }

    pub fn spans_multiple_monitors(&self) -> bool {
        self.spans_multiple_monitors
    }

    /// Crops this region out of a canvas whose top-left corner sits at
    /// `(origin_x, origin_y)` in virtual-screen coordinates.
    ///
    /// The grabber composites monitor captures onto such a canvas and
    /// then cuts the session rectangle out of it here.
    pub fn crop_from(
        &self,
        canvas: &DynamicImage,
        origin_x: i32,
        origin_y: i32,
    ) -> Result<DynamicImage, RegionError> {
        let rel_x = self.x1 - origin_x;
        let rel_y = self.y1 - origin_y;
        if rel_x < 0
            || rel_y < 0
            || rel_x as u32 + self.width() > canvas.width()
            || rel_y as u32 + self.height() > canvas.height()
        {
            return Err(RegionError::OutOfBounds {
                region: (self.x1, self.y1, self.x2, self.y2),
                canvas_origin: (origin_x, origin_y),
                canvas_size: (canvas.width(), canvas.height()),
            });
        }
        Ok(canvas.crop_imm(rel_x as u32, rel_y as u32, self.width(), self.height()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("capture rectangle ({x1},{y1})-({x2},{y2}) has no area")]
    EmptyRectangle { x1: i32, y1: i32, x2: i32, y2: i32 },

    #[error(
        "capture rectangle ({},{})-({},{}) falls outside the captured canvas \
         ({}x{} at {},{})",
        region.0, region.1, region.2, region.3,
        canvas_size.0, canvas_size.1, canvas_origin.0, canvas_origin.1
    )]
    OutOfBounds {
        region: (i32, i32, i32, i32),
        canvas_origin: (i32, i32),
        canvas_size: (u32, u32),
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn descriptor(x1: i32, y1: i32, x2: i32, y2: i32, monitor: u32) -> RegionDescriptor {
        RegionDescriptor { x1, y1, x2, y2, monitor }
    }

    #[test]
    fn builds_from_descriptor() {
        let region = CaptureRegion::from_descriptor(&descriptor(10, 20, 110, 220, 1)).unwrap();
        assert_eq!(region.width(), 100);
        assert_eq!(region.height(), 200);
        assert!(!region.spans_multiple_monitors());
    }

    #[test]
    fn monitor_index_above_one_spans() {
        let region = CaptureRegion::from_descriptor(&descriptor(0, 0, 10, 10, 2)).unwrap();
        assert!(region.spans_multiple_monitors());
    }

    #[test]
    fn rejects_empty_rectangle() {
        let err = CaptureRegion::from_descriptor(&descriptor(50, 50, 50, 80, 1));
        assert!(matches!(err, Err(RegionError::EmptyRectangle { .. })));
        let err = CaptureRegion::from_descriptor(&descriptor(50, 50, 80, 40, 1));
        assert!(matches!(err, Err(RegionError::EmptyRectangle { .. })));
    }

    #[test]
    fn descriptor_tolerates_extra_keys() {
        let raw = r#"{"x1": 1, "y1": 2, "x2": 30, "y2": 40, "monitor": 1, "page_view": "double"}"#;
        let descriptor: RegionDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(descriptor.x2, 30);
    }

    #[test]
    fn descriptor_defaults_to_first_monitor() {
        let raw = r#"{"x1": 0, "y1": 0, "x2": 5, "y2": 5}"#;
        let descriptor: RegionDescriptor = serde_json::from_str(raw).unwrap();
        assert_eq!(descriptor.monitor, 1);
    }

    #[test]
    fn crops_relative_to_canvas_origin() {
        let region = CaptureRegion::from_descriptor(&descriptor(10, 10, 30, 40, 1)).unwrap();
        let canvas = DynamicImage::ImageRgba8(RgbaImage::new(100, 100));
        let cropped = region.crop_from(&canvas, 0, 0).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (20, 30));
    }

    #[test]
    fn crop_outside_canvas_fails() {
        let region = CaptureRegion::from_descriptor(&descriptor(90, 90, 130, 120, 1)).unwrap();
        let canvas = DynamicImage::ImageRgba8(RgbaImage::new(100, 100));
        assert!(matches!(
            region.crop_from(&canvas, 0, 0),
            Err(RegionError::OutOfBounds { .. })
        ));
        // Same rectangle is fine once the canvas origin shifts under it.
        assert!(region.crop_from(&canvas, 50, 50).is_ok());
    }
}
