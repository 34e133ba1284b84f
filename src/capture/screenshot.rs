//! Raw screen grabs using the `xcap` crate.
//!
//! This is the infrastructure layer, the only place the capture domain
//! talks to the OS. Everything above it goes through the
//! [`ScreenshotProvider`] trait so the page state machine can be driven
//! by scripted frames in tests.

use image::{imageops, DynamicImage, RgbaImage};
use xcap::Monitor;

use super::region::{CaptureRegion, RegionError};

/// Produces one bitmap of the session's capture rectangle per call.
///
/// A zero-size result must be reported as an error, never as an empty
/// image; the retry policy in [`super::page`] depends on it.
pub trait ScreenshotProvider {
    fn grab(&mut self, region: &CaptureRegion) -> Result<DynamicImage, GrabError>;
}

/// `xcap`-backed provider.
///
/// Monitor captures are composited onto a virtual-desktop canvas and
/// the session rectangle is cropped out, so a region spanning two
/// side-by-side monitors comes back as one seamless bitmap.
pub struct MonitorGrabber;

impl MonitorGrabber {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MonitorGrabber {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenshotProvider for MonitorGrabber {
    fn grab(&mut self, region: &CaptureRegion) -> Result<DynamicImage, GrabError> {
        let monitors =
            Monitor::all().map_err(|e| GrabError::MonitorEnumeration(e.to_string()))?;
        if monitors.is_empty() {
            return Err(GrabError::NoMonitors);
        }

        let selected = if region.spans_multiple_monitors() {
            monitors
        } else {
            vec![pick_monitor(monitors, region)?]
        };

        // Union of the selected monitors in virtual-screen coordinates.
        let mut bounds: Vec<(i32, i32, u32, u32)> = Vec::with_capacity(selected.len());
        for monitor in &selected {
            let x = monitor.x().map_err(|e| GrabError::MonitorProperty(e.to_string()))?;
            let y = monitor.y().map_err(|e| GrabError::MonitorProperty(e.to_string()))?;
            let w = monitor
                .width()
                .map_err(|e| GrabError::MonitorProperty(e.to_string()))?;
            let h = monitor
                .height()
                .map_err(|e| GrabError::MonitorProperty(e.to_string()))?;
            bounds.push((x, y, w, h));
        }
        let origin_x = bounds.iter().map(|b| b.0).min().unwrap_or(0);
        let origin_y = bounds.iter().map(|b| b.1).min().unwrap_or(0);
        let extent_x = bounds.iter().map(|b| b.0 + b.2 as i32).max().unwrap_or(0);
        let extent_y = bounds.iter().map(|b| b.1 + b.3 as i32).max().unwrap_or(0);

        let mut canvas = RgbaImage::new(
            (extent_x - origin_x) as u32,
            (extent_y - origin_y) as u32,
        );

        for (monitor, (x, y, _, _)) in selected.iter().zip(&bounds) {
            let shot = monitor
                .capture_image()
                .map_err(|e| GrabError::CaptureFailed(e.to_string()))?;
            if shot.width() == 0 || shot.height() == 0 {
                return Err(GrabError::EmptyFrame);
            }
            imageops::replace(
                &mut canvas,
                &shot,
                (x - origin_x) as i64,
                (y - origin_y) as i64,
            );
        }

        let frame = region.crop_from(&DynamicImage::ImageRgba8(canvas), origin_x, origin_y)?;
        log::debug!(
            "Grabbed {}x{} frame at ({},{})",
            frame.width(),
            frame.height(),
            region.left(),
            region.top()
        );
        Ok(frame)
    }
}

/// The monitor whose bounds contain the region's top-left corner,
/// falling back to the primary monitor, then to the first one.
fn pick_monitor(monitors: Vec<Monitor>, region: &CaptureRegion) -> Result<Monitor, GrabError> {
    let mut containing = None;
    let mut primary = None;
    for (index, monitor) in monitors.iter().enumerate() {
        let x = monitor.x().map_err(|e| GrabError::MonitorProperty(e.to_string()))?;
        let y = monitor.y().map_err(|e| GrabError::MonitorProperty(e.to_string()))?;
        let w = monitor
            .width()
            .map_err(|e| GrabError::MonitorProperty(e.to_string()))?;
        let h = monitor
            .height()
            .map_err(|e| GrabError::MonitorProperty(e.to_string()))?;
        if containing.is_none()
            && region.left() >= x
            && region.left() < x + w as i32
            && region.top() >= y
            && region.top() < y + h as i32
        {
            containing = Some(index);
        }
        if primary.is_none() && monitor.is_primary().unwrap_or(false) {
            primary = Some(index);
        }
    }
    let index = containing.or(primary).unwrap_or(0);
    monitors.into_iter().nth(index).ok_or(GrabError::NoMonitors)
}

#[derive(Debug, thiserror::Error)]
pub enum GrabError {
    #[error("failed to enumerate monitors: {0}")]
    MonitorEnumeration(String),

    #[error("no monitors available")]
    NoMonitors,

    #[error("failed to read monitor geometry: {0}")]
    MonitorProperty(String),

    #[error("screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("screen capture returned an empty frame")]
    EmptyFrame,

    #[error(transparent)]
    Region(#[from] RegionError),
}
