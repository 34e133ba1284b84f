//! Screen capture domain — public API.
//!
//! This module owns everything between "a capture rectangle exists"
//! and "here is one validated frame for the current page": the region
//! geometry, the OS grab (behind [`ScreenshotProvider`]), frame
//! classification, and the per-page retry/arbitration state machine.

mod page;
mod region;
mod screenshot;
pub mod validate;

pub use page::{CaptureError, CaptureOutcome, PageCapture};
pub use region::{CaptureRegion, RegionDescriptor, RegionError};
pub use screenshot::{GrabError, MonitorGrabber, ScreenshotProvider};
