//! shelfscan — capture core for copying a browser-rendered e-book
//! into a PDF, one screenshot per page.
//!
//! The crate drives the full copy loop: grab the capture region,
//! validate the frame (blank detection, exact-duplicate detection),
//! escalate ambiguous frames to the user, batch accepted pages into
//! the output PDF, and keep the whole run pausable and cancellable
//! from a global interrupt key.
//!
//! What it deliberately does not contain: dialog rendering, browser
//! window activation, the region-selection overlay, and settings
//! persistence. Those arrive through the seams defined here:
//! [`arbitrate::Arbitrator`] for the three modal decisions,
//! [`capture::ScreenshotProvider`] for raw grabs,
//! [`session::PageAdvancer`] for page turning, and
//! [`signal::KeyWatcher`] for the interrupt key.

pub mod arbitrate;
pub mod capture;
pub mod config;
pub mod pdf;
pub mod session;
pub mod signal;

pub use arbitrate::{Arbitrator, BlankDecision, DuplicateDecision};
pub use capture::{CaptureRegion, MonitorGrabber, RegionDescriptor, ScreenshotProvider};
pub use config::SessionParams;
pub use pdf::PdfBatchWriter;
pub use session::{AdvanceError, CaptureSession, PageAdvancer, SessionError, SessionOutcome};
pub use signal::{EscapeWatcher, KeyWatcher, PauseSignal};
