//! Per-page capture state machine.
//!
//! One call to [`PageCapture::capture_valid_frame`] produces one usable
//! frame for the current page, or a tagged reason why there is none.
//! Transient grab failures are retried quietly; repeated blank
//! classifications are escalated to the user once the blank budget is
//! spent; cancellation is honored immediately after every raw grab.

use std::thread;
use std::time::Duration;

use image::DynamicImage;

use crate::arbitrate::{Arbitrator, BlankDecision};
use crate::signal::{PauseSignal, SignalError};

use super::region::CaptureRegion;
use super::screenshot::{GrabError, ScreenshotProvider};
use super::validate;

/// Result of one page-capture cycle.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// A frame worth considering for the book.
    Valid(DynamicImage),
    /// The user chose to drop this page (blank arbitration).
    Discarded,
    /// The session was cancelled mid-capture.
    Cancelled,
}

/// Captures one validated frame of the session region per page.
///
/// Owns the capture rectangle for the whole session; the blank
/// threshold and retry budgets are fixed at construction.
pub struct PageCapture<P> {
    provider: P,
    region: CaptureRegion,
    blank_attempts: u32,
    blank_threshold: f32,
    grab_retries: u32,
    retry_delay: Duration,
}

impl<P: ScreenshotProvider> PageCapture<P> {
    pub fn new(
        provider: P,
        region: CaptureRegion,
        blank_attempts: u32,
        blank_threshold: f32,
        grab_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            provider,
            region,
            blank_attempts,
            blank_threshold,
            grab_retries,
            retry_delay,
        }
    }

    /// Runs the capture loop until a frame is accepted, discarded, or
    /// the session is cancelled.
    ///
    /// `scan_mode` forces the blank threshold to zero: during the
    /// duplicate-detection pass a genuinely blank final page must fall
    /// through to duplicate handling instead of raising a blank dialog
    /// right before the end-of-book dialog would fire anyway.
    pub fn capture_valid_frame(
        &mut self,
        signal: &PauseSignal,
        arbitrator: &dyn Arbitrator,
        scan_mode: bool,
    ) -> Result<CaptureOutcome, CaptureError> {
        let threshold = if scan_mode { 0.0 } else { self.blank_threshold };
        let mut blank_count = 0u32;

        loop {
            let frame = self.grab_with_retry()?;

            // Cancellation point: right after acquisition, before the
            // frame is examined. The just-grabbed bitmap is dropped.
            if signal.check(arbitrator)? {
                log::info!("Capture cancelled, discarding in-flight frame");
                return Ok(CaptureOutcome::Cancelled);
            }

            if !validate::is_blank(&frame, threshold) {
                return Ok(CaptureOutcome::Valid(frame));
            }

            blank_count += 1;
            log::debug!(
                "Frame classified blank, attempt {}/{}",
                blank_count,
                self.blank_attempts
            );
            if blank_count < self.blank_attempts {
                continue;
            }

            let decision = arbitrator.resolve_blank(&frame);
            log::debug!("Blank arbitration answered {:?}", decision);
            if signal.absorb_focus(arbitrator)? {
                return Ok(CaptureOutcome::Cancelled);
            }
            match decision {
                BlankDecision::Keep => return Ok(CaptureOutcome::Valid(frame)),
                BlankDecision::Retry => blank_count = 0,
                BlankDecision::Discard => {
                    log::info!("Blank frame discarded, page skipped");
                    return Ok(CaptureOutcome::Discarded);
                }
            }
        }
    }

    /// One raw acquisition with the transient-failure retry policy.
    ///
    /// A failed grab or a zero-size frame is retried after
    /// `retry_delay`; running out of attempts is fatal for the session.
    fn grab_with_retry(&mut self) -> Result<DynamicImage, CaptureError> {
        let mut last_error = GrabError::EmptyFrame;
        for attempt in 0..=self.grab_retries {
            match self.provider.grab(&self.region) {
                Ok(frame) if frame.width() > 0 && frame.height() > 0 => return Ok(frame),
                Ok(_) => {
                    log::warn!("Empty screenshot captured, attempt {}", attempt + 1);
                    last_error = GrabError::EmptyFrame;
                }
                Err(e) => {
                    log::warn!("Screenshot attempt {} failed: {}", attempt + 1, e);
                    last_error = e;
                }
            }
            if attempt < self.grab_retries {
                thread::sleep(self.retry_delay);
            }
        }
        log::error!(
            "Giving up on screenshot after {} attempts",
            self.grab_retries + 1
        );
        Err(CaptureError::GrabExhausted {
            attempts: self.grab_retries + 1,
            source: last_error,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("screenshot acquisition failed after {attempts} attempts")]
    GrabExhausted {
        attempts: u32,
        #[source]
        source: GrabError,
    },

    #[error(transparent)]
    Signal(#[from] SignalError),
}
