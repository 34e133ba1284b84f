//! Per-page coordination: capture, duplicate handling, accept.
//!
//! The processor sits between the capture state machine and the PDF
//! batch. It remembers exactly one frame, the most recently accepted
//! page, and judges every new frame against it. Duplicate handling is
//! the one behavior that differs between the two passes: the first
//! pass asks the user, the scan pass treats a duplicate as the end of
//! the book.

use image::DynamicImage;

use crate::arbitrate::{Arbitrator, DuplicateDecision};
use crate::capture::validate;
use crate::capture::{CaptureError, CaptureOutcome, PageCapture, ScreenshotProvider};
use crate::pdf::{PdfBatchWriter, PdfError};
use crate::signal::{PauseSignal, SignalError};

/// Result of processing one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// Move on to the next page.
    Next,
    /// The book is over (auto-detected or user-declared).
    End,
    /// The session was cancelled.
    Cancelled,
}

/// What to do with a captured frame after evaluation.
enum Evaluation {
    Accept,
    Skip,
    End,
    Cancelled,
}

pub struct PageProcessor<P> {
    capture: PageCapture<P>,
    writer: PdfBatchWriter,
    previous: Option<DynamicImage>,
    end_of_book: bool,
}

impl<P: ScreenshotProvider> PageProcessor<P> {
    pub fn new(capture: PageCapture<P>, writer: PdfBatchWriter) -> Self {
        Self {
            capture,
            writer,
            previous: None,
            end_of_book: false,
        }
    }

    pub fn end_of_book(&self) -> bool {
        self.end_of_book
    }

    pub fn writer(&self) -> &PdfBatchWriter {
        &self.writer
    }

    /// Flushes whatever the batch still holds. Called from session
    /// teardown on every exit path.
    pub fn finalize_output(&mut self) -> Result<(), PdfError> {
        self.writer.finalize()
    }

    /// Captures and judges one page.
    ///
    /// A discarded capture advances without saving in both modes: in
    /// the first pass the user chose to skip the page, in the scan
    /// pass there is simply nothing to compare.
    pub fn process_page(
        &mut self,
        signal: &PauseSignal,
        arbitrator: &dyn Arbitrator,
        scan_mode: bool,
    ) -> Result<PageOutcome, ProcessError> {
        log::info!("Taking screenshot");
        let frame = match self
            .capture
            .capture_valid_frame(signal, arbitrator, scan_mode)?
        {
            CaptureOutcome::Cancelled => return Ok(PageOutcome::Cancelled),
            CaptureOutcome::Discarded => return Ok(PageOutcome::Next),
            CaptureOutcome::Valid(frame) => frame,
        };

        match self.evaluate(&frame, signal, arbitrator, scan_mode)? {
            Evaluation::Cancelled => return Ok(PageOutcome::Cancelled),
            Evaluation::Accept => self.accept(frame)?,
            Evaluation::Skip => log::info!("Duplicate page dropped"),
            Evaluation::End => self.end_of_book = true,
        }

        if self.end_of_book {
            Ok(PageOutcome::End)
        } else {
            Ok(PageOutcome::Next)
        }
    }

    fn evaluate(
        &mut self,
        frame: &DynamicImage,
        signal: &PauseSignal,
        arbitrator: &dyn Arbitrator,
        scan_mode: bool,
    ) -> Result<Evaluation, ProcessError> {
        let Some(previous) = &self.previous else {
            log::info!("No previous page to compare against, accepting");
            return Ok(Evaluation::Accept);
        };

        let duplicate = validate::frames_identical(frame, previous);
        log::debug!("Duplicate check against previous page: {}", duplicate);

        if scan_mode {
            if duplicate {
                // The closing duplicate itself never reaches the book.
                log::info!("Scan pass hit the closing duplicate, ending the book");
                return Ok(Evaluation::End);
            }
            return Ok(Evaluation::Accept);
        }

        if !duplicate {
            return Ok(Evaluation::Accept);
        }

        let decision = arbitrator.resolve_duplicate(previous, frame);
        log::debug!("Duplicate arbitration answered {:?}", decision);
        if signal.absorb_focus(arbitrator)? {
            return Ok(Evaluation::Cancelled);
        }
        Ok(match decision {
            DuplicateDecision::Keep => Evaluation::Accept,
            DuplicateDecision::Discard => Evaluation::Skip,
            DuplicateDecision::EndBook => {
                log::info!("User declared end of book at duplicate page");
                Evaluation::End
            }
        })
    }

    /// Accepted frames go to the batch and become the comparison
    /// reference for the next page.
    fn accept(&mut self, frame: DynamicImage) -> Result<(), ProcessError> {
        self.writer.add_frame(frame.clone(), false)?;
        self.previous = Some(frame);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error(transparent)]
    Signal(#[from] SignalError),
}
