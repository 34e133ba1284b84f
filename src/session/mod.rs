//! Session driver — one full book copy, start to finish.
//!
//! A session runs two sequential passes over the book. The first pass
//! covers the page count the user declared; the second ("scan") pass
//! keeps turning pages until the frame stops changing, which is how
//! the actual end of the book is detected when the declared count was
//! short. Pause and cancel are honored between pages on both passes,
//! and teardown (listener stop, final PDF flush) runs on every exit
//! path exactly once.

mod processor;

pub use processor::{PageOutcome, PageProcessor, ProcessError};

use std::time::Duration;

use crate::arbitrate::Arbitrator;
use crate::capture::{CaptureRegion, PageCapture, ScreenshotProvider};
use crate::config::SessionParams;
use crate::pdf::{PdfBatchWriter, PdfError};
use crate::signal::{KeyWatcher, PauseSignal, SignalError};

/// Terminal state of a session that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The whole book was captured.
    Completed,
    /// The user stopped the run. The caller decides whether the
    /// partially written PDF is kept or deleted.
    Cancelled,
}

/// Turns the reader to the next page.
///
/// Implementations send whatever input the hosting application needs
/// (typically a "next page" key) and may first report, via
/// [`needs_refocus`](Self::needs_refocus), that the reader lost focus
/// or reloaded and deserves the extended settle wait before input is
/// sent. Window activation itself belongs to the excluded UI layer.
pub trait PageAdvancer {
    fn advance(&mut self) -> Result<(), AdvanceError>;

    fn needs_refocus(&mut self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
#[error("page advance failed: {0}")]
pub struct AdvanceError(pub String);

/// Top-level driver for one book copy.
pub struct CaptureSession<P, A> {
    processor: PageProcessor<P>,
    signal: PauseSignal,
    advancer: A,
    arbitrator: Box<dyn Arbitrator>,
    page_wait: Duration,
    book_length: u32,
    max_scan_pages: u32,
}

impl<P: ScreenshotProvider, A: PageAdvancer> CaptureSession<P, A> {
    /// Wires the component stack for one session.
    pub fn new(
        params: &SessionParams,
        region: CaptureRegion,
        provider: P,
        advancer: A,
        arbitrator: Box<dyn Arbitrator>,
    ) -> Self {
        let capture = PageCapture::new(
            provider,
            region,
            params.blank_attempts,
            params.blank_detection_threshold,
            params.capture_retry_attempts,
            params.page_wait(),
        );
        let writer = PdfBatchWriter::new(
            &params.output_path,
            params.max_images_per_batch,
            params.max_batch_memory_mb,
        );
        Self {
            processor: PageProcessor::new(capture, writer),
            signal: PauseSignal::new(params.settle_wait()),
            advancer,
            arbitrator,
            page_wait: params.page_wait(),
            book_length: params.book_length,
            max_scan_pages: params.max_scan_pages,
        }
    }

    /// Runs the session to completion, cancellation, or failure.
    ///
    /// The key listener and the PDF batch are torn down on every path;
    /// a teardown failure after an otherwise successful run is
    /// reported, while a teardown failure after a session error is
    /// logged and the session error wins.
    pub fn run<W>(mut self, watcher: W) -> Result<SessionOutcome, SessionError>
    where
        W: KeyWatcher + Send + 'static,
    {
        self.signal.start_listener(watcher)?;
        log::info!("Capture session starting");

        let result = self.run_passes();
        let teardown = self.teardown();

        match result {
            Ok(outcome) => {
                teardown?;
                log::info!("Book finished: {:?}", outcome);
                Ok(outcome)
            }
            Err(e) => {
                if let Err(teardown_err) = teardown {
                    log::error!("Teardown failed after session error: {}", teardown_err);
                }
                log::error!("Runtime error during capture: {}", e);
                Err(e)
            }
        }
    }

    fn teardown(&mut self) -> Result<(), PdfError> {
        self.signal.stop_listener();
        self.processor.finalize_output()
    }

    fn run_passes(&mut self) -> Result<SessionOutcome, SessionError> {
        log::debug!(
            "Session parameters: page_wait {:?}, book_length {}, max_scan_pages {}",
            self.page_wait,
            self.book_length,
            self.max_scan_pages
        );

        // Let the reader settle before the first grab; the user just
        // dismissed the setup UI.
        if self.signal.absorb_focus(self.arbitrator.as_ref())? {
            return Ok(SessionOutcome::Cancelled);
        }

        log::info!("First pass: {} declared page(s)", self.book_length);
        for page in 0..self.book_length {
            if self.should_stop()? {
                log::info!("Capture cancelled during first pass");
                return Ok(SessionOutcome::Cancelled);
            }
            log::debug!("Page {} of {}", page + 1, self.book_length);
            match self
                .processor
                .process_page(&self.signal, self.arbitrator.as_ref(), false)?
            {
                PageOutcome::Cancelled => return Ok(SessionOutcome::Cancelled),
                PageOutcome::End => {
                    // Short book: the user declared the end before the
                    // declared count ran out. The scan pass is skipped.
                    log::info!("End of book reached during first pass");
                    return Ok(SessionOutcome::Completed);
                }
                PageOutcome::Next => self.turn_page()?,
            }
        }

        log::info!("Second pass: scanning for the closing duplicate");
        let mut scanned = 0u32;
        loop {
            if self.should_stop()? {
                log::info!("Capture cancelled during scan pass");
                return Ok(SessionOutcome::Cancelled);
            }
            match self
                .processor
                .process_page(&self.signal, self.arbitrator.as_ref(), true)?
            {
                PageOutcome::Cancelled => return Ok(SessionOutcome::Cancelled),
                PageOutcome::End => {
                    log::info!("Closing duplicate found, book complete");
                    return Ok(SessionOutcome::Completed);
                }
                PageOutcome::Next => {
                    scanned += 1;
                    if scanned >= self.max_scan_pages {
                        return Err(SessionError::ScanOverrun { pages: scanned });
                    }
                    self.turn_page()?;
                }
            }
        }
    }

    fn should_stop(&self) -> Result<bool, SessionError> {
        Ok(self.signal.is_cancelled() || self.signal.check(self.arbitrator.as_ref())?)
    }

    /// Advances the reader and waits out the page-load delay. A
    /// cancellation raised during either wait is left for the next
    /// loop iteration's check.
    fn turn_page(&mut self) -> Result<(), SessionError> {
        if self.advancer.needs_refocus() {
            log::debug!("Reader needs refocusing, taking the extended wait");
            if self.signal.absorb_focus(self.arbitrator.as_ref())? {
                return Ok(());
            }
        }
        self.advancer.advance()?;
        log::info!("Navigating to next page");
        self.signal
            .wait_or_pause(self.page_wait, self.arbitrator.as_ref())?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("failed to finalize output PDF: {0}")]
    Pdf(#[from] PdfError),

    #[error(transparent)]
    Advance(#[from] AdvanceError),

    #[error("scan pass exceeded {pages} pages without finding a closing duplicate")]
    ScanOverrun { pages: u32 },
}
