//! User arbitration — the seam to the (excluded) dialog layer.
//!
//! Automated classification sometimes comes up ambiguous: a page that
//! still looks blank after the retry budget, a frame identical to the
//! previous page outside scan-mode, or a pause request from the
//! interrupt key. Each of those blocks on a human decision. The capture
//! core only sees this trait; the GUI shell implements it with modal
//! dialogs, tests implement it with scripted answers.

use image::DynamicImage;

/// Outcome of the blank-frame dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankDecision {
    /// Keep the frame even though it classified as blank.
    Keep,
    /// Reset the blank budget and capture again from scratch.
    Retry,
    /// Drop the frame and move on to the next page.
    Discard,
}

/// Outcome of the duplicate-frame dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateDecision {
    /// Keep the duplicate as its own page.
    Keep,
    /// Drop the duplicate and move on.
    Discard,
    /// The book is over; stop capturing.
    EndBook,
}

/// Synchronous user-arbitration capability.
///
/// Every call blocks the capture thread until the user answers. The
/// dialogs steal focus from the reader window, so callers follow each
/// arbitration with [`crate::signal::PauseSignal::absorb_focus`].
pub trait Arbitrator {
    /// The blank budget ran out. Show `frame` and ask keep/retry/discard.
    fn resolve_blank(&self, frame: &DynamicImage) -> BlankDecision;

    /// `current` is pixel-identical to `previous`. Ask keep/discard/end.
    fn resolve_duplicate(
        &self,
        previous: &DynamicImage,
        current: &DynamicImage,
    ) -> DuplicateDecision;

    /// The user pressed the interrupt key. Returns true to stop the run.
    fn confirm_stop(&self) -> bool;
}
