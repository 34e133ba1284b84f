//! Session parameters.
//!
//! The settings UI and its TOML persistence live outside this crate;
//! what arrives here is one flat, fully-resolved parameter set for a
//! single book. Every field has a workable default so partial
//! configurations deserialize cleanly.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Recognized options for one capture session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionParams {
    /// Per-page wait in seconds: how long a page gets to render after
    /// the page-turn input. Doubles as the delay between screenshot
    /// retry attempts.
    pub timer: f64,

    /// Declared page count for the first pass.
    pub book_length: u32,

    /// Batch flush threshold by frame count.
    pub max_images_per_batch: usize,

    /// Batch flush threshold by buffered frame memory, in megabytes.
    pub max_batch_memory_mb: u64,

    /// Edge-density ratio below which a frame counts as blank.
    pub blank_detection_threshold: f32,

    /// Where the output PDF is written.
    pub output_path: PathBuf,

    /// Extended settle wait in seconds, used after modal dialogs and
    /// when the reader needs refocusing.
    pub extra_delay: f64,

    /// Blank classifications tolerated per page before the user is
    /// asked.
    pub blank_attempts: u32,

    /// Extra attempts after a failed raw screenshot.
    pub capture_retry_attempts: u32,

    /// Hard ceiling on the scan pass, in pages. Hitting it fails the
    /// session instead of looping forever on a source that never
    /// stabilizes.
    pub max_scan_pages: u32,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            timer: 5.0,
            book_length: 0,
            max_images_per_batch: 50,
            max_batch_memory_mb: 200,
            blank_detection_threshold: 0.006,
            output_path: PathBuf::from("book.pdf"),
            extra_delay: 1.0,
            blank_attempts: 2,
            capture_retry_attempts: 2,
            max_scan_pages: 1000,
        }
    }
}

impl SessionParams {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn page_wait(&self) -> Duration {
        Duration::from_secs_f64(self.timer.max(0.0))
    }

    pub fn settle_wait(&self) -> Duration {
        Duration::from_secs_f64(self.extra_delay.max(0.0))
    }
}
