//! Incremental PDF output.
//!
//! Accepted frames are buffered in memory and written out in batches
//! so a long book neither holds every page in RAM nor touches the
//! output file once per page. The batch is cleared only after a
//! successful write; a failed flush keeps the frames so finalize (or a
//! caller-driven retry) can attempt the write again.

mod writer;

pub use writer::append_frames;

use std::path::{Path, PathBuf};

use image::DynamicImage;

/// Buffers accepted page frames and flushes them to the output PDF
/// when either batch limit is hit, or on demand.
pub struct PdfBatchWriter {
    max_images: usize,
    max_memory_bytes: u64,
    output_path: PathBuf,
    batch: Vec<DynamicImage>,
}

impl PdfBatchWriter {
    pub fn new(output_path: &Path, max_images: usize, max_memory_mb: u64) -> Self {
        Self {
            max_images,
            max_memory_bytes: max_memory_mb * 1024 * 1024,
            output_path: output_path.to_path_buf(),
            batch: Vec::new(),
        }
    }

    /// Appends a frame to the batch, flushing first if the append
    /// pushed the batch over either limit (or `force_flush` is set).
    /// The batch therefore never survives an over-limit append.
    pub fn add_frame(&mut self, frame: DynamicImage, force_flush: bool) -> Result<(), PdfError> {
        self.batch.push(frame);

        if force_flush || self.over_limits() {
            self.flush()
        } else {
            log::info!("Frame added to batch ({} buffered)", self.batch.len());
            Ok(())
        }
    }

    /// Writes all buffered frames as pages appended to the output PDF,
    /// in the order they were added. No-op on an empty batch. On
    /// failure the batch is left intact.
    pub fn flush(&mut self) -> Result<(), PdfError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        writer::append_frames(&self.batch, &self.output_path)?;
        log::info!(
            "Batch of {} page(s) written to {}",
            self.batch.len(),
            self.output_path.display()
        );
        self.batch.clear();
        Ok(())
    }

    /// Flushes whatever is still buffered. Safe on an empty batch.
    pub fn finalize(&mut self) -> Result<(), PdfError> {
        log::info!("Finalizing output PDF");
        self.flush()
    }

    /// Number of frames currently buffered.
    pub fn buffered(&self) -> usize {
        self.batch.len()
    }

    fn over_limits(&self) -> bool {
        let memory = self.memory_usage();
        if self.batch.len() >= self.max_images || memory >= self.max_memory_bytes {
            log::debug!(
                "Batch limit reached: {}/{} frames, {}/{} bytes",
                self.batch.len(),
                self.max_images,
                memory,
                self.max_memory_bytes
            );
            return true;
        }
        false
    }

    /// Raw byte estimate of the buffered frames.
    fn memory_usage(&self) -> u64 {
        self.batch.iter().map(|f| f.as_bytes().len() as u64).sum()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("PDF I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF write failed: {0}")]
    Write(#[from] lopdf::Error),
}
