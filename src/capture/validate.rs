//! Frame classification — blank detection and duplicate detection.
//!
//! Both checks are deliberately simple. Blankness is an edge-density
//! heuristic: a page with nothing on it produces almost no edges under
//! a Canny filter. Duplication is byte-exact pixel equality; two pages
//! that merely look alike must never be collapsed, so there is no
//! fuzzy or structural matching here.

use image::{DynamicImage, GenericImageView};
use imageproc::edges::canny;

/// Canny hysteresis thresholds, matched to what works on rendered
/// book pages (anti-aliased text on a flat background).
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

/// True when `frame` carries negligible content.
///
/// The edge-pixel ratio of the grayscale frame is compared against
/// `edge_threshold` with a strict less-than, so a threshold of `0.0`
/// can never classify a frame as blank. Scan-mode passes exactly that
/// to keep a legitimately blank closing page from being escalated
/// twice (once as blank, once as the terminating duplicate).
pub fn is_blank(frame: &DynamicImage, edge_threshold: f32) -> bool {
    let (width, height) = frame.dimensions();
    let total_pixels = width as u64 * height as u64;
    if total_pixels == 0 {
        return true;
    }

    let gray = frame.to_luma8();
    let edges = canny(&gray, CANNY_LOW, CANNY_HIGH);
    let edge_pixels = edges.pixels().filter(|p| p.0[0] > 0).count() as u64;

    let edge_ratio = edge_pixels as f32 / total_pixels as f32;
    log::debug!(
        "Blank check: edge_ratio {:.5} vs threshold {:.5}",
        edge_ratio,
        edge_threshold
    );
    edge_ratio < edge_threshold
}

/// True when the two frames have identical dimensions and identical
/// raw pixel bytes.
pub fn frames_identical(a: &DynamicImage, b: &DynamicImage) -> bool {
    a.dimensions() == b.dimensions() && a.as_bytes() == b.as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    /// Flat single-color frame: no edges at all.
    fn flat_frame(size: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            size,
            size,
            Rgba([value, value, value, 255]),
        ))
    }

    /// Alternating black/white vertical stripes: plenty of hard edges.
    fn striped_frame(size: u32, stripe: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(size, size, |x, _| {
            if (x / stripe) % 2 == 0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        }))
    }

    #[test]
    fn flat_frame_is_blank() {
        assert!(is_blank(&flat_frame(100, 230), 0.006));
    }

    #[test]
    fn striped_frame_is_not_blank() {
        assert!(!is_blank(&striped_frame(100, 10), 0.006));
    }

    #[test]
    fn zero_threshold_never_blanks() {
        // Even a featureless frame survives scan-mode's forced threshold.
        assert!(!is_blank(&flat_frame(100, 230), 0.0));
    }

    #[test]
    fn blank_is_monotone_in_threshold() {
        // If a frame is blank at a strict threshold it stays blank at
        // every looser one.
        let frame = striped_frame(100, 50);
        let thresholds = [0.001, 0.01, 0.05, 0.2, 0.9];
        let mut seen_blank = false;
        for t in thresholds {
            let blank = is_blank(&frame, t);
            if seen_blank {
                assert!(blank, "frame un-blanked at looser threshold {}", t);
            }
            seen_blank |= blank;
        }
    }

    #[test]
    fn identical_frames_match() {
        let a = striped_frame(64, 8);
        let b = striped_frame(64, 8);
        assert!(frames_identical(&a, &b));
        assert!(frames_identical(&a, &a.clone()));
    }

    #[test]
    fn single_pixel_difference_breaks_identity() {
        let a = striped_frame(64, 8);
        let mut b = a.to_rgba8();
        b.put_pixel(10, 10, Rgba([1, 2, 3, 255]));
        assert!(!frames_identical(&a, &DynamicImage::ImageRgba8(b)));
    }

    #[test]
    fn different_dimensions_are_never_identical() {
        let a = flat_frame(64, 0);
        let b = flat_frame(32, 0);
        assert!(!frames_identical(&a, &b));
    }
}
