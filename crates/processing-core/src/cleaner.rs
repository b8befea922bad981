//! Background removal.
//!
//! Every pixel that satisfies [`is_background`] becomes fully transparent;
//! everything else is copied through untouched. Rows are independent, so
//! they are processed on the rayon pool.

use ghosttrail_common::config::AnalysisConfig;
use ghosttrail_model::frame::Frame;
use ghosttrail_model::pixel::{Pixel, BYTES_PER_PIXEL};
use rayon::prelude::*;

use crate::pixel_codec::is_background;

/// Strips background pixels from decoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCleaner {
    threshold: u8,
}

impl FrameCleaner {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.background_threshold)
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Produce the cleaned copy of `frame`.
    pub fn clean(&self, frame: &Frame) -> Frame {
        clean(frame, self.threshold)
    }
}

impl Default for FrameCleaner {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

/// Return a new frame where background pixels are `(0, 0, 0, 0)`.
///
/// Size, scale and orientation are preserved. Idempotent.
pub fn clean(frame: &Frame, threshold: u8) -> Frame {
    let mut out = frame.transparent_like();
    let stride = frame.stride();
    if stride == 0 || frame.height() == 0 {
        return out;
    }

    out.as_bytes_mut()
        .par_chunks_mut(stride)
        .zip(frame.as_bytes().par_chunks(stride))
        .for_each(|(dst_row, src_row)| clean_row(dst_row, src_row, threshold));

    out
}

fn clean_row(dst: &mut [u8], src: &[u8], threshold: u8) {
    for (d, s) in dst
        .chunks_exact_mut(BYTES_PER_PIXEL)
        .zip(src.chunks_exact(BYTES_PER_PIXEL))
    {
        let pixel = Pixel::from_le_bytes([s[0], s[1], s[2], s[3]]);
        // `dst` starts zeroed, so background pixels need no write.
        if !is_background(pixel, threshold) {
            d.copy_from_slice(s);
        }
    }
}
