//! Video asset metadata.

use serde::{Deserialize, Serialize};

use crate::frame::FrameSize;

/// What is known about the video being analyzed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssetMetadata {
    /// File name for display.
    pub name: String,

    /// File size on disk.
    pub file_size_bytes: u64,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Native ticks per second of the asset's timeline.
    pub timescale: u32,

    /// Frame size before any downscaling.
    pub natural_size: FrameSize,

    /// Nominal frames per second of the video track.
    pub nominal_frame_rate: f64,
}

impl AssetMetadata {
    /// Placeholder used when the asset could not be probed.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.duration_seconds <= 0.0 && self.natural_size.is_empty()
    }

    /// Frames in the whole asset at the nominal rate.
    pub fn total_frames(&self) -> u64 {
        let frames = self.duration_seconds * self.nominal_frame_rate;
        if frames.is_finite() && frames > 0.0 {
            frames.floor() as u64
        } else {
            0
        }
    }

    /// File size in megabytes (10^6 bytes).
    pub fn file_size_mb(&self) -> f64 {
        self.file_size_bytes as f64 / 1_000_000.0
    }

    /// Multi-line summary shown next to the asset picker.
    pub fn details(&self) -> String {
        format!(
            "Name: {}\nSize: {:.1} MB\nFrame Rate: {} fps\nDuration: {:.1} sec\nTotal frames: {}\n",
            self.name,
            self.file_size_mb(),
            self.nominal_frame_rate.round() as i64,
            self.duration_seconds,
            self.total_frames(),
        )
    }
}
