//! Decoder backends.

pub mod ffmpeg;

pub use ffmpeg::{FfmpegDecoder, FfprobeAsset};
