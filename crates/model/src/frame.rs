//! Decoded frames and the trail composite.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decode::DecodeError;
use crate::pixel::{Pixel, BYTES_PER_PIXEL};

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Shrink both dimensions by `divisor`, never below one pixel.
    ///
    /// An empty size stays empty; a divisor of 0 is treated as 1.
    pub fn downscaled(&self, divisor: u32) -> FrameSize {
        if self.is_empty() {
            return *self;
        }
        let divisor = divisor.max(1);
        FrameSize {
            width: (self.width / divisor).max(1),
            height: (self.height / divisor).max(1),
        }
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How a frame should be rotated/mirrored for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Up,
    Down,
    Left,
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

/// A decoded image for one sample time.
///
/// Row-major, [`BYTES_PER_PIXEL`] bytes per pixel, each pixel stored as the
/// little-endian bytes of its [`Pixel`] word. `scale` and `orientation` are
/// display metadata carried through every processing stage untouched.
#[derive(Clone, PartialEq)]
pub struct Frame {
    size: FrameSize,
    data: Vec<u8>,
    scale: f32,
    orientation: Orientation,
}

impl Frame {
    /// Wrap a decoded buffer.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, DecodeError> {
        let size = FrameSize::new(width, height);
        let expected = size.pixel_count() * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(DecodeError::failed(format!(
                "{size} frame needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            size,
            data,
            scale: 1.0,
            orientation: Orientation::Up,
        })
    }

    /// A frame filled with one colour.
    pub fn filled(width: u32, height: u32, pixel: Pixel) -> Self {
        let size = FrameSize::new(width, height);
        let data = pixel.to_le_bytes().repeat(size.pixel_count());
        Self {
            size,
            data,
            scale: 1.0,
            orientation: Orientation::Up,
        }
    }

    /// An all-transparent frame with the same size and metadata as `self`.
    pub fn transparent_like(&self) -> Self {
        Self {
            size: self.size,
            data: vec![0; self.data.len()],
            scale: self.scale,
            orientation: self.orientation,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Bytes in one row.
    pub fn stride(&self) -> usize {
        self.size.width as usize * BYTES_PER_PIXEL
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the pixel bytes. The length is fixed.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Iterate every pixel in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
        self.data.chunks_exact(BYTES_PER_PIXEL).map(|chunk| {
            Pixel::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
        })
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("size", &self.size)
            .field("bytes", &self.data.len())
            .field("scale", &self.scale)
            .field("orientation", &self.orientation)
            .finish()
    }
}

/// The accumulating trail image.
///
/// Structurally a frame; the separate type keeps "a decoded sample" and
/// "the running result" from being mixed up at call sites.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeImage {
    frame: Frame,
}

impl CompositeImage {
    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn size(&self) -> FrameSize {
        self.frame.size()
    }

    pub fn as_frame(&self) -> &Frame {
        &self.frame
    }

    pub fn as_frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }
}

impl From<Frame> for CompositeImage {
    fn from(frame: Frame) -> Self {
        Self { frame }
    }
}

impl PartialEq<Frame> for CompositeImage {
    fn eq(&self, other: &Frame) -> bool {
        &self.frame == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = Frame::new(2, 2, vec![0; 15]).unwrap_err();
        assert!(err.to_string().contains("16 bytes"));
        assert!(Frame::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_filled_frame_pixels() {
        let frame = Frame::filled(3, 2, Pixel::RED);
        assert_eq!(frame.stride(), 12);
        assert_eq!(frame.pixels().count(), 6);
        assert!(frame.pixels().all(|p| p == Pixel::RED));
    }

    #[test]
    fn test_transparent_like_keeps_metadata() {
        let frame = Frame::filled(4, 4, Pixel::WHITE)
            .with_scale(2.0)
            .with_orientation(Orientation::Right);
        let blank = frame.transparent_like();
        assert_eq!(blank.size(), frame.size());
        assert_eq!(blank.scale(), 2.0);
        assert_eq!(blank.orientation(), Orientation::Right);
        assert!(blank.pixels().all(|p| p == Pixel::TRANSPARENT));
    }

    #[test]
    fn test_downscaled_size() {
        assert_eq!(
            FrameSize::new(1920, 1080).downscaled(2),
            FrameSize::new(960, 540)
        );
        assert_eq!(FrameSize::new(3, 3).downscaled(8), FrameSize::new(1, 1));
        assert_eq!(FrameSize::new(10, 10).downscaled(0), FrameSize::new(10, 10));
        assert!(FrameSize::default().downscaled(2).is_empty());
    }

    #[test]
    fn test_composite_compares_to_frame() {
        let frame = Frame::filled(1, 1, Pixel::BLUE);
        let composite = CompositeImage::from(frame.clone());
        assert_eq!(composite, frame);
    }
}
