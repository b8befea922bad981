//! Coordinate-addressed pixel access over a frame buffer.

use ghosttrail_model::frame::Frame;
use ghosttrail_model::pixel::{Pixel, BYTES_PER_PIXEL};

/// A `width x height` view of row-major packed pixels.
///
/// Reads and writes take `(x, y)` and panic when the coordinate is outside
/// the grid; an out-of-range access is a caller bug, not a runtime
/// condition.
#[derive(Debug)]
pub struct PixelGrid<B> {
    width: u32,
    height: u32,
    buf: B,
}

impl<B: AsRef<[u8]>> PixelGrid<B> {
    /// Wrap a buffer.
    ///
    /// # Panics
    ///
    /// If `buf` is not exactly `width * height` pixels long.
    pub fn new(width: u32, height: u32, buf: B) -> Self {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        assert_eq!(
            buf.as_ref().len(),
            expected,
            "buffer length does not match {width}x{height}"
        );
        Self { width, height, buf }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} grid",
            self.width,
            self.height
        );
        (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL
    }

    pub fn read(&self, x: u32, y: u32) -> Pixel {
        let at = self.offset(x, y);
        let b = &self.buf.as_ref()[at..at + BYTES_PER_PIXEL];
        Pixel::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    /// Exact word comparison without decoding components.
    pub fn matches(&self, x: u32, y: u32, pixel: Pixel) -> bool {
        self.read(x, y) == pixel
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> PixelGrid<B> {
    pub fn write(&mut self, x: u32, y: u32, pixel: Pixel) {
        let at = self.offset(x, y);
        self.buf.as_mut()[at..at + BYTES_PER_PIXEL].copy_from_slice(&pixel.to_le_bytes());
    }
}

/// Read-only grid over a frame.
pub fn frame_grid(frame: &Frame) -> PixelGrid<&[u8]> {
    PixelGrid::new(frame.width(), frame.height(), frame.as_bytes())
}

/// Writable grid over a frame.
pub fn frame_grid_mut(frame: &mut Frame) -> PixelGrid<&mut [u8]> {
    let (width, height) = (frame.width(), frame.height());
    PixelGrid::new(width, height, frame.as_bytes_mut())
}

/// Background predicate: any colour channel above `threshold`.
///
/// Alpha is ignored. A channel equal to `threshold` does not count.
#[inline]
pub fn is_background(pixel: Pixel, threshold: u8) -> bool {
    pixel.red() > threshold || pixel.green() > threshold || pixel.blue() > threshold
}
