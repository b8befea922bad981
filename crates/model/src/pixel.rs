//! Packed 32-bit pixel.
//!
//! A pixel is one `u32` word: red in bits 24..32, green in 16..24, blue in
//! 8..16 and alpha in 0..8. Frame buffers store each word little-endian, so
//! the bytes of one pixel appear in memory as `[a, b, g, r]`.
//! Components are premultiplied by alpha.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Bytes per stored pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// One premultiplied RGBA pixel packed into a 32-bit word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pixel(u32);

impl Pixel {
    pub const TRANSPARENT: Pixel = Pixel::new(0, 0, 0, 0);
    pub const RED: Pixel = Pixel::new(255, 0, 0, 255);
    pub const GREEN: Pixel = Pixel::new(0, 255, 0, 255);
    pub const BLUE: Pixel = Pixel::new(0, 0, 255, 255);
    pub const WHITE: Pixel = Pixel::new(255, 255, 255, 255);
    pub const BLACK: Pixel = Pixel::new(0, 0, 0, 255);
    pub const MAGENTA: Pixel = Pixel::new(255, 0, 255, 255);
    pub const YELLOW: Pixel = Pixel::new(255, 255, 0, 255);
    pub const CYAN: Pixel = Pixel::new(0, 255, 255, 255);

    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self(
            ((red as u32) << 24) | ((green as u32) << 16) | ((blue as u32) << 8) | (alpha as u32),
        )
    }

    /// Wrap a raw word.
    pub const fn from_word(word: u32) -> Self {
        Self(word)
    }

    /// The raw word.
    pub const fn word(self) -> u32 {
        self.0
    }

    pub const fn red(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn green(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn blue(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn alpha(self) -> u8 {
        self.0 as u8
    }

    /// Decode a pixel from its four stored bytes.
    pub fn from_le_bytes(bytes: [u8; BYTES_PER_PIXEL]) -> Self {
        Self(u32::from_le_bytes(bytes))
    }

    /// The four bytes this pixel occupies in a frame buffer.
    pub fn to_le_bytes(self) -> [u8; BYTES_PER_PIXEL] {
        self.0.to_le_bytes()
    }

    /// Components in `[r, g, b, a]` order, still premultiplied.
    pub fn to_rgba(self) -> [u8; 4] {
        [self.red(), self.green(), self.blue(), self.alpha()]
    }

    /// Straight (non-premultiplied) `[r, g, b, a]`, as PNG expects.
    pub fn to_straight_rgba(self) -> [u8; 4] {
        let a = self.alpha();
        match a {
            0 => [0, 0, 0, 0],
            255 => self.to_rgba(),
            _ => {
                let alpha = u32::from(a);
                let unpremul = |c: u8| ((u32::from(c) * 255 + alpha / 2) / alpha).min(255) as u8;
                [
                    unpremul(self.red()),
                    unpremul(self.green()),
                    unpremul(self.blue()),
                    a,
                ]
            }
        }
    }

    /// Build a premultiplied pixel from straight `[r, g, b, a]`.
    pub fn from_straight_rgba([r, g, b, a]: [u8; 4]) -> Self {
        let premul = |c: u8| ((u32::from(c) * u32::from(a) + 127) / 255) as u8;
        Self::new(premul(r), premul(g), premul(b), a)
    }
}

impl fmt::Debug for Pixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pixel(r={}, g={}, b={}, a={})",
            self.red(),
            self.green(),
            self.blue(),
            self.alpha()
        )
    }
}
