//! Source-over compositing of cleaned frames onto the trail.
//!
//! Buffers hold premultiplied components, so the over operator reduces to
//! `out = src + dst * (1 - src.a)` per channel, alpha included.

use ghosttrail_model::frame::{CompositeImage, Frame, FrameSize};
use ghosttrail_model::pixel::{Pixel, BYTES_PER_PIXEL};
use rayon::prelude::*;

/// Blend `src` over `dst`.
pub fn over(dst: Pixel, src: Pixel) -> Pixel {
    let sa = src.alpha();
    if sa == 255 {
        return src;
    }
    if sa == 0 && src.word() == 0 {
        return dst;
    }

    let inv = 255 - u16::from(sa);
    let channel = |s: u8, d: u8| s.saturating_add(mul_div255(u16::from(d), inv));
    Pixel::new(
        channel(src.red(), dst.red()),
        channel(src.green(), dst.green()),
        channel(src.blue(), dst.blue()),
        channel(sa, dst.alpha()),
    )
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Layer `overlay` on top of `base`.
///
/// With no base the overlay itself becomes the composite. Otherwise the
/// result has the overlay's size: the base is stretched to fit (nearest
/// neighbour) and the overlay drawn over it.
pub fn combine(base: Option<CompositeImage>, overlay: Frame) -> CompositeImage {
    let Some(mut base) = base else {
        return CompositeImage::from(overlay);
    };

    if base.size() != overlay.size() {
        tracing::debug!(
            base = %base.size(),
            overlay = %overlay.size(),
            "Resampling composite to overlay size"
        );
        base = CompositeImage::from(resample(base.as_frame(), &overlay));
    }

    blend_onto(&mut base, &overlay);
    base
}

/// Draw `overlay` over `composite` in place.
///
/// # Panics
///
/// If the two differ in size; use [`combine`] when they might.
pub fn blend_onto(composite: &mut CompositeImage, overlay: &Frame) {
    assert_eq!(
        composite.size(),
        overlay.size(),
        "blend_onto needs equally sized images"
    );

    let stride = overlay.stride();
    if stride == 0 || overlay.height() == 0 {
        return;
    }

    composite
        .as_frame_mut()
        .as_bytes_mut()
        .par_chunks_mut(stride)
        .zip(overlay.as_bytes().par_chunks(stride))
        .for_each(|(dst_row, src_row)| {
            for (d, s) in dst_row
                .chunks_exact_mut(BYTES_PER_PIXEL)
                .zip(src_row.chunks_exact(BYTES_PER_PIXEL))
            {
                let src = Pixel::from_le_bytes([s[0], s[1], s[2], s[3]]);
                let dst = Pixel::from_le_bytes([d[0], d[1], d[2], d[3]]);
                d.copy_from_slice(&over(dst, src).to_le_bytes());
            }
        });
}

/// Stretch `source` to `target`'s size, taking `target`'s display metadata.
fn resample(source: &Frame, target: &Frame) -> Frame {
    let mut out = target.transparent_like();
    let FrameSize { width, height } = target.size();
    let src_size = source.size();
    if src_size.is_empty() {
        return out;
    }

    let src_stride = source.stride();
    let dst_stride = out.stride();
    let src = source.as_bytes();
    let dst = out.as_bytes_mut();

    for y in 0..height as usize {
        let sy = y * src_size.height as usize / height as usize;
        for x in 0..width as usize {
            let sx = x * src_size.width as usize / width as usize;
            let from = sy * src_stride + sx * BYTES_PER_PIXEL;
            let to = y * dst_stride + x * BYTES_PER_PIXEL;
            dst[to..to + BYTES_PER_PIXEL].copy_from_slice(&src[from..from + BYTES_PER_PIXEL]);
        }
    }
    out
}
