//! PNG export.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageFormat};

use ghosttrail_common::error::{GhostTrailError, GhostTrailResult};
use ghosttrail_model::frame::{CompositeImage, Frame};
use ghosttrail_model::pixel::Pixel;

/// Straight-alpha RGBA8 bytes of `composite`, row by row.
pub fn to_straight_rgba(composite: &CompositeImage) -> Vec<u8> {
    composite
        .as_frame()
        .pixels()
        .flat_map(Pixel::to_straight_rgba)
        .collect()
}

/// Encode `composite` as PNG.
pub fn encode_png(composite: &CompositeImage) -> GhostTrailResult<Vec<u8>> {
    let size = composite.size();
    if size.is_empty() {
        return Err(GhostTrailError::encoding(format!(
            "cannot encode a {size} image"
        )));
    }

    let rgba = to_straight_rgba(composite);
    let mut png_bytes = Vec::new();
    PngEncoder::new(&mut png_bytes)
        .write_image(&rgba, size.width, size.height, ExtendedColorType::Rgba8)
        .map_err(|e| GhostTrailError::encoding(e.to_string()))?;

    tracing::debug!(%size, bytes = png_bytes.len(), "Encoded composite as PNG");
    Ok(png_bytes)
}

/// Write `composite` to `path` as PNG, creating parent directories.
///
/// The file is written next to its destination and renamed into place, so
/// readers never see a partial image. Returns the path written.
pub fn export_png(composite: &CompositeImage, path: &Path) -> GhostTrailResult<PathBuf> {
    let png_bytes = encode_png(composite)?;
    let io_err = |e: std::io::Error| {
        GhostTrailError::encoding(format!("failed to write {}: {e}", path.display()))
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let staging = staging_path(path);
    let written = fs::File::create(&staging)
        .and_then(|mut file| {
            file.write_all(&png_bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&staging, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&staging);
        return Err(io_err(e));
    }

    tracing::info!(path = %path.display(), size = %composite.size(), "Exported composite");
    Ok(path.to_path_buf())
}

/// Read a PNG back into a composite.
pub fn decode_png(bytes: &[u8]) -> GhostTrailResult<CompositeImage> {
    let rgba = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| GhostTrailError::decode(e.to_string()))?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    let data = rgba
        .pixels()
        .flat_map(|p| Pixel::from_straight_rgba(p.0).to_le_bytes())
        .collect();
    Ok(CompositeImage::from(Frame::new(width, height, data)?))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "composite.png".into());
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghosttrail_model::frame::FrameSize;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("ghosttrail-render-{}", std::process::id()))
            .join(name)
    }

    fn sample() -> CompositeImage {
        let mut frame = Frame::filled(3, 2, Pixel::TRANSPARENT);
        frame.as_bytes_mut()[..4].copy_from_slice(&Pixel::RED.to_le_bytes());
        frame.as_bytes_mut()[20..24].copy_from_slice(&Pixel::new(64, 0, 0, 128).to_le_bytes());
        CompositeImage::from(frame)
    }

    #[test]
    fn test_straight_rgba_unpremultiplies() {
        let rgba = to_straight_rgba(&sample());
        assert_eq!(&rgba[..4], &[255, 0, 0, 255]);
        assert_eq!(&rgba[4..8], &[0, 0, 0, 0]);
        assert_eq!(rgba[20], 128);
        assert_eq!(rgba[23], 128);
    }

    #[test]
    fn test_png_round_trip_keeps_pixels() {
        let composite = sample();
        let bytes = encode_png(&composite).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");

        let decoded = decode_png(&bytes).unwrap();
        assert_eq!(decoded.size(), FrameSize::new(3, 2));
        assert_eq!(decoded.as_frame().pixels().next(), Some(Pixel::RED));
        assert_eq!(decoded.as_frame().pixels().nth(1), Some(Pixel::TRANSPARENT));
    }

    #[test]
    fn test_empty_composite_is_encoding_error() {
        let empty = CompositeImage::from(Frame::filled(0, 0, Pixel::TRANSPARENT));
        assert!(matches!(
            encode_png(&empty),
            Err(GhostTrailError::Encoding { .. })
        ));
    }

    #[test]
    fn test_export_creates_parents_and_leaves_no_staging_file() {
        let path = temp_path("nested/trail.png");
        let _ = fs::remove_file(&path);

        let written = export_png(&sample(), &path).unwrap();
        assert_eq!(written, path);
        assert!(path.exists());
        assert!(!staging_path(&path).exists());

        let decoded = decode_png(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(decoded.size(), FrameSize::new(3, 2));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_export_into_a_file_fails_with_encoding_error() {
        let blocker = temp_path("blocker");
        fs::create_dir_all(blocker.parent().unwrap()).unwrap();
        fs::write(&blocker, b"not a directory").unwrap();

        let err = export_png(&sample(), &blocker.join("trail.png")).unwrap_err();
        assert!(matches!(err, GhostTrailError::Encoding { .. }));
        let _ = fs::remove_file(&blocker);
    }
}
