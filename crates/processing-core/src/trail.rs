//! The running ghost trail: clean, then layer, one frame at a time.

use ghosttrail_common::config::{AnalysisConfig, Backdrop};
use ghosttrail_model::frame::{CompositeImage, Frame};

use crate::cleaner::FrameCleaner;
use crate::compositor::combine;

/// Accumulates cleaned frames into a single composite.
#[derive(Debug, Clone)]
pub struct TrailAccumulator {
    cleaner: FrameCleaner,
    backdrop: Backdrop,
    composite: Option<CompositeImage>,
    frames_applied: usize,
}

impl TrailAccumulator {
    pub fn new(cleaner: FrameCleaner, backdrop: Backdrop) -> Self {
        Self {
            cleaner,
            backdrop,
            composite: None,
            frames_applied: 0,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(FrameCleaner::from_config(config), config.backdrop)
    }

    /// Clean `frame` and draw it over the trail.
    ///
    /// The first frame seeds the composite: cleaned for
    /// [`Backdrop::Transparent`], or as decoded (with its cleaned copy drawn
    /// on top) for [`Backdrop::FirstFrame`].
    pub fn apply(&mut self, frame: Frame) {
        let cleaned = self.cleaner.clean(&frame);
        let base = match (self.composite.take(), self.backdrop) {
            (Some(existing), _) => Some(existing),
            (None, Backdrop::FirstFrame) => Some(CompositeImage::from(frame)),
            (None, Backdrop::Transparent) => None,
        };
        self.composite = Some(combine(base, cleaned));
        self.frames_applied += 1;
    }

    pub fn composite(&self) -> Option<&CompositeImage> {
        self.composite.as_ref()
    }

    pub fn into_composite(self) -> Option<CompositeImage> {
        self.composite
    }

    /// Number of frames drawn so far.
    pub fn frames_applied(&self) -> usize {
        self.frames_applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghosttrail_model::pixel::Pixel;

    use crate::pixel_codec::{frame_grid, frame_grid_mut};

    fn subject_at(x: u32) -> Frame {
        let mut frame = Frame::filled(3, 1, Pixel::WHITE);
        frame_grid_mut(&mut frame).write(x, 0, Pixel::BLACK);
        frame
    }

    #[test]
    fn test_transparent_backdrop_shows_only_subjects() {
        let mut trail = TrailAccumulator::new(FrameCleaner::new(50), Backdrop::Transparent);
        trail.apply(subject_at(0));
        trail.apply(subject_at(1));

        assert_eq!(trail.frames_applied(), 2);
        let grid = frame_grid(trail.composite().unwrap().as_frame());
        assert_eq!(grid.read(0, 0), Pixel::BLACK);
        assert_eq!(grid.read(1, 0), Pixel::BLACK);
        assert_eq!(grid.read(2, 0), Pixel::TRANSPARENT);
    }

    #[test]
    fn test_first_frame_backdrop_keeps_scene() {
        let mut trail = TrailAccumulator::new(FrameCleaner::new(50), Backdrop::FirstFrame);
        trail.apply(subject_at(0));
        trail.apply(subject_at(2));

        let grid = frame_grid(trail.composite().unwrap().as_frame());
        assert_eq!(grid.read(0, 0), Pixel::BLACK);
        assert_eq!(grid.read(1, 0), Pixel::WHITE);
        assert_eq!(grid.read(2, 0), Pixel::BLACK);
    }

    #[test]
    fn test_from_config_uses_threshold() {
        let config = AnalysisConfig {
            background_threshold: 0,
            ..AnalysisConfig::default()
        };
        let mut trail = TrailAccumulator::from_config(&config);
        trail.apply(Frame::filled(2, 1, Pixel::new(1, 0, 0, 255)));
        assert!(trail
            .composite()
            .unwrap()
            .as_frame()
            .pixels()
            .all(|p| p == Pixel::TRANSPARENT));
    }
}
