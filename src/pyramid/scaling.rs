//! Cross-level scaling helpers.
//!
//! - Converts full-resolution lengths (patch radii, sample spacings) into the
//!   current level's pixels so neighbourhood sizes stay proportionate.

/// Per-level scaling factors between a pyramid level and the full-resolution image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LevelScaling {
    pub scale_x_to_full: f64,
    pub scale_y_to_full: f64,
    pub mean_scale_from_full: f64,
}

impl LevelScaling {
    /// Factors for a `level_width × level_height` level of a
    /// `full_width × full_height` image. Zero-sized inputs read as scale 1.
    pub fn from_dimensions(
        level_width: usize,
        level_height: usize,
        full_width: usize,
        full_height: usize,
    ) -> Self {
        let ratio = |full: usize, level: usize| {
            if level == 0 || full == 0 {
                1.0
            } else {
                full as f64 / level as f64
            }
        };
        let scale_x_to_full = ratio(full_width, level_width);
        let scale_y_to_full = ratio(full_height, level_height);
        Self {
            scale_x_to_full,
            scale_y_to_full,
            mean_scale_from_full: 2.0 / (scale_x_to_full + scale_y_to_full),
        }
    }

    pub fn identity() -> Self {
        Self {
            scale_x_to_full: 1.0,
            scale_y_to_full: 1.0,
            mean_scale_from_full: 1.0,
        }
    }

    /// Express a full-resolution length in level pixels.
    #[inline]
    pub fn length_from_full(&self, full_px: f64) -> f64 {
        full_px * self.mean_scale_from_full
    }

    /// Integer radius at this level, never below `min`.
    #[inline]
    pub fn radius_from_full(&self, full_radius: usize, min: usize) -> usize {
        (self.length_from_full(full_radius as f64).round() as usize).max(min)
    }
}
