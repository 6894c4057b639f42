use std::borrow::Cow;

use nalgebra::Matrix3;
use serde::Deserialize;

use super::sampled::GridLevel;
use super::{finite_or_sentinel, CostFunction, LevelContext, SENTINEL_COST};
use crate::error::Result;
use crate::geometry::{image_corners, warp_points};
use crate::image::ImageF32;
use crate::resample::WarpedImage;
use crate::scattered::scattered_mutual_information;

/// Negative MI from the triangle-splatted joint histogram of samples taken
/// on a jittered grid.
///
/// A candidate whose warped sample-grid bounding box leaves the moving image
/// is rejected outright, so the search is confined to transforms that keep
/// the sampled region fully covered.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct OffGridMi {
    pub nbins: usize,
    /// Nominal grid spacing in full-resolution pixels.
    pub spacing: f64,
    /// Jitter as a fraction of the spacing, `[0, 1]`.
    pub jitter: f64,
    pub seed: u64,
    #[serde(skip)]
    level: Option<GridLevel>,
}

impl Default for OffGridMi {
    fn default() -> Self {
        Self {
            nbins: 16,
            spacing: 4.0,
            jitter: 0.5,
            seed: 0,
            level: None,
        }
    }
}

/// Whether the affine image of the grid's bounding box stays on `moving`.
fn warped_box_inside(prepared: &GridLevel, moving: &ImageF32, matrix: &Matrix3<f64>) -> bool {
    let Some(bbox) = prepared.grid.bounding_box() else {
        return false;
    };
    let [_, _, [x1, y1], _] = image_corners(moving.w, moving.h);
    warp_points(matrix, &bbox.corners())
        .iter()
        .all(|p| (0.0..=x1).contains(&p[0]) && (0.0..=y1).contains(&p[1]))
}

impl OffGridMi {
    fn prepared(&self, level: &LevelContext<'_>) -> Option<Cow<'_, GridLevel>> {
        match &self.level {
            Some(prepared) => Some(Cow::Borrowed(prepared)),
            None => {
                GridLevel::build(level, self.spacing, self.jitter, self.seed).map(Cow::Owned)
            }
        }
    }

    fn score_samples(&self, prepared: &GridLevel, moving: &[Option<f32>]) -> f64 {
        let valid: Vec<bool> = prepared
            .in_mask
            .iter()
            .zip(moving)
            .map(|(&ok, m)| ok && m.is_some())
            .collect();
        if !valid.iter().any(|&v| v) {
            return SENTINEL_COST;
        }
        let values: Vec<f32> = moving.iter().map(|m| m.unwrap_or(0.0)).collect();
        -scattered_mutual_information(
            &prepared.grid,
            &prepared.fixed_values,
            &values,
            &valid,
            self.nbins,
        )
    }
}

impl CostFunction for OffGridMi {
    fn name(&self) -> &'static str {
        "off_grid_mi"
    }

    fn bind_level(&mut self, level: &LevelContext<'_>) -> Result<()> {
        self.level = GridLevel::build(level, self.spacing, self.jitter, self.seed);
        if let Some(prepared) = &self.level {
            log::debug!(
                "OffGridMi level {}: {}x{} jittered samples",
                level.index,
                prepared.grid.cols,
                prepared.grid.rows
            );
        }
        Ok(())
    }

    fn score(&self, level: &LevelContext<'_>, warped: &WarpedImage) -> f64 {
        let Some(prepared) = self.prepared(level) else {
            return SENTINEL_COST;
        };
        self.score_samples(&prepared, &prepared.sample_warped(warped))
    }

    fn evaluate(&self, level: &LevelContext<'_>, matrix: &Matrix3<f64>) -> f64 {
        if matrix.iter().any(|v| !v.is_finite()) {
            return SENTINEL_COST;
        }
        let Some(prepared) = self.prepared(level) else {
            return SENTINEL_COST;
        };
        if !warped_box_inside(&prepared, level.moving, matrix) {
            return SENTINEL_COST;
        }
        let moving = prepared.sample_moving(level.moving, matrix);
        finite_or_sentinel(self.score_samples(&prepared, &moving))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::test_support::{context, pattern};
    use crate::geometry::build_transform;
    use crate::image::Mask;

    #[test]
    fn leaving_the_moving_image_is_rejected() {
        let img = pattern(40, 40);
        let mask = Mask::full(40, 40);
        let level = context(&img, &img, &mask);
        let mut cost = OffGridMi::default();
        cost.bind_level(&level).expect("bind");
        // the grid spans the whole image, so any shift pushes a corner out
        let shifted = cost.evaluate(&level, &build_transform(0.0, [1.5, 0.0], 1.0));
        assert_eq!(shifted, SENTINEL_COST);
    }

    #[test]
    fn identity_beats_interior_shift() {
        let img = pattern(48, 48);
        let mask = Mask::from_fn(48, 48, |x, y| (8..40).contains(&x) && (8..40).contains(&y));
        let level = context(&img, &img, &mask);
        let mut cost = OffGridMi {
            spacing: 2.0,
            ..OffGridMi::default()
        };
        cost.bind_level(&level).expect("bind");
        let at_identity = cost.evaluate(&level, &build_transform(0.0, [0.0, 0.0], 1.0));
        let shifted = cost.evaluate(&level, &build_transform(0.0, [3.0, -2.0], 1.0));
        assert!(at_identity.is_finite() && shifted.is_finite());
        assert!(at_identity < shifted, "{at_identity} >= {shifted}");
    }

    #[test]
    fn warped_bounding_box_decides_rejection() {
        let img = pattern(48, 48);
        let mask = Mask::from_fn(48, 48, |x, y| (8..40).contains(&x) && (8..40).contains(&y));
        let level = context(&img, &img, &mask);
        let mut cost = OffGridMi::default();
        cost.bind_level(&level).expect("bind");
        let prepared = cost.level.as_ref().expect("bound");
        let inside = build_transform(0.0, [4.0, -4.0], 1.0);
        assert!(warped_box_inside(prepared, &img, &inside));
        // 30° about the origin swings the far corner past the left edge
        let swung = build_transform(30f64.to_radians(), [0.0, 0.0], 1.0);
        assert!(!warped_box_inside(prepared, &img, &swung));
        assert_eq!(cost.evaluate(&level, &swung), SENTINEL_COST);
    }
}
