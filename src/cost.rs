//! Similarity costs minimised by the coarse-to-fine driver.
//!
//! Overview
//! - A [`CostFunction`] turns a candidate fixed → moving matrix into a
//!   scalar; lower is better, so MI-style metrics are negated.
//! - [`CostFunction::bind_level`] runs once per pyramid level and may cache
//!   level-dependent state (patch radii, sample grids, bin-normalised fixed
//!   image). Afterwards evaluation takes `&self` and has no side effects.
//! - [`CostFunction::evaluate`] warps the moving level and guards against
//!   nonsense: non-finite matrices, warps with no valid pixel under the mask
//!   and non-finite scores all return [`SENTINEL_COST`].
//!
//! Variants
//! - [`GlobalMi`]: binned MI over the mask.
//! - [`RegionMi`]: mean region MI over windows tiling the mask.
//! - [`KnnMi`]: nearest-neighbour MI over (optionally strided) masked pixels.
//! - [`Displacement`]: mean optical-flow magnitude left after warping.
//! - [`OffGridMi`]: triangle-splatted joint histogram on a jittered grid.
//! - [`SampledMi`]: direct co-binning of bilinear samples on a jittered grid.
pub mod displacement;
pub mod global;
pub mod knn;
pub mod offgrid;
pub mod region;
pub mod sampled;

use nalgebra::Matrix3;
use serde::Deserialize;

use crate::error::Result;
use crate::image::{ImageF32, Mask};
use crate::pyramid::LevelScaling;
use crate::resample::{warp_image, Interpolation, WarpedImage};

pub use displacement::Displacement;
pub use global::GlobalMi;
pub use knn::KnnMi;
pub use offgrid::OffGridMi;
pub use region::RegionMi;
pub use sampled::SampledMi;

/// Cost reported for parameters that cannot be scored. Minimizers treat it
/// as "worse than anything finite".
pub const SENTINEL_COST: f64 = f64::INFINITY;

/// Matched landmarks, moving-frame and fixed-frame, in the same order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CorrespondingPoints {
    pub moving: Vec<[f64; 2]>,
    pub fixed: Vec<[f64; 2]>,
}

impl CorrespondingPoints {
    pub fn len(&self) -> usize {
        self.moving.len().min(self.fixed.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Same points expressed in a level whose pixels are `factor` times larger.
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |pts: &[[f64; 2]]| -> Vec<[f64; 2]> {
            pts.iter().map(|p| [p[0] * factor, p[1] * factor]).collect()
        };
        Self {
            moving: scale(&self.moving),
            fixed: scale(&self.fixed),
        }
    }
}

/// Everything a cost needs to know about the current pyramid level.
#[derive(Clone, Debug)]
pub struct LevelContext<'a> {
    /// Pyramid index, 0 = full resolution.
    pub index: usize,
    pub fixed: &'a ImageF32,
    pub moving: &'a ImageF32,
    pub mask: &'a Mask,
    pub scaling: LevelScaling,
    pub interpolation: Interpolation,
    /// Corresponding points in this level's pixels, when supplied.
    pub points: Option<CorrespondingPoints>,
}

impl LevelContext<'_> {
    /// Warp this level's moving image into the fixed frame.
    pub fn warp(&self, matrix: &Matrix3<f64>) -> WarpedImage {
        warp_image(
            self.moving,
            matrix,
            self.fixed.w,
            self.fixed.h,
            self.interpolation,
        )
    }
}

/// Strategy interface shared by all similarity costs.
pub trait CostFunction: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the cost reads [`LevelContext::points`].
    fn uses_corresponding_points(&self) -> bool {
        false
    }

    /// Prepare level-dependent state before the minimizer runs on `level`.
    fn bind_level(&mut self, _level: &LevelContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Score an already warped moving image against the level's fixed image.
    fn score(&self, level: &LevelContext<'_>, warped: &WarpedImage) -> f64;

    /// Warp, guard and score one candidate matrix.
    fn evaluate(&self, level: &LevelContext<'_>, matrix: &Matrix3<f64>) -> f64 {
        if matrix.iter().any(|v| !v.is_finite()) {
            return SENTINEL_COST;
        }
        let warped = level.warp(matrix);
        if warped.is_degenerate(level.mask) {
            return SENTINEL_COST;
        }
        finite_or_sentinel(self.score(level, &warped))
    }
}

#[inline]
pub(crate) fn finite_or_sentinel(cost: f64) -> f64 {
    if cost.is_finite() {
        cost
    } else {
        SENTINEL_COST
    }
}

/// Serializable choice of cost function.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CostConfig {
    GlobalMi(GlobalMi),
    RegionMi(RegionMi),
    KnnMi(KnnMi),
    Displacement(Displacement),
    OffGridMi(OffGridMi),
    SampledMi(SampledMi),
}

impl Default for CostConfig {
    fn default() -> Self {
        CostConfig::GlobalMi(GlobalMi::default())
    }
}

impl CostConfig {
    pub fn build(self) -> Box<dyn CostFunction> {
        match self {
            CostConfig::GlobalMi(c) => Box::new(c),
            CostConfig::RegionMi(c) => Box::new(c),
            CostConfig::KnnMi(c) => Box::new(c),
            CostConfig::Displacement(c) => Box::new(c),
            CostConfig::OffGridMi(c) => Box::new(c),
            CostConfig::SampledMi(c) => Box::new(c),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::geometry::build_transform;

    #[test]
    fn nan_matrix_returns_sentinel() {
        let img = pattern(32, 32);
        let mask = Mask::full(32, 32);
        let level = context(&img, &img, &mask);
        let cost = GlobalMi::default();
        let mut m = Matrix3::identity();
        m[(0, 2)] = f64::NAN;
        assert_eq!(cost.evaluate(&level, &m), SENTINEL_COST);
    }

    #[test]
    fn off_image_warp_returns_sentinel() {
        let img = pattern(32, 32);
        let mask = Mask::full(32, 32);
        let level = context(&img, &img, &mask);
        let cost = GlobalMi::default();
        let far = build_transform(0.0, [500.0, 0.0], 1.0);
        assert_eq!(cost.evaluate(&level, &far), SENTINEL_COST);
    }

    #[test]
    fn config_deserializes_tagged_variants() {
        let cfg: CostConfig = serde_json::from_str(r#"{"type": "region_mi", "radius": 2}"#).expect("json");
        match cfg {
            CostConfig::RegionMi(r) => {
                assert_eq!(r.radius, 2);
                assert_eq!(r.nbins, RegionMi::default().nbins);
            }
            other => panic!("unexpected {other:?}"),
        }
        let cfg: CostConfig = serde_json::from_str(r#"{"type": "off_grid_mi", "seed": 9}"#).expect("json");
        assert_eq!(cfg.build().name(), "off_grid_mi");
    }

    #[test]
    fn points_scale_with_level() {
        let pts = CorrespondingPoints {
            moving: vec![[4.0, 8.0]],
            fixed: vec![[2.0, 6.0]],
        };
        let half = pts.scaled(0.5);
        assert_eq!(half.moving, vec![[2.0, 4.0]]);
        assert_eq!(half.fixed, vec![[1.0, 3.0]]);
        assert_eq!(half.len(), 1);
    }
}
