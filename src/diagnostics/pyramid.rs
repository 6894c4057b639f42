use crate::image::{ImageF32, Mask};
use crate::pyramid::Pyramid;
use serde::Serialize;

/// Geometry and content statistics for one pyramid level.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PyramidLevelReport {
    pub level_index: usize,
    pub width: usize,
    pub height: usize,
    pub fixed_mean: f32,
    pub moving_mean: f32,
    /// Fraction of the level covered by the mask, `[0, 1]`.
    pub mask_coverage: f64,
}

/// The three pyramids as the driver built them.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PyramidStage {
    pub elapsed_ms: f64,
    /// Level count requested through the pyramid options.
    pub requested_levels: usize,
    pub levels: Vec<PyramidLevelReport>,
}

impl PyramidStage {
    pub fn from_pyramids(
        fixed: &Pyramid<ImageF32>,
        moving: &Pyramid<ImageF32>,
        mask: &Pyramid<Mask>,
        requested_levels: usize,
        elapsed_ms: f64,
    ) -> Self {
        let levels = fixed
            .levels
            .iter()
            .zip(&moving.levels)
            .zip(&mask.levels)
            .enumerate()
            .map(|(level_index, ((f, m), k))| PyramidLevelReport {
                level_index,
                width: f.w,
                height: f.h,
                fixed_mean: f.mean(),
                moving_mean: m.mean(),
                mask_coverage: k.count() as f64 / (k.w * k.h).max(1) as f64,
            })
            .collect();
        Self {
            elapsed_ms,
            requested_levels,
            levels,
        }
    }
}
