//! Serializable record of an alignment run.
//!
//! [`AlignReport`] is returned alongside every successful alignment. It holds
//! the input geometry, the pyramids that were built, one [`LevelReport`] per
//! processed level (coarse → fine) and a timing breakdown. Everything
//! serializes to camelCase JSON for the demo tools.

pub mod pyramid;
pub mod timing;

use nalgebra::Matrix3;
use serde::Serialize;

use crate::geometry::TransformKind;
use crate::optimizer::LevelBounds;

pub use pyramid::{PyramidLevelReport, PyramidStage};
pub use timing::{StageTiming, TimingBreakdown};

/// Shapes and level counts of the inputs.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub fixed_width: usize,
    pub fixed_height: usize,
    pub moving_width: usize,
    pub moving_height: usize,
    pub mask_pixels: usize,
    /// Levels actually used, after degrading for small inputs or an empty
    /// coarse mask.
    pub pyramid_levels: usize,
    pub has_initial_transform: bool,
    pub corresponding_points: usize,
}

/// What happened on one pyramid level.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LevelReport {
    pub level_index: usize,
    pub width: usize,
    pub height: usize,
    pub bounds: LevelBounds,
    pub start_params: Vec<f64>,
    pub start_cost: f64,
    pub best_params: Vec<f64>,
    pub best_cost: f64,
    /// Cost of `best_params` scored on the full-resolution level.
    pub reference_cost: f64,
    /// False when the minimizer's answer scored worse than its start, on
    /// this level or at full resolution, and the start was kept.
    pub accepted: bool,
    pub evaluations: usize,
    pub trajectory_len: Option<usize>,
    pub elapsed_ms: f64,
}

/// Full record of an alignment run.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignReport {
    pub cost: &'static str,
    pub minimizer: &'static str,
    pub transform: TransformKind,
    pub input: InputDescriptor,
    pub pyramid: PyramidStage,
    pub levels: Vec<LevelReport>,
    pub final_matrix: Matrix3<f64>,
    /// Fixed pixels inside the mask that received a moving sample.
    pub final_overlap: usize,
    pub timings: TimingBreakdown,
}

impl AlignReport {
    /// Full-resolution cost after each level, coarse → fine.
    pub fn cost_history(&self) -> Vec<f64> {
        self.levels.iter().map(|l| l.reference_cost).collect()
    }

    pub fn total_evaluations(&self) -> usize {
        self.levels.iter().map(|l| l.evaluations).sum()
    }
}

impl std::fmt::Display for AlignReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} / {} / {} on {}x{} ({} levels, {:.1} ms)",
            self.transform.name(),
            self.cost,
            self.minimizer,
            self.input.fixed_width,
            self.input.fixed_height,
            self.input.pyramid_levels,
            self.timings.total_ms
        )?;
        for level in &self.levels {
            writeln!(
                f,
                "  L{} {}x{}: cost {:.5} -> {:.5} (full res {:.5}, {} evals{}) params {:?}",
                level.level_index,
                level.width,
                level.height,
                level.start_cost,
                level.best_cost,
                level.reference_cost,
                level.evaluations,
                if level.accepted { "" } else { ", kept start" },
                level.best_params
            )?;
        }
        Ok(())
    }
}
