//! The coarse-to-fine driver.
//!
//! Stages
//! - Setup: validate inputs, settle on a level count all three pyramids
//!   support, build the pyramids once and seed the parameter vector.
//! - Levels, coarsest first: bind the cost to the level, derive the search
//!   box, run the minimizer from the carried parameters, keep its answer
//!   only if it scores no worse than the start both on the level and on
//!   the full-resolution level, then lift the parameters (and any
//!   trajectory) to the next finer level.
//! - The cost history records the full-resolution cost after each level,
//!   so it never increases.
//! - Finish: warp the full-resolution moving image and fail if no masked
//!   pixel received data.

use std::time::Instant;

use log::{debug, warn};
use nalgebra::Matrix3;

use super::params::AlignParams;
use crate::cost::{CorrespondingPoints, CostConfig, CostFunction, LevelContext};
use crate::diagnostics::timing::elapsed_ms;
use crate::diagnostics::{AlignReport, InputDescriptor, LevelReport, PyramidStage, TimingBreakdown};
use crate::error::{AlignError, Result};
use crate::geometry::{check_invertible, params_to_matrix, AffineParams};
use crate::image::{ImageF32, Mask};
use crate::minimize::{cost_cmp, Minimizer, MinimizerConfig};
use crate::pyramid::{supported_levels, LevelScaling, Pyramid, PyramidOptions};
use crate::resample::warp_image;

/// Result of a successful alignment.
#[derive(Clone, Debug)]
pub struct AlignOutcome {
    /// Moving image resampled into the fixed frame (0 where it has no data).
    pub aligned: ImageF32,
    /// Pixels of `aligned` that received a moving sample.
    pub valid: Mask,
    /// Full-resolution fixed → moving matrix.
    pub matrix: Matrix3<f64>,
    pub params: AffineParams,
    /// Full-resolution cost after each level, coarse → fine.
    pub cost_history: Vec<f64>,
    pub report: AlignReport,
}

/// Pyramids and seed built by [`CoarseToFineOptimizer::setup`].
struct Prepared {
    fixed: Pyramid<ImageF32>,
    moving: Pyramid<ImageF32>,
    mask: Pyramid<Mask>,
    /// Full-resolution points, scaled per level on use.
    points: Option<CorrespondingPoints>,
    /// Full-resolution starting parameters.
    start: AffineParams,
    input: InputDescriptor,
    pyramid: PyramidStage,
    setup_ms: f64,
}

/// Multi-resolution affine registration driven by a pluggable cost and
/// minimizer.
///
/// ```no_run
/// use mi_affine::{AlignParams, CoarseToFineOptimizer, CostConfig, MinimizerConfig};
/// use mi_affine::image::ImageF32;
///
/// # fn example(moving: ImageF32, fixed: ImageF32) -> mi_affine::Result<()> {
/// let mut optimizer = CoarseToFineOptimizer::from_config(
///     AlignParams::default(),
///     CostConfig::default(),
///     MinimizerConfig::default(),
/// );
/// optimizer.setup(moving, fixed, None, None, None)?;
/// let outcome = optimizer.align()?;
/// println!("{}", outcome.report);
/// # Ok(())
/// # }
/// ```
pub struct CoarseToFineOptimizer {
    params: AlignParams,
    cost: Box<dyn CostFunction>,
    minimizer: Box<dyn Minimizer>,
    prepared: Option<Prepared>,
}

impl CoarseToFineOptimizer {
    pub fn new(params: AlignParams, cost: Box<dyn CostFunction>, minimizer: Box<dyn Minimizer>) -> Self {
        Self {
            params,
            cost,
            minimizer,
            prepared: None,
        }
    }

    pub fn from_config(params: AlignParams, cost: CostConfig, minimizer: MinimizerConfig) -> Self {
        Self::new(params, cost.build(), minimizer.build())
    }

    pub fn params(&self) -> &AlignParams {
        &self.params
    }

    pub fn is_set_up(&self) -> bool {
        self.prepared.is_some()
    }

    /// Pyramid levels in use after setup, 0 before.
    pub fn levels(&self) -> usize {
        self.prepared.as_ref().map_or(0, |p| p.fixed.len())
    }

    /// Validate inputs and build the pyramids.
    ///
    /// `mask` must match the fixed image's shape; `None` means every fixed
    /// pixel counts. `initial` is a full-resolution fixed → moving matrix
    /// whose rotation, translation and (for similarity) mean scale seed the
    /// search. A failed setup leaves the optimizer not set up.
    pub fn setup(
        &mut self,
        moving: ImageF32,
        fixed: ImageF32,
        mask: Option<Mask>,
        initial: Option<&Matrix3<f64>>,
        points: Option<CorrespondingPoints>,
    ) -> Result<()> {
        let setup_start = Instant::now();
        self.prepared = None;
        self.params.validate()?;
        for (name, img) in [("fixed", &fixed), ("moving", &moving)] {
            if img.w == 0 || img.h == 0 {
                return Err(AlignError::invalid_configuration(format!(
                    "{name} image is empty"
                )));
            }
        }

        let mask = match mask {
            Some(m) if (m.w, m.h) != (fixed.w, fixed.h) => {
                return Err(AlignError::ShapeMismatch {
                    expected: (fixed.w, fixed.h),
                    actual: (m.w, m.h),
                });
            }
            Some(m) => m,
            None => Mask::full(fixed.w, fixed.h),
        };
        let mask_pixels = mask.count();
        if mask_pixels == 0 {
            return Err(AlignError::EmptyMask);
        }

        let kind = self.params.transform;
        let start = match initial {
            Some(m) => {
                check_invertible(m)?;
                AffineParams::from_matrix(kind, m)
            }
            None => AffineParams::identity(kind),
        };

        let requested = self.params.pyramid.levels;
        let common = supported_levels(fixed.w, fixed.h, self.params.pyramid)
            .min(supported_levels(moving.w, moving.h, self.params.pyramid));
        if common < requested {
            warn!(
                "using {common} of {requested} pyramid levels for {}x{} fixed / {}x{} moving",
                fixed.w, fixed.h, moving.w, moving.h
            );
        }
        let options = PyramidOptions {
            levels: common,
            ..self.params.pyramid
        };

        let input = InputDescriptor {
            fixed_width: fixed.w,
            fixed_height: fixed.h,
            moving_width: moving.w,
            moving_height: moving.h,
            mask_pixels,
            pyramid_levels: 0,
            has_initial_transform: initial.is_some(),
            corresponding_points: points.as_ref().map_or(0, CorrespondingPoints::len),
        };

        let pyramid_start = Instant::now();
        let mut fixed = Pyramid::build(fixed, options);
        let mut moving = Pyramid::build(moving, options);
        let mut mask = Pyramid::build(mask, options);
        let mut levels = fixed.len().min(moving.len()).min(mask.len());
        while levels > 1 && mask.levels[levels - 1].count() == 0 {
            warn!(
                "mask has no foreground at level {}; dropping that level",
                levels - 1
            );
            levels -= 1;
        }
        fixed.levels.truncate(levels);
        moving.levels.truncate(levels);
        mask.levels.truncate(levels);
        let pyramid = PyramidStage::from_pyramids(
            &fixed,
            &moving,
            &mask,
            requested,
            elapsed_ms(pyramid_start),
        );

        if points.is_some() && !self.cost.uses_corresponding_points() {
            debug!(
                "{} does not read corresponding points; passing them through unused",
                self.cost.name()
            );
        }

        debug!(
            "setup: {} levels, {} mask pixels, start {:?}",
            levels, mask_pixels, start.values
        );
        self.prepared = Some(Prepared {
            fixed,
            moving,
            mask,
            points,
            start,
            input: InputDescriptor {
                pyramid_levels: levels,
                ..input
            },
            pyramid,
            setup_ms: elapsed_ms(setup_start),
        });
        Ok(())
    }

    /// Run the level loop and warp the moving image with the result.
    ///
    /// Can be called repeatedly after one setup; each call starts again from
    /// the seeded parameters.
    pub fn align(&mut self) -> Result<AlignOutcome> {
        let total_start = Instant::now();
        let Self {
            params,
            cost,
            minimizer,
            prepared,
        } = self;
        let prepared = prepared.as_ref().ok_or(AlignError::NotSetUp)?;
        let kind = params.transform;
        let n = prepared.fixed.len();
        let full = &prepared.fixed.levels[0];

        let mut timings = TimingBreakdown::default();
        timings.push("setup", prepared.setup_ms);
        timings.push("pyramid", prepared.pyramid.elapsed_ms);

        let interpolation = params.interpolation;
        let context = move |index: usize| {
            let fixed = &prepared.fixed.levels[index];
            LevelContext {
                index,
                fixed,
                moving: &prepared.moving.levels[index],
                mask: &prepared.mask.levels[index],
                scaling: LevelScaling::from_dimensions(fixed.w, fixed.h, full.w, full.h),
                interpolation,
                points: prepared
                    .points
                    .as_ref()
                    .map(|p| p.scaled(0.5f64.powi(index as i32))),
            }
        };
        // Level costs are not comparable across resolutions; every level's
        // outcome is also scored here so the history shares one scale.
        let reference = context(0);
        let reference_cost = |cost: &dyn CostFunction, values: &[f64], index: usize| {
            let lifted = AffineParams {
                kind,
                values: values.to_vec(),
            }
            .rescaled(2f64.powi(index as i32));
            cost.evaluate(&reference, &lifted.to_matrix())
        };

        cost.bind_level(&reference)?;
        let mut current_reference = reference_cost(&**cost, &prepared.start.values, 0);

        let mut x = prepared.start.rescaled(0.5f64.powi(n as i32 - 1));
        let mut trajectory: Option<Vec<Vec<f64>>> = None;
        let mut reports = Vec::with_capacity(n);
        let mut cost_history = Vec::with_capacity(n);

        for index in (0..n).rev() {
            let level_start = Instant::now();
            let level = context(index);
            let fixed = level.fixed;
            cost.bind_level(&level)?;

            let bounds = params.bounds.level_bounds(
                kind,
                fixed.w,
                fixed.h,
                &x.values,
                index + 1 == n,
                trajectory.as_deref(),
            );
            let search_box = bounds.to_bounds()?;

            let cost_fn: &dyn CostFunction = &**cost;
            let mut objective = |v: &[f64]| cost_fn.evaluate(&level, &params_to_matrix(kind, v));
            let start_cost = objective(&x.values);
            let result = minimizer.minimize(&mut objective, &x.values, Some(&search_box));

            let start_params = x.values.clone();
            let mut accepted = result.params.len() == x.values.len()
                && cost_cmp(result.cost, start_cost).is_le();
            if accepted {
                if index > 0 {
                    cost.bind_level(&reference)?;
                }
                let candidate = reference_cost(&**cost, &result.params, index);
                accepted = cost_cmp(candidate, current_reference).is_le();
                if accepted {
                    current_reference = candidate;
                }
            }
            let best_cost = if accepted {
                x.values = result.params;
                result.cost
            } else {
                start_cost
            };
            cost_history.push(current_reference);

            let level_ms = elapsed_ms(level_start);
            timings.push(format!("level {index}"), level_ms);
            debug!(
                "level {index} ({}x{}, {:?} bounds): cost {start_cost:.5} -> {best_cost:.5}, full res {current_reference:.5}, {} evals{}",
                fixed.w,
                fixed.h,
                bounds.source,
                result.evaluations,
                if accepted { "" } else { ", start kept" }
            );
            reports.push(LevelReport {
                level_index: index,
                width: fixed.w,
                height: fixed.h,
                bounds,
                start_params,
                start_cost,
                best_params: x.values.clone(),
                best_cost,
                reference_cost: current_reference,
                accepted,
                evaluations: result.evaluations,
                trajectory_len: result.trajectory.as_ref().map(Vec::len),
                elapsed_ms: level_ms,
            });

            if index > 0 {
                x = x.rescaled(2.0);
                trajectory = result
                    .trajectory
                    .map(|t| t.into_iter().map(lift_to_finer).collect());
            }
        }

        let matrix = x.to_matrix();
        check_invertible(&matrix)?;
        let warped = timings.measure("final warp", || {
            warp_image(
                &prepared.moving.levels[0],
                &matrix,
                full.w,
                full.h,
                params.interpolation,
            )
        });
        let overlap = warped.overlap_with(&prepared.mask.levels[0]);
        if overlap == 0 {
            return Err(AlignError::degenerate(
                "final transform maps every masked pixel outside the moving image",
            ));
        }
        timings.total_ms = prepared.setup_ms + elapsed_ms(total_start);

        let report = AlignReport {
            cost: cost.name(),
            minimizer: minimizer.name(),
            transform: kind,
            input: prepared.input.clone(),
            pyramid: prepared.pyramid.clone(),
            levels: reports,
            final_matrix: matrix,
            final_overlap: overlap,
            timings,
        };
        Ok(AlignOutcome {
            aligned: warped.image,
            valid: warped.valid,
            matrix,
            params: x,
            cost_history,
            report,
        })
    }

    /// `setup` followed by `align`.
    pub fn register(
        &mut self,
        moving: ImageF32,
        fixed: ImageF32,
        mask: Option<Mask>,
        initial: Option<&Matrix3<f64>>,
        points: Option<CorrespondingPoints>,
    ) -> Result<AlignOutcome> {
        self.setup(moving, fixed, mask, initial, points)?;
        self.align()
    }
}

/// Express a trajectory point in the next finer level's pixels.
fn lift_to_finer(mut point: Vec<f64>) -> Vec<f64> {
    for t in point.iter_mut().skip(1).take(2) {
        *t *= 2.0;
    }
    point
}

/// One-shot registration from serializable configuration.
pub fn register(
    params: AlignParams,
    cost: CostConfig,
    minimizer: MinimizerConfig,
    moving: ImageF32,
    fixed: ImageF32,
    mask: Option<Mask>,
) -> Result<AlignOutcome> {
    CoarseToFineOptimizer::from_config(params, cost, minimizer).register(moving, fixed, mask, None, None)
}
