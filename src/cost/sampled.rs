use std::borrow::Cow;

use nalgebra::{Matrix3, Vector3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

use super::{finite_or_sentinel, CostFunction, LevelContext, SENTINEL_COST};
use crate::error::Result;
use crate::histogram::mutual_information_from_samples;
use crate::image::ImageF32;
use crate::resample::WarpedImage;
use crate::scattered::{SampleBox, SampleGrid};

/// Minimum number of usable sample pairs before a score is trusted.
const MIN_PAIRS: usize = 16;

/// Negative MI from co-binning bilinear samples taken at a jittered point
/// set. The set is regenerated (deterministically from `seed`) per level.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SampledMi {
    pub nbins: usize,
    /// Nominal grid spacing in full-resolution pixels.
    pub spacing: f64,
    /// Jitter as a fraction of the spacing, `[0, 1]`.
    pub jitter: f64,
    pub seed: u64,
    #[serde(skip)]
    level: Option<GridLevel>,
}

impl Default for SampledMi {
    fn default() -> Self {
        Self {
            nbins: 32,
            spacing: 2.0,
            jitter: 0.8,
            seed: 0,
            level: None,
        }
    }
}

/// Jittered sample grid for one level with the fixed image sampled on it.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct GridLevel {
    pub grid: SampleGrid,
    pub fixed_values: Vec<f32>,
    pub in_mask: Vec<bool>,
}

impl GridLevel {
    /// Lay a jittered grid over the mask's bounding box and sample the fixed
    /// image on it. `None` for an empty mask.
    pub fn build(level: &LevelContext<'_>, spacing: f64, jitter: f64, seed: u64) -> Option<Self> {
        let bbox = SampleBox::from_mask(level.mask)?;
        let spacing = level.scaling.length_from_full(spacing).max(1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(level.index as u64));
        let grid = SampleGrid::jittered(bbox, spacing, jitter, &mut rng);
        let mut fixed_values = Vec::with_capacity(grid.len());
        let mut in_mask = Vec::with_capacity(grid.len());
        for p in &grid.points {
            let v = level.fixed.sample_bilinear(p[0], p[1]);
            let xi = (p[0].round() as usize).min(level.mask.w - 1);
            let yi = (p[1].round() as usize).min(level.mask.h - 1);
            fixed_values.push(v.unwrap_or(0.0));
            in_mask.push(v.is_some() && level.mask.is_set(xi, yi));
        }
        Some(Self {
            grid,
            fixed_values,
            in_mask,
        })
    }

    /// Sample `moving` at every grid point mapped through `matrix`.
    pub fn sample_moving(&self, moving: &ImageF32, matrix: &Matrix3<f64>) -> Vec<Option<f32>> {
        self.grid
            .points
            .iter()
            .map(|p| {
                let q = matrix * Vector3::new(p[0], p[1], 1.0);
                moving.sample_bilinear(q[0], q[1])
            })
            .collect()
    }

    /// Sample an already warped raster at the (fixed-frame) grid points.
    pub fn sample_warped(&self, warped: &WarpedImage) -> Vec<Option<f32>> {
        self.grid
            .points
            .iter()
            .map(|p| {
                let xi = (p[0].round() as usize).min(warped.valid.w.saturating_sub(1));
                let yi = (p[1].round() as usize).min(warped.valid.h.saturating_sub(1));
                if warped.valid.is_set(xi, yi) {
                    warped.image.sample_bilinear(p[0], p[1])
                } else {
                    None
                }
            })
            .collect()
    }
}

impl SampledMi {
    fn score_samples(&self, prepared: &GridLevel, moving: &[Option<f32>]) -> f64 {
        let mut fixed = Vec::with_capacity(moving.len());
        let mut warped = Vec::with_capacity(moving.len());
        for ((&f, &ok), m) in prepared.fixed_values.iter().zip(&prepared.in_mask).zip(moving) {
            if let (true, Some(m)) = (ok, m) {
                fixed.push(f);
                warped.push(*m);
            }
        }
        if fixed.len() < MIN_PAIRS {
            return SENTINEL_COST;
        }
        -mutual_information_from_samples(&fixed, &warped, self.nbins)
    }

    fn prepared(&self, level: &LevelContext<'_>) -> Option<Cow<'_, GridLevel>> {
        match &self.level {
            Some(prepared) => Some(Cow::Borrowed(prepared)),
            None => {
                GridLevel::build(level, self.spacing, self.jitter, self.seed).map(Cow::Owned)
            }
        }
    }
}

impl CostFunction for SampledMi {
    fn name(&self) -> &'static str {
        "sampled_mi"
    }

    fn bind_level(&mut self, level: &LevelContext<'_>) -> Result<()> {
        self.level = GridLevel::build(level, self.spacing, self.jitter, self.seed);
        Ok(())
    }

    fn score(&self, level: &LevelContext<'_>, warped: &WarpedImage) -> f64 {
        let Some(prepared) = self.prepared(level) else {
            return SENTINEL_COST;
        };
        self.score_samples(&prepared, &prepared.sample_warped(warped))
    }

    /// Samples the moving image directly at the mapped points, no raster warp.
    fn evaluate(&self, level: &LevelContext<'_>, matrix: &Matrix3<f64>) -> f64 {
        if matrix.iter().any(|v| !v.is_finite()) {
            return SENTINEL_COST;
        }
        let Some(prepared) = self.prepared(level) else {
            return SENTINEL_COST;
        };
        let moving = prepared.sample_moving(level.moving, matrix);
        finite_or_sentinel(self.score_samples(&prepared, &moving))
    }
}
