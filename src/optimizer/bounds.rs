//! Per-level search boxes.
//!
//! Every level gets a resolution box derived from its size: rotation over
//! the full circle on the coarsest level (a narrower window around the
//! carried rotation on finer ones), translation within a fraction of the
//! level width/height and scale within a fixed range. When the previous
//! level's minimizer reported a trajectory, the box shrinks to the
//! trajectory's per-axis extent plus a margin, clipped to the resolution box.
//! The starting point is always inside the returned box.
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{AlignError, Result};
use crate::geometry::TransformKind;
use crate::minimize::Bounds;

/// Knobs of the bound schedule. Translations are in level pixels.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct BoundsPolicy {
    /// Half-width of the rotation range on the coarsest level (radians).
    pub rotation_range: f64,
    /// Half-width of the translation range as a fraction of the level size.
    pub translation_fraction: f64,
    /// Allowed isotropic scale, similarity transforms only.
    pub scale_range: (f64, f64),
    /// Half-width of the rotation window around the carried rotation on finer
    /// levels without a trajectory.
    pub fine_rotation_range: f64,
    /// Margin added on each side of a trajectory extent, as a fraction of it.
    pub margin_fraction: f64,
    pub min_rotation_margin: f64,
    pub min_translation_margin: f64,
    pub min_scale_margin: f64,
    /// Narrow bounds from minimizer trajectories when they are reported.
    pub use_trajectory: bool,
}

impl Default for BoundsPolicy {
    fn default() -> Self {
        Self {
            rotation_range: PI,
            translation_fraction: 0.5,
            scale_range: (0.5, 2.0),
            fine_rotation_range: PI / 8.0,
            margin_fraction: 0.1,
            min_rotation_margin: 0.01,
            min_translation_margin: 1.0,
            min_scale_margin: 0.01,
            use_trajectory: true,
        }
    }
}

/// Where a level's box came from.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoundsSource {
    Resolution,
    Trajectory,
}

/// Search box for one level, as reported in diagnostics.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LevelBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub source: BoundsSource,
}

impl LevelBounds {
    pub fn to_bounds(&self) -> Result<Bounds> {
        Bounds::new(self.lower.clone(), self.upper.clone())
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(&v, (&lo, &hi))| v >= lo && v <= hi)
    }
}

impl BoundsPolicy {
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(AlignError::invalid_configuration(format!(
                    "bounds.{name} must be positive, got {v}"
                )))
            }
        };
        positive("rotation_range", self.rotation_range)?;
        positive("translation_fraction", self.translation_fraction)?;
        positive("fine_rotation_range", self.fine_rotation_range)?;
        let (lo, hi) = self.scale_range;
        if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi) {
            return Err(AlignError::invalid_configuration(format!(
                "bounds.scale_range must satisfy 0 < lo <= hi, got ({lo}, {hi})"
            )));
        }
        let margins = [
            self.margin_fraction,
            self.min_rotation_margin,
            self.min_translation_margin,
            self.min_scale_margin,
        ];
        if margins.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(AlignError::invalid_configuration(
                "bounds margins must be finite and non-negative",
            ));
        }
        Ok(())
    }

    /// Widest box a `w × h` level may search.
    fn resolution_box(&self, kind: TransformKind, w: usize, h: usize) -> (Vec<f64>, Vec<f64>) {
        let tx = self.translation_fraction * w as f64;
        let ty = self.translation_fraction * h as f64;
        let mut lower = vec![-self.rotation_range, -tx, -ty];
        let mut upper = vec![self.rotation_range, tx, ty];
        if kind == TransformKind::Similarity {
            lower.push(self.scale_range.0);
            upper.push(self.scale_range.1);
        }
        (lower, upper)
    }

    fn min_margin(&self, axis: usize) -> f64 {
        match axis {
            0 => self.min_rotation_margin,
            1 | 2 => self.min_translation_margin,
            _ => self.min_scale_margin,
        }
    }

    /// Trajectory extent plus margins, clipped to the resolution box. `None`
    /// when no finite point remains or the clipped box is empty.
    fn trajectory_box(
        &self,
        trajectory: &[Vec<f64>],
        lower: &[f64],
        upper: &[f64],
    ) -> Option<(Vec<f64>, Vec<f64>)> {
        let dim = lower.len();
        let points: Vec<&Vec<f64>> = trajectory
            .iter()
            .filter(|p| p.len() == dim && p.iter().all(|v| v.is_finite()))
            .collect();
        if points.is_empty() {
            return None;
        }
        let mut lo = vec![f64::INFINITY; dim];
        let mut hi = vec![f64::NEG_INFINITY; dim];
        for p in &points {
            for (i, &v) in p.iter().enumerate() {
                lo[i] = lo[i].min(v);
                hi[i] = hi[i].max(v);
            }
        }
        for i in 0..dim {
            let margin = (self.margin_fraction * (hi[i] - lo[i])).max(self.min_margin(i));
            lo[i] = (lo[i] - margin).max(lower[i]);
            hi[i] = (hi[i] + margin).min(upper[i]);
            if lo[i] > hi[i] {
                return None;
            }
        }
        Some((lo, hi))
    }

    /// Box for a level of size `w × h` starting from `x0`.
    ///
    /// `trajectory` must already be expressed in this level's units.
    pub fn level_bounds(
        &self,
        kind: TransformKind,
        w: usize,
        h: usize,
        x0: &[f64],
        coarsest: bool,
        trajectory: Option<&[Vec<f64>]>,
    ) -> LevelBounds {
        let (res_lower, res_upper) = self.resolution_box(kind, w, h);
        let narrowed = trajectory
            .filter(|_| self.use_trajectory && !coarsest)
            .and_then(|t| self.trajectory_box(t, &res_lower, &res_upper));

        let (mut lower, mut upper, source) = match narrowed {
            Some((lo, hi)) => (lo, hi, BoundsSource::Trajectory),
            None => {
                let (mut lo, mut hi) = (res_lower, res_upper);
                if !coarsest {
                    let theta = x0.first().copied().unwrap_or(0.0);
                    lo[0] = theta - self.fine_rotation_range;
                    hi[0] = theta + self.fine_rotation_range;
                }
                (lo, hi, BoundsSource::Resolution)
            }
        };
        for (i, &v) in x0.iter().enumerate().take(lower.len()) {
            if v.is_finite() {
                lower[i] = lower[i].min(v);
                upper[i] = upper[i].max(v);
            }
        }
        LevelBounds {
            lower,
            upper,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarsest_level_spans_full_circle() {
        let policy = BoundsPolicy::default();
        let b = policy.level_bounds(TransformKind::Similarity, 32, 16, &[0.0, 0.0, 0.0, 1.0], true, None);
        assert_eq!(b.source, BoundsSource::Resolution);
        assert_eq!(b.lower, vec![-PI, -16.0, -8.0, 0.5]);
        assert_eq!(b.upper, vec![PI, 16.0, 8.0, 2.0]);
    }

    #[test]
    fn trajectory_narrows_inside_resolution_box() {
        let policy = BoundsPolicy::default();
        let trajectory = vec![vec![0.10, 2.0, 1.0], vec![0.20, 4.0, 1.5], vec![0.15, 3.0, 30.0]];
        let x0 = [0.18, 3.5, 1.2];
        let b = policy.level_bounds(TransformKind::Euclidean, 64, 64, &x0, false, Some(trajectory.as_slice()));
        assert_eq!(b.source, BoundsSource::Trajectory);
        // ty extent 1..30 plus margin is clipped at 0.5·64
        assert_eq!(b.upper[2], 32.0);
        assert!((b.lower[0] - 0.09).abs() < 1e-12);
        assert!((b.lower[1] - 1.0).abs() < 1e-12);
        assert!(b.contains(&x0));
        let res = policy.level_bounds(TransformKind::Euclidean, 64, 64, &x0, false, None);
        for i in 1..3 {
            assert!(b.lower[i] >= res.lower[i] && b.upper[i] <= res.upper[i]);
        }
    }

    #[test]
    fn finer_level_without_trajectory_falls_back() {
        let policy = BoundsPolicy::default();
        let x0 = [0.5, 70.0, 0.0];
        let b = policy.level_bounds(TransformKind::Euclidean, 64, 64, &x0, false, None);
        assert_eq!(b.source, BoundsSource::Resolution);
        assert!((b.lower[0] - (0.5 - PI / 8.0)).abs() < 1e-12);
        // the start point widens the box rather than being clipped
        assert_eq!(b.upper[1], 70.0);
        assert!(b.contains(&x0));
    }

    #[test]
    fn unusable_trajectory_is_ignored() {
        let policy = BoundsPolicy::default();
        let trajectory = vec![vec![f64::NAN, 0.0, 0.0], vec![0.0, 0.0]];
        let b = policy.level_bounds(TransformKind::Euclidean, 16, 16, &[0.0; 3], false, Some(trajectory.as_slice()));
        assert_eq!(b.source, BoundsSource::Resolution);
        let disabled = BoundsPolicy {
            use_trajectory: false,
            ..BoundsPolicy::default()
        };
        let b = disabled.level_bounds(TransformKind::Euclidean, 16, 16, &[0.0; 3], false, Some(&[vec![0.0; 3]][..]));
        assert_eq!(b.source, BoundsSource::Resolution);
    }

    #[test]
    fn validate_rejects_bad_scale_range() {
        let bad = BoundsPolicy {
            scale_range: (2.0, 1.0),
            ..BoundsPolicy::default()
        };
        assert!(bad.validate().is_err());
        assert!(BoundsPolicy::default().validate().is_ok());
    }
}
