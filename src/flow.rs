//! Sparse optical flow reduced to one scalar: the mean displacement magnitude.
//!
//! The displacement cost only needs "how far does the warped moving image
//! still have to move to match the fixed one", so estimators are hidden behind
//! [`FlowEstimator`] and callers never see per-point vectors.
//!
//! [`LucasKanadeFlow`] tracks points of a regular grid (restricted to the
//! mask) with windowed Gauss–Newton iterations on bilinearly sampled
//! intensities. Points whose structure tensor is near-singular or whose
//! minimum eigenvalue is below threshold are dropped.
use serde::Deserialize;

use crate::image::{ImageF32, Mask};

/// Scalar optical-flow oracle.
pub trait FlowEstimator: Send + Sync {
    /// Mean displacement magnitude (level pixels) that moves `reference`
    /// onto `target`, sampled where `mask` is set. `None` when no point could
    /// be tracked.
    fn mean_displacement(&self, reference: &ImageF32, target: &ImageF32, mask: &Mask) -> Option<f64>;
}

/// Windowed Lucas–Kanade parameters.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LucasKanadeFlow {
    /// Half window size; the window is `(2r+1)²`.
    pub window_radius: usize,
    /// Spacing of tracked grid points in pixels.
    pub grid_step: usize,
    pub max_iterations: usize,
    /// Stop when the update length drops below this.
    pub epsilon: f64,
    /// Minimum eigenvalue of the normalised structure tensor.
    pub min_eigenvalue: f64,
}

impl Default for LucasKanadeFlow {
    fn default() -> Self {
        Self {
            window_radius: 5,
            grid_step: 6,
            max_iterations: 20,
            epsilon: 1e-3,
            min_eigenvalue: 1e-4,
        }
    }
}

impl LucasKanadeFlow {
    /// Track a single point; returns the displacement `(dx, dy)`.
    pub fn track_point(&self, reference: &ImageF32, target: &ImageF32, p: [f64; 2]) -> Option<[f64; 2]> {
        let r = self.window_radius as isize;
        let count = ((2 * r + 1) * (2 * r + 1)) as f64;

        // structure tensor is fixed for the reference window
        let (mut gxx, mut gxy, mut gyy) = (0.0, 0.0, 0.0);
        let mut samples = Vec::with_capacity(count as usize);
        for wy in -r..=r {
            for wx in -r..=r {
                let x = p[0] + wx as f64;
                let y = p[1] + wy as f64;
                let i0 = sample_clamped(reference, x, y);
                let ix = 0.5 * (sample_clamped(reference, x + 1.0, y) - sample_clamped(reference, x - 1.0, y));
                let iy = 0.5 * (sample_clamped(reference, x, y + 1.0) - sample_clamped(reference, x, y - 1.0));
                gxx += ix * ix;
                gxy += ix * iy;
                gyy += iy * iy;
                samples.push((x, y, i0, ix, iy));
            }
        }
        let det = gxx * gyy - gxy * gxy;
        if det.abs() < 1e-12 {
            return None;
        }
        let trace = gxx + gyy;
        let diff = gxx - gyy;
        let lambda_min = 0.5 * (trace - (diff * diff + 4.0 * gxy * gxy).sqrt()) / count;
        if lambda_min < self.min_eigenvalue {
            return None;
        }

        let (mut dx, mut dy) = (0.0f64, 0.0f64);
        for _ in 0..self.max_iterations {
            let (mut bx, mut by) = (0.0, 0.0);
            for &(x, y, i0, ix, iy) in &samples {
                let err = i0 - sample_clamped(target, x + dx, y + dy);
                bx += ix * err;
                by += iy * err;
            }
            let step_x = (gyy * bx - gxy * by) / det;
            let step_y = (gxx * by - gxy * bx) / det;
            if !step_x.is_finite() || !step_y.is_finite() {
                return None;
            }
            dx += step_x;
            dy += step_y;
            if step_x * step_x + step_y * step_y < self.epsilon * self.epsilon {
                break;
            }
        }
        (dx.is_finite() && dy.is_finite()).then_some([dx, dy])
    }

    fn grid_points(&self, mask: &Mask) -> Vec<[f64; 2]> {
        let step = self.grid_step.max(1);
        let margin = self.window_radius.min(mask.w / 2).min(mask.h / 2);
        let mut pts = Vec::new();
        let mut y = margin;
        while y + margin < mask.h {
            let mut x = margin;
            while x + margin < mask.w {
                if mask.is_set(x, y) {
                    pts.push([x as f64, y as f64]);
                }
                x += step;
            }
            y += step;
        }
        pts
    }
}

impl FlowEstimator for LucasKanadeFlow {
    fn mean_displacement(&self, reference: &ImageF32, target: &ImageF32, mask: &Mask) -> Option<f64> {
        let points = self.grid_points(mask);
        let track = |p: &[f64; 2]| {
            self.track_point(reference, target, *p)
                .map(|d| d[0].hypot(d[1]))
        };

        #[cfg(feature = "parallel")]
        let (sum, tracked) = {
            use rayon::prelude::*;
            points
                .par_iter()
                .filter_map(track)
                .fold(|| (0.0f64, 0usize), |(s, n), m| (s + m, n + 1))
                .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
        };
        #[cfg(not(feature = "parallel"))]
        let (sum, tracked) = points
            .iter()
            .filter_map(track)
            .fold((0.0f64, 0usize), |(s, n), m| (s + m, n + 1));

        (tracked > 0).then(|| sum / tracked as f64)
    }
}

#[inline]
fn sample_clamped(image: &ImageF32, x: f64, y: f64) -> f64 {
    let xf = x.clamp(0.0, image.w.saturating_sub(1) as f64);
    let yf = y.clamp(0.0, image.h.saturating_sub(1) as f64);
    image.sample_bilinear(xf, yf).unwrap_or(0.0) as f64
}
