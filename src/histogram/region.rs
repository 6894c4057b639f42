//! Region mutual information (Russakoff et al.).
//!
//! Each pixel contributes the stacked `(2r+1)²` neighbourhoods of both
//! images as one point in `2·(2r+1)²` dimensions. The point cloud is modelled
//! as a Gaussian and MI follows from the log-determinants of the joint and
//! marginal covariance blocks:
//!
//! `RMI = H(C_A) + H(C_B) − H(C)` with `H(Σ) = ½·(d·ln(2πe) + ln|Σ|)`.
//!
//! Only neighbourhoods fully inside the window are used. All three blocks
//! get the same ridge on the diagonal, scaled to the mean joint variance, so
//! a block with no variation in some direction still has a finite
//! determinant and the ridge terms cancel between `H(C_A) + H(C_B)` and
//! `H(C)`. A half with no variation at all carries no information and
//! scores 0. Only the final MI is floored at 0.
use nalgebra::{DMatrix, DVector};

use crate::image::ImageF32;

/// Ridge relative to the mean joint variance.
const RIDGE: f64 = 1e-3;
/// Relative variance below which a half counts as flat.
const FLAT_EPS: f64 = 1e-12;

/// Half-open pixel window `[x0, x1) × [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Window {
    pub fn full(image: &ImageF32) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: image.w,
            y1: image.h,
        }
    }

    /// Window of side `2·half + 1` centred at `(cx, cy)`, clipped to `w × h`.
    pub fn centered(cx: usize, cy: usize, half: usize, w: usize, h: usize) -> Self {
        Self {
            x0: cx.saturating_sub(half),
            y0: cy.saturating_sub(half),
            x1: (cx + half + 1).min(w),
            y1: (cy + half + 1).min(h),
        }
    }

    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }
}

/// Region MI over the whole of two equally sized images.
pub fn region_mutual_information(a: &ImageF32, b: &ImageF32, radius: usize) -> f64 {
    region_mutual_information_window(a, b, Window::full(a), radius)
}

/// Region MI restricted to pixels whose neighbourhood lies inside `window`.
pub fn region_mutual_information_window(
    a: &ImageF32,
    b: &ImageF32,
    window: Window,
    radius: usize,
) -> f64 {
    let window = Window {
        x0: window.x0,
        y0: window.y0,
        x1: window.x1.min(a.w).min(b.w),
        y1: window.y1.min(a.h).min(b.h),
    };
    let Some(stats) = neighbourhood_covariance(a, b, window, radius) else {
        return 0.0;
    };
    let d = stats.half_dim;
    if stats.is_flat(0) || stats.is_flat(d) {
        return 0.0;
    }
    let ridge = stats.ridge();
    let cov_a = stats.cov.view((0, 0), (d, d)).clone_owned();
    let cov_b = stats.cov.view((d, d), (d, d)).clone_owned();
    let (Some(h_a), Some(h_b), Some(h_ab)) = (
        gaussian_entropy(cov_a, ridge),
        gaussian_entropy(cov_b, ridge),
        gaussian_entropy(stats.cov, ridge),
    ) else {
        return 0.0;
    };
    let rmi = h_a + h_b - h_ab;
    if rmi.is_finite() {
        rmi.max(0.0)
    } else {
        0.0
    }
}

/// Covariance of the stacked `(A, B)` neighbourhood vectors plus the mean
/// squared value per coordinate.
struct NeighbourhoodStats {
    half_dim: usize,
    cov: DMatrix<f64>,
    energy: DVector<f64>,
}

impl NeighbourhoodStats {
    /// True when the half starting at `offset` has (relatively) no variance.
    fn is_flat(&self, offset: usize) -> bool {
        let d = self.half_dim;
        let variance: f64 = (offset..offset + d).map(|i| self.cov[(i, i)]).sum();
        let energy: f64 = self.energy.rows(offset, d).sum();
        variance <= FLAT_EPS * energy.max(f64::MIN_POSITIVE)
    }

    fn ridge(&self) -> f64 {
        let dim = self.cov.nrows().max(1) as f64;
        (RIDGE * self.cov.trace() / dim).max(f64::MIN_POSITIVE)
    }
}

fn neighbourhood_covariance(
    a: &ImageF32,
    b: &ImageF32,
    window: Window,
    radius: usize,
) -> Option<NeighbourhoodStats> {
    let side = 2 * radius + 1;
    if window.width() < side || window.height() < side {
        return None;
    }
    let d = side * side;
    let dim = 2 * d;
    let mut sum = DVector::<f64>::zeros(dim);
    let mut outer = DMatrix::<f64>::zeros(dim, dim);
    let mut feature = DVector::<f64>::zeros(dim);
    let mut n = 0usize;

    for cy in window.y0 + radius..window.y1 - radius {
        for cx in window.x0 + radius..window.x1 - radius {
            let mut k = 0;
            for y in cy - radius..=cy + radius {
                for x in cx - radius..=cx + radius {
                    feature[k] = a.get(x, y) as f64;
                    feature[k + d] = b.get(x, y) as f64;
                    k += 1;
                }
            }
            if feature.iter().any(|v| !v.is_finite()) {
                continue;
            }
            sum += &feature;
            outer.ger(1.0, &feature, &feature, 1.0);
            n += 1;
        }
    }
    if n < 2 {
        return None;
    }

    let nf = n as f64;
    let mean = sum / nf;
    let mut cov = outer / nf;
    let energy = cov.diagonal();
    cov.ger(-1.0, &mean, &mean, 1.0);
    Some(NeighbourhoodStats {
        half_dim: d,
        cov,
        energy,
    })
}

/// Differential entropy of a Gaussian with covariance `cov + ridge·I`.
fn gaussian_entropy(mut cov: DMatrix<f64>, ridge: f64) -> Option<f64> {
    let dim = cov.nrows();
    for i in 0..dim {
        cov[(i, i)] += ridge;
    }
    let chol = cov.cholesky()?;
    let log_det = chol_log_det(&chol.l());
    let h = 0.5 * (dim as f64 * (2.0 * std::f64::consts::PI * std::f64::consts::E).ln() + log_det);
    h.is_finite().then_some(h)
}

fn chol_log_det(l: &DMatrix<f64>) -> f64 {
    2.0 * l.diagonal().iter().map(|v| v.ln()).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(w: usize, h: usize, seed: usize) -> ImageF32 {
        ImageF32::from_fn(w, h, |x, y| {
            let mut v = (x as u64).wrapping_mul(73_856_093)
                ^ (y as u64).wrapping_mul(19_349_663)
                ^ (seed as u64).wrapping_mul(83_492_791);
            v ^= v >> 13;
            v = v.wrapping_mul(0x5bd1_e995);
            v ^= v >> 15;
            (v % 97) as f32
        })
    }

    /// Gaussian entropy of `image`'s stacked neighbourhoods, with the ridge
    /// the estimator uses when `image` is paired with itself.
    fn self_entropy(image: &ImageF32, radius: usize) -> f64 {
        let stats = neighbourhood_covariance(image, image, Window::full(image), radius)
            .expect("large enough");
        let d = stats.half_dim;
        let ridge = stats.ridge();
        gaussian_entropy(stats.cov.view((0, 0), (d, d)).clone_owned(), ridge).expect("entropy")
    }

    #[test]
    fn constant_half_carries_no_information() {
        let flat = ImageF32::from_fn(25, 25, |_, _| 4.0);
        let b = textured(25, 25, 1);
        assert_eq!(region_mutual_information(&flat, &b, 1), 0.0);
        assert_eq!(region_mutual_information(&b, &flat, 1), 0.0);
    }

    #[test]
    fn constant_pair_scores_zero() {
        let a = ImageF32::from_fn(9, 9, |_, _| 4.0);
        let b = ImageF32::from_fn(9, 9, |_, _| -1.5);
        assert_eq!(region_mutual_information(&a, &b, 1), 0.0);
        assert_eq!(region_mutual_information(&a, &a, 1), 0.0);
    }

    #[test]
    fn self_information_is_bounded_by_entropy() {
        let b = textured(25, 25, 1);
        let same = region_mutual_information(&b, &b, 1);
        let h = self_entropy(&b, 1);
        assert!(same > 0.0);
        assert!(same <= h, "{same} > {h}");
    }

    #[test]
    fn smooth_ramp_against_texture_is_small() {
        let ramp = ImageF32::from_fn(25, 25, |x, y| (x + 2 * y) as f32);
        let b = textured(25, 25, 1);
        let unrelated = region_mutual_information(&ramp, &b, 1);
        let same = region_mutual_information(&b, &b, 1);
        assert!(unrelated.is_finite() && unrelated >= 0.0);
        assert!(unrelated < 0.1 * same, "{unrelated} vs {same}");
    }

    #[test]
    fn identical_images_score_higher_than_unrelated() {
        let a = textured(20, 20, 0);
        let b = textured(20, 20, 5);
        let same = region_mutual_information(&a, &a, 1);
        let other = region_mutual_information(&a, &b, 1);
        assert!(same > other, "{same} <= {other}");
    }

    #[test]
    fn window_too_small_scores_zero() {
        let a = textured(10, 10, 0);
        let w = Window::centered(0, 0, 0, 10, 10);
        assert_eq!(region_mutual_information_window(&a, &a, w, 1), 0.0);
    }

    #[test]
    fn centered_window_clips_to_image() {
        let w = Window::centered(1, 8, 3, 10, 10);
        assert_eq!((w.x0, w.y0, w.x1, w.y1), (0, 5, 5, 10));
    }
}
