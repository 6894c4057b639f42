//! Kozachenko–Leonenko nearest-neighbour entropy and MI estimators.
//!
//! `H ≈ ψ(N) − ψ(k) + ln c_d + (d/N)·Σ ln ε_i`
//!
//! where `ε_i` is the Euclidean distance from sample `i` to its `k`-th
//! nearest neighbour and `c_d` the volume of the unit ball (`c_1 = 2`,
//! `c_2 = π`). MI is `H(A) + H(B) − H(A,B)`, clamped at 0.
//!
//! 1-D neighbours are found by walking outwards in the sorted samples; 2-D
//! neighbours by an x-sorted sweep that stops once the x-gap alone exceeds
//! the current k-th distance.
use crate::image::{ImageF32, Mask};

use super::masked_pairs;

/// Distances below this are clamped before taking the logarithm, so tied
/// samples contribute a finite term.
pub const MIN_DISTANCE: f64 = 1e-6;

/// Default neighbour rank.
pub const DEFAULT_K: usize = 3;

/// Digamma function ψ(x) for `x > 0`.
pub fn digamma(mut x: f64) -> f64 {
    let mut result = 0.0;
    while x < 6.0 {
        result -= 1.0 / x;
        x += 1.0;
    }
    let f = 1.0 / (x * x);
    let tail = f
        * (1.0 / 12.0
            - f * (1.0 / 120.0 - f * (1.0 / 252.0 - f * (1.0 / 240.0 - f * (1.0 / 132.0)))));
    result + x.ln() - 0.5 / x - tail
}

fn kl_constant(n: usize, k: usize, unit_ball: f64) -> f64 {
    digamma(n as f64) - digamma(k as f64) + unit_ball.ln()
}

/// k-NN entropy of scalar samples (nats). Returns 0 when `N <= k`.
pub fn knn_entropy_1d(values: &[f64], k: usize) -> f64 {
    let n = values.len();
    if k == 0 || n <= k {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let log_sum: f64 = (0..n).map(|i| kth_gap_sorted(&sorted, i, k).max(MIN_DISTANCE).ln()).sum();
    kl_constant(n, k, 2.0) + log_sum / n as f64
}

/// Distance from `sorted[i]` to its k-th nearest neighbour.
fn kth_gap_sorted(sorted: &[f64], i: usize, k: usize) -> f64 {
    let mut left = i;
    let mut right = i + 1;
    let mut dist = 0.0;
    for _ in 0..k {
        let dl = (left > 0).then(|| sorted[i] - sorted[left - 1]);
        let dr = (right < sorted.len()).then(|| sorted[right] - sorted[i]);
        match (dl, dr) {
            (Some(l), Some(r)) if l <= r => {
                dist = l;
                left -= 1;
            }
            (Some(_), Some(r)) | (None, Some(r)) => {
                dist = r;
                right += 1;
            }
            (Some(l), None) => {
                dist = l;
                left -= 1;
            }
            (None, None) => break,
        }
    }
    dist
}

/// k-NN entropy of 2-D samples (nats). Returns 0 when `N <= k`.
pub fn knn_entropy_2d(points: &[[f64; 2]], k: usize) -> f64 {
    let n = points.len();
    if k == 0 || n <= k {
        return 0.0;
    }
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a[0].total_cmp(&b[0]));

    let log_eps = |i: usize| -> f64 {
        let d2 = kth_distance_sq_sweep(&sorted, i, k);
        d2.sqrt().max(MIN_DISTANCE).ln()
    };

    #[cfg(feature = "parallel")]
    let log_sum: f64 = {
        use rayon::prelude::*;
        (0..n).into_par_iter().map(log_eps).sum()
    };
    #[cfg(not(feature = "parallel"))]
    let log_sum: f64 = (0..n).map(log_eps).sum();

    kl_constant(n, k, std::f64::consts::PI) + 2.0 * log_sum / n as f64
}

/// Squared distance from `sorted[i]` to its k-th nearest neighbour in the plane.
fn kth_distance_sq_sweep(sorted: &[[f64; 2]], i: usize, k: usize) -> f64 {
    let p = sorted[i];
    // ascending, at most k entries
    let mut best: Vec<f64> = Vec::with_capacity(k + 1);
    let consider = |q: [f64; 2], best: &mut Vec<f64>| -> bool {
        let dx = q[0] - p[0];
        if best.len() == k && dx * dx >= best[k - 1] {
            return false;
        }
        let dy = q[1] - p[1];
        let d2 = dx * dx + dy * dy;
        if best.len() < k || d2 < best[k - 1] {
            let pos = best.partition_point(|&v| v <= d2);
            best.insert(pos, d2);
            best.truncate(k);
        }
        true
    };
    for j in (0..i).rev() {
        if !consider(sorted[j], &mut best) {
            break;
        }
    }
    for q in sorted.iter().skip(i + 1) {
        if !consider(*q, &mut best) {
            break;
        }
    }
    best.last().copied().unwrap_or(0.0)
}

/// k-NN mutual information of paired scalar samples.
pub fn knn_mutual_information_from_samples(a: &[f32], b: &[f32], k: usize) -> f64 {
    let pairs: Vec<[f64; 2]> = a
        .iter()
        .zip(b)
        .filter(|(va, vb)| va.is_finite() && vb.is_finite())
        .map(|(&va, &vb)| [va as f64, vb as f64])
        .collect();
    if pairs.len() <= k {
        return 0.0;
    }
    let xs: Vec<f64> = pairs.iter().map(|p| p[0]).collect();
    let ys: Vec<f64> = pairs.iter().map(|p| p[1]).collect();
    let mi = knn_entropy_1d(&xs, k) + knn_entropy_1d(&ys, k) - knn_entropy_2d(&pairs, k);
    if mi.is_finite() {
        mi.max(0.0)
    } else {
        0.0
    }
}

/// k-NN mutual information over the mask-filtered pixels of two images.
pub fn knn_mutual_information(a: &ImageF32, b: &ImageF32, mask: Option<&Mask>, k: usize) -> f64 {
    let (va, vb) = masked_pairs(a, b, mask);
    knn_mutual_information_from_samples(&va, &vb, k)
}
