//! Binned entropy and mutual-information estimators.
//!
//! Design
//! - Each signal is binned by its *own* min/max into `[0, nbins)`. The two
//!   axes of a joint histogram are never normalised jointly.
//! - Entropies use the natural logarithm and skip empty bins.
//! - Mutual information is the raw `H(A) + H(B) − H(A,B)`, clamped at 0 to
//!   absorb small-sample bias. No normalisation ratio is applied.
//! - With the `parallel` feature, joint histograms are accumulated per rayon
//!   worker into private tables that are summed elementwise at the end.
//!
//! Submodules hold the binning-free estimators: [`region`] (Gaussian region
//! MI over patch covariances) and [`knn`] (Kozachenko–Leonenko).
pub mod knn;
pub mod region;

use crate::image::{ImageF32, Mask};

pub use knn::{knn_entropy_1d, knn_entropy_2d, knn_mutual_information};
pub use region::{region_mutual_information, region_mutual_information_window, Window};

/// Default number of bins per axis.
pub const DEFAULT_BINS: usize = 32;

#[cfg(feature = "parallel")]
const PARALLEL_CHUNK: usize = 8192;

/// Linear bin mapping derived from a signal's own value range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BinMapping {
    pub min: f32,
    pub max: f32,
    pub nbins: usize,
}

impl BinMapping {
    /// Mapping over the finite values in `values`; constant or empty input
    /// maps everything to bin 0.
    pub fn from_values(values: &[f32], nbins: usize) -> Self {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in values.iter().filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
        }
        if min > max {
            min = 0.0;
            max = 0.0;
        }
        Self {
            min,
            max,
            nbins: nbins.max(1),
        }
    }

    #[inline]
    pub fn bin(&self, v: f32) -> usize {
        let range = self.max - self.min;
        if range <= 0.0 || !v.is_finite() {
            return 0;
        }
        let t = ((v - self.min) / range) * self.nbins as f32;
        (t.max(0.0) as usize).min(self.nbins - 1)
    }

    /// Centre value of bin `i` in signal units.
    #[inline]
    pub fn center(&self, i: usize) -> f32 {
        let width = (self.max - self.min) / self.nbins as f32;
        self.min + (i as f32 + 0.5) * width
    }

    /// Bin width in signal units (0 for a constant signal).
    #[inline]
    pub fn width(&self) -> f32 {
        (self.max - self.min) / self.nbins as f32
    }
}

/// Bin every value of `values` using the slice's own min/max.
pub fn bin_values(values: &[f32], nbins: usize) -> Vec<usize> {
    let mapping = BinMapping::from_values(values, nbins);
    values.iter().map(|&v| mapping.bin(v)).collect()
}

/// Bin-normalise an image: every pixel becomes its bin index as `f32`.
pub fn bin_image(image: &ImageF32, nbins: usize) -> ImageF32 {
    let mapping = BinMapping::from_values(&image.data, nbins);
    let mut out = image.clone();
    for v in out.data.iter_mut() {
        *v = mapping.bin(*v) as f32;
    }
    out
}

/// Shannon entropy (nats) of an unnormalised histogram.
pub fn entropy(hist: &[f64]) -> f64 {
    let total: f64 = hist.iter().filter(|&&c| c > 0.0).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mut h = 0.0;
    for &c in hist.iter().filter(|&&c| c > 0.0) {
        let p = c / total;
        h -= p * p.ln();
    }
    h
}

/// Dense `nbins_a × nbins_b` count table, row index = bin of A.
#[derive(Clone, Debug, PartialEq)]
pub struct JointHistogram {
    pub nbins_a: usize,
    pub nbins_b: usize,
    pub counts: Vec<f64>,
}

impl JointHistogram {
    pub fn new(nbins_a: usize, nbins_b: usize) -> Self {
        Self {
            nbins_a,
            nbins_b,
            counts: vec![0.0; nbins_a * nbins_b],
        }
    }

    #[inline]
    pub fn add(&mut self, ia: usize, ib: usize, weight: f64) {
        self.counts[ia * self.nbins_b + ib] += weight;
    }

    #[inline]
    pub fn get(&self, ia: usize, ib: usize) -> f64 {
        self.counts[ia * self.nbins_b + ib]
    }

    /// Elementwise sum of another table with the same shape.
    pub fn merge(&mut self, other: &JointHistogram) {
        debug_assert_eq!(self.counts.len(), other.counts.len());
        for (dst, src) in self.counts.iter_mut().zip(other.counts.iter()) {
            *dst += src;
        }
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    pub fn marginal_a(&self) -> Vec<f64> {
        self.counts
            .chunks(self.nbins_b.max(1))
            .map(|row| row.iter().sum())
            .collect()
    }

    pub fn marginal_b(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.nbins_b];
        for row in self.counts.chunks(self.nbins_b.max(1)) {
            for (dst, &c) in out.iter_mut().zip(row) {
                *dst += c;
            }
        }
        out
    }

    /// `H(A) + H(B) − H(A,B)`, clamped at 0.
    pub fn mutual_information(&self) -> f64 {
        if self.total() <= 0.0 {
            return 0.0;
        }
        let h_a = entropy(&self.marginal_a());
        let h_b = entropy(&self.marginal_b());
        let h_ab = entropy(&self.counts);
        let mi = h_a + h_b - h_ab;
        if mi.is_finite() {
            mi.max(0.0)
        } else {
            0.0
        }
    }
}

/// Collect the pixel pairs of `a` and `b` kept by `mask`.
pub fn masked_pairs(a: &ImageF32, b: &ImageF32, mask: Option<&Mask>) -> (Vec<f32>, Vec<f32>) {
    let n = a.data.len().min(b.data.len());
    let mut va = Vec::with_capacity(n);
    let mut vb = Vec::with_capacity(n);
    for i in 0..n {
        if mask.is_some_and(|m| m.data.get(i).copied().unwrap_or(0) == 0) {
            continue;
        }
        va.push(a.data[i]);
        vb.push(b.data[i]);
    }
    (va, vb)
}

/// Co-bin paired samples. Pairs with a non-finite member are skipped.
pub fn joint_histogram_from_samples(a: &[f32], b: &[f32], nbins: usize) -> JointHistogram {
    let map_a = BinMapping::from_values(a, nbins);
    let map_b = BinMapping::from_values(b, nbins);
    let n = a.len().min(b.len());

    #[cfg(feature = "parallel")]
    if n >= 2 * PARALLEL_CHUNK {
        use rayon::prelude::*;
        let (na, nb) = (map_a.nbins, map_b.nbins);
        return a[..n]
            .par_chunks(PARALLEL_CHUNK)
            .zip(b[..n].par_chunks(PARALLEL_CHUNK))
            .fold(
                || JointHistogram::new(na, nb),
                |mut acc, (ca, cb)| {
                    accumulate_pairs(&mut acc, ca, cb, &map_a, &map_b);
                    acc
                },
            )
            .reduce(
                || JointHistogram::new(na, nb),
                |mut lhs, rhs| {
                    lhs.merge(&rhs);
                    lhs
                },
            );
    }

    let mut hist = JointHistogram::new(map_a.nbins, map_b.nbins);
    accumulate_pairs(&mut hist, &a[..n], &b[..n], &map_a, &map_b);
    hist
}

#[inline]
fn accumulate_pairs(
    hist: &mut JointHistogram,
    a: &[f32],
    b: &[f32],
    map_a: &BinMapping,
    map_b: &BinMapping,
) {
    for (&va, &vb) in a.iter().zip(b) {
        if !va.is_finite() || !vb.is_finite() {
            continue;
        }
        hist.add(map_a.bin(va), map_b.bin(vb), 1.0);
    }
}

/// Joint histogram of the mask-filtered pixels of `a` and `b`.
pub fn joint_histogram(
    a: &ImageF32,
    b: &ImageF32,
    mask: Option<&Mask>,
    nbins: usize,
) -> JointHistogram {
    let (va, vb) = masked_pairs(a, b, mask);
    joint_histogram_from_samples(&va, &vb, nbins)
}

/// Mutual information of paired samples.
pub fn mutual_information_from_samples(a: &[f32], b: &[f32], nbins: usize) -> f64 {
    joint_histogram_from_samples(a, b, nbins).mutual_information()
}

/// Mutual information over the mask-filtered pixels of two equally sized images.
pub fn mutual_information(a: &ImageF32, b: &ImageF32, mask: Option<&Mask>, nbins: usize) -> f64 {
    joint_histogram(a, b, mask, nbins).mutual_information()
}
