//! Joint histograms from values known only at scattered sample positions.
//!
//! Purpose
//! - Estimate the joint intensity distribution of two signals sampled at the
//!   same (jittered, off-grid) positions without pretending the samples sit
//!   on a pixel lattice.
//!
//! Design
//! - The sample grid is triangulated cell by cell: corners `00, 10, 01, 11`
//!   give triangles `{00, 10, 01}` and `{11, 01, 10}`.
//! - Within a triangle each signal is the plane through its three vertex
//!   values. For every pair of bins whose interval meets the triangle's value
//!   ranges, the two iso-lines at the (clamped) bin centres are intersected;
//!   one vote is cast when the intersection lies in the triangle. Parallel
//!   iso-lines vote only when they coincide.
//! - Triangles touching an invalid vertex (outside the mask, outside the
//!   moving image) are skipped.
//! - Bin mappings use each signal's own min/max over valid samples.
//!
//! Complexity
//! - O(T · Ba · Bb) where `Ba`, `Bb` are the bins spanned inside a triangle,
//!   usually 1–3 each. Rows of cells are split across rayon workers with
//!   private histograms under the `parallel` feature.
pub mod sampling;
pub mod triangle;

use crate::histogram::{BinMapping, JointHistogram};

pub use sampling::{SampleBox, SampleGrid};
pub use triangle::{fit_plane, iso_line_intersection, Plane, Triangle};

/// Vertex offsets `(dr, dc)` of the two triangles in a grid cell.
const CELL_TRIANGLES: [[(usize, usize); 3]; 2] = [[(0, 0), (0, 1), (1, 0)], [(1, 1), (1, 0), (0, 1)]];

/// Co-bin `values_a` and `values_b` sampled at `grid` by triangle splatting.
pub fn scattered_joint_histogram(
    grid: &SampleGrid,
    values_a: &[f32],
    values_b: &[f32],
    valid: &[bool],
    nbins: usize,
) -> JointHistogram {
    let n = grid.len();
    debug_assert!(values_a.len() == n && values_b.len() == n && valid.len() == n);
    let valid_a: Vec<f32> = values_a
        .iter()
        .zip(valid)
        .filter_map(|(&v, &ok)| ok.then_some(v))
        .collect();
    let valid_b: Vec<f32> = values_b
        .iter()
        .zip(valid)
        .filter_map(|(&v, &ok)| ok.then_some(v))
        .collect();
    let map_a = BinMapping::from_values(&valid_a, nbins);
    let map_b = BinMapping::from_values(&valid_b, nbins);
    let splat = Splatter {
        grid,
        values_a,
        values_b,
        valid,
        map_a,
        map_b,
    };
    if grid.rows < 2 || grid.cols < 2 {
        return JointHistogram::new(map_a.nbins, map_b.nbins);
    }

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..grid.rows - 1)
            .into_par_iter()
            .fold(
                || JointHistogram::new(map_a.nbins, map_b.nbins),
                |mut acc, row| {
                    splat.cell_row(row, &mut acc);
                    acc
                },
            )
            .reduce(
                || JointHistogram::new(map_a.nbins, map_b.nbins),
                |mut lhs, rhs| {
                    lhs.merge(&rhs);
                    lhs
                },
            )
    }
    #[cfg(not(feature = "parallel"))]
    {
        let mut hist = JointHistogram::new(map_a.nbins, map_b.nbins);
        for row in 0..grid.rows - 1 {
            splat.cell_row(row, &mut hist);
        }
        hist
    }
}

/// Mutual information of the scattered joint histogram, clamped at 0.
pub fn scattered_mutual_information(
    grid: &SampleGrid,
    values_a: &[f32],
    values_b: &[f32],
    valid: &[bool],
    nbins: usize,
) -> f64 {
    scattered_joint_histogram(grid, values_a, values_b, valid, nbins).mutual_information()
}

struct Splatter<'a> {
    grid: &'a SampleGrid,
    values_a: &'a [f32],
    values_b: &'a [f32],
    valid: &'a [bool],
    map_a: BinMapping,
    map_b: BinMapping,
}

impl Splatter<'_> {
    fn cell_row(&self, row: usize, hist: &mut JointHistogram) {
        for col in 0..self.grid.cols - 1 {
            for offsets in CELL_TRIANGLES {
                let idx = offsets.map(|(dr, dc)| self.grid.index(row + dr, col + dc));
                if idx.iter().any(|&i| !self.valid[i]) {
                    continue;
                }
                self.splat_triangle(idx, hist);
            }
        }
    }

    fn splat_triangle(&self, idx: [usize; 3], hist: &mut JointHistogram) {
        let tri = Triangle::new(
            self.grid.points[idx[0]],
            self.grid.points[idx[1]],
            self.grid.points[idx[2]],
        );
        let va = idx.map(|i| self.values_a[i] as f64);
        let vb = idx.map(|i| self.values_b[i] as f64);
        if va.iter().chain(vb.iter()).any(|v| !v.is_finite()) {
            return;
        }
        let plane_a = fit_plane(&tri, va);
        let plane_b = fit_plane(&tri, vb);
        let anchor = tri.centroid();
        let (lo_a, hi_a) = value_range(va);
        let (lo_b, hi_b) = value_range(vb);

        for ia in self.map_a.bin(lo_a as f32)..=self.map_a.bin(hi_a as f32) {
            let level_a = (self.map_a.center(ia) as f64).clamp(lo_a, hi_a);
            for ib in self.map_b.bin(lo_b as f32)..=self.map_b.bin(hi_b as f32) {
                let level_b = (self.map_b.center(ib) as f64).clamp(lo_b, hi_b);
                let hit = iso_line_intersection(&plane_a, level_a, &plane_b, level_b, anchor);
                if hit.is_some_and(|p| tri.contains(p)) {
                    hist.add(ia, ib, 1.0);
                }
            }
        }
    }
}

fn value_range(v: [f64; 3]) -> (f64, f64) {
    (v[0].min(v[1]).min(v[2]), v[0].max(v[1]).max(v[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_cell_votes_once_per_triangle() {
        let grid = SampleGrid::regular(SampleBox::new(0.0, 0.0, 1.0, 1.0), 1.0);
        let zeros = vec![0.0; 4];
        let hist = scattered_joint_histogram(&grid, &zeros, &zeros, &[true; 4], 8);
        assert_eq!(hist.total(), 2.0);
        assert_eq!(hist.get(0, 0), 2.0);
    }

    #[test]
    fn invalid_vertices_skip_their_triangles() {
        let grid = SampleGrid::regular(SampleBox::new(0.0, 0.0, 1.0, 1.0), 1.0);
        let zeros = vec![0.0; 4];
        // vertex (row 1, col 1) only belongs to the second triangle
        let valid = [true, true, true, false];
        let hist = scattered_joint_histogram(&grid, &zeros, &zeros, &valid, 8);
        assert_eq!(hist.total(), 1.0);
    }

    fn off_diagonal_mass(hist: &JointHistogram, nbins: usize) -> f64 {
        let diagonal: f64 = (0..nbins).map(|i| hist.get(i, i)).sum();
        hist.total() - diagonal
    }

    #[test]
    fn identical_signals_in_one_cell_stay_on_diagonal() {
        let grid = SampleGrid::regular(SampleBox::new(0.0, 0.0, 1.0, 1.0), 1.0);
        let values: [f32; 4] = [0.0, 7.0, 7.0, 14.0];
        let hist = scattered_joint_histogram(&grid, &values, &values, &[true; 4], 8);
        assert!(hist.total() > 0.0);
        assert_eq!(off_diagonal_mass(&hist, 8), 0.0);
    }

    #[test]
    fn identical_ramps_concentrate_on_diagonal() {
        let grid = SampleGrid::regular(SampleBox::new(0.0, 0.0, 15.0, 15.0), 1.0);
        let values: Vec<f32> = grid.points.iter().map(|p| (p[0] + p[1]) as f32).collect();
        let valid = vec![true; grid.len()];
        let hist = scattered_joint_histogram(&grid, &values, &values, &valid, 8);
        assert!(hist.total() > 0.0);
        assert_eq!(off_diagonal_mass(&hist, 8), 0.0);
        assert!(scattered_mutual_information(&grid, &values, &values, &valid, 8) > 0.5);
    }

    #[test]
    fn identical_jittered_samples_stay_on_diagonal() {
        use rand::SeedableRng;
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(11);
        let grid = SampleGrid::jittered(SampleBox::new(0.0, 0.0, 20.0, 20.0), 2.0, 0.8, &mut rng);
        let values: Vec<f32> = grid
            .points
            .iter()
            .map(|p| ((p[0] * 0.3).sin() * 5.0 + p[1] * 0.4) as f32)
            .collect();
        let valid = vec![true; grid.len()];
        let hist = scattered_joint_histogram(&grid, &values, &values, &valid, 12);
        assert!(hist.total() > 0.0);
        assert_eq!(off_diagonal_mass(&hist, 12), 0.0);
    }
}
