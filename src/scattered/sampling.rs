//! Jittered regular sample grids.
use rand::Rng;

use crate::image::Mask;

/// Axis-aligned box in pixel coordinates, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl SampleBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Bounding box of the mask foreground.
    pub fn from_mask(mask: &Mask) -> Option<Self> {
        mask.bounding_box()
            .map(|(x0, y0, x1, y1)| Self::new(x0 as f64, y0 as f64, x1 as f64, y1 as f64))
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.x0 && p[0] <= self.x1 && p[1] >= self.y0 && p[1] <= self.y1
    }

    pub fn corners(&self) -> [[f64; 2]; 4] {
        [
            [self.x0, self.y0],
            [self.x1, self.y0],
            [self.x1, self.y1],
            [self.x0, self.y1],
        ]
    }
}

/// `rows × cols` sample positions stored row-major, so neighbouring grid
/// indices form the cells used for triangulation.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleGrid {
    pub rows: usize,
    pub cols: usize,
    pub points: Vec<[f64; 2]>,
}

impl SampleGrid {
    /// Regular grid with nominal `spacing`, at least 2×2, spanning `bbox`.
    pub fn regular(bbox: SampleBox, spacing: f64) -> Self {
        let (cols, step_x) = axis_layout(bbox.x1 - bbox.x0, spacing);
        let (rows, step_y) = axis_layout(bbox.y1 - bbox.y0, spacing);
        let mut points = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                points.push([bbox.x0 + c as f64 * step_x, bbox.y0 + r as f64 * step_y]);
            }
        }
        Self { rows, cols, points }
    }

    /// Regular grid whose points are each displaced uniformly by up to
    /// `±jitter/2` of the grid step and clamped back into `bbox`. `jitter` is
    /// a fraction in `[0, 1]`.
    pub fn jittered<R: Rng>(bbox: SampleBox, spacing: f64, jitter: f64, rng: &mut R) -> Self {
        let mut grid = Self::regular(bbox, spacing);
        let jitter = jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return grid;
        }
        let (_, step_x) = axis_layout(bbox.x1 - bbox.x0, spacing);
        let (_, step_y) = axis_layout(bbox.y1 - bbox.y0, spacing);
        for p in grid.points.iter_mut() {
            let dx = rng.random_range(-0.5f64..=0.5) * jitter * step_x;
            let dy = rng.random_range(-0.5f64..=0.5) * jitter * step_y;
            p[0] = (p[0] + dx).clamp(bbox.x0, bbox.x1);
            p[1] = (p[1] + dy).clamp(bbox.y0, bbox.y1);
        }
        grid
    }

    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    #[inline]
    pub fn point(&self, row: usize, col: usize) -> [f64; 2] {
        self.points[self.index(row, col)]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Tightest box around the (jittered) points.
    pub fn bounding_box(&self) -> Option<SampleBox> {
        let first = *self.points.first()?;
        let init = SampleBox::new(first[0], first[1], first[0], first[1]);
        Some(self.points.iter().fold(init, |b, p| {
            SampleBox::new(b.x0.min(p[0]), b.y0.min(p[1]), b.x1.max(p[0]), b.y1.max(p[1]))
        }))
    }
}

/// Sample count and step along one axis of length `span`.
fn axis_layout(span: f64, spacing: f64) -> (usize, f64) {
    if span.is_nan() || span <= 0.0 {
        return (2, 0.0);
    }
    let spacing = if spacing > 0.0 { spacing } else { span };
    let count = ((span / spacing).floor() as usize + 1).max(2);
    (count, span / (count - 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn regular_grid_spans_box() {
        let grid = SampleGrid::regular(SampleBox::new(0.0, 0.0, 10.0, 4.0), 2.0);
        assert_eq!((grid.rows, grid.cols), (3, 6));
        assert_eq!(grid.point(0, 0), [0.0, 0.0]);
        assert_eq!(grid.point(2, 5), [10.0, 4.0]);
    }

    #[test]
    fn jitter_stays_inside_box_and_is_seeded() {
        let bbox = SampleBox::new(2.0, 3.0, 30.0, 20.0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let a = SampleGrid::jittered(bbox, 3.0, 0.8, &mut rng);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let b = SampleGrid::jittered(bbox, 3.0, 0.8, &mut rng);
        assert_eq!(a, b);
        assert!(a.points.iter().all(|&p| bbox.contains(p)));
        assert_ne!(a, SampleGrid::regular(bbox, 3.0));
        let tight = a.bounding_box().expect("points");
        assert!(tight.x0 >= bbox.x0 && tight.x1 <= bbox.x1);
        assert!(a.points.iter().all(|&p| tight.contains(p)));
    }

    #[test]
    fn degenerate_box_still_has_cells() {
        let grid = SampleGrid::regular(SampleBox::new(5.0, 5.0, 5.0, 5.0), 4.0);
        assert_eq!((grid.rows, grid.cols), (2, 2));
    }
}
