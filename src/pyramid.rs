//! Multi-resolution image pyramid built by plain 2× decimation.
//!
//! Purpose
//! - Give the coarse-to-fine driver a stack of moving, fixed and mask levels
//!   with identical geometry so that a transform estimated on level `l+1`
//!   lifts to level `l` by doubling its translation.
//!
//! Design
//! - Level 0 is the input itself; level `l+1` keeps pixel `(2x, 2y)` of
//!   level `l`, so pixel `i` of a coarse level sits exactly on pixel `2i` of
//!   the finer one. No low-pass filter is applied.
//! - Odd sizes round up (`div_ceil`), so the last row/column survives.
//! - Construction stops early when the next level would have a side shorter
//!   than `PyramidOptions::min_side`; a 1-pixel side never collapses to zero.
//! - Generic over any [`OwnedImage`], which covers `ImageF32` and `Mask`.
//!
//! Complexity
//! - Per level O(W·H / 4). Memory ~4/3 of the base image.
pub mod options;
pub mod scaling;

use crate::image::{ImageF32, OwnedImage};
use log::debug;

pub use options::PyramidOptions;
pub use scaling::LevelScaling;

#[derive(Clone, Debug)]
pub struct Pyramid<I = ImageF32> {
    pub levels: Vec<I>,
}

impl<I: OwnedImage> Pyramid<I> {
    /// Build a pyramid from `image`, finest level first.
    pub fn build(image: I, options: PyramidOptions) -> Self {
        let target = options.levels.max(1);
        let mut levels = Vec::with_capacity(target);
        levels.push(image);
        while levels.len() < target {
            let prev = levels.last().expect("pyramid keeps at least one level");
            let (nw, nh) = half_size(prev.width(), prev.height());
            if nw.min(nh) < options.min_side.max(1) {
                debug!(
                    "Pyramid::build stopping at {} of {} levels ({}x{} would shrink below {})",
                    levels.len(),
                    target,
                    prev.width(),
                    prev.height(),
                    options.min_side
                );
                break;
            }
            let down = downsample(prev);
            levels.push(down);
        }
        Self { levels }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn level(&self, index: usize) -> Option<&I> {
        self.levels.get(index)
    }

    pub fn coarsest(&self) -> Option<&I> {
        self.levels.last()
    }
}

#[inline]
fn half_size(w: usize, h: usize) -> (usize, usize) {
    (w.div_ceil(2), h.div_ceil(2))
}

/// Halve both dimensions by keeping every second sample, starting at 0.
pub fn downsample<I: OwnedImage>(src: &I) -> I {
    let (nw, nh) = half_size(src.width(), src.height());
    let mut down = I::with_size(nw, nh);
    for y in 0..nh {
        let sy = (y * 2).min(src.height() - 1);
        let src_row = src.row(sy);
        let dst_row = down.row_mut(y);
        for (x, dst_px) in dst_row.iter_mut().enumerate() {
            let sx = (x * 2).min(src_row.len() - 1);
            *dst_px = src_row[sx];
        }
    }
    down
}

/// Number of levels `Pyramid::build` will produce for a `w × h` input.
pub fn supported_levels(w: usize, h: usize, options: PyramidOptions) -> usize {
    let target = options.levels.max(1);
    let min_side = options.min_side.max(1);
    let (mut cw, mut ch) = (w, h);
    let mut count = 1;
    while count < target {
        let (nw, nh) = half_size(cw, ch);
        if nw.min(nh) < min_side {
            break;
        }
        cw = nw;
        ch = nh;
        count += 1;
    }
    count
}
