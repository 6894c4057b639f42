//! Inverse-map warping of the moving image into the fixed frame.
//!
//! For every output pixel `(x, y)` the moving image is sampled at
//! `M · [x, y, 1]ᵀ`. Samples falling outside `[0, w−1] × [0, h−1]` are
//! filled with 0 and flagged invalid in [`WarpedImage::valid`], so callers
//! can tell "dark" from "no data".
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::image::{ImageF32, Mask};

/// Interpolation used when sampling the moving image.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
}

impl Interpolation {
    #[inline]
    fn sample(self, image: &ImageF32, x: f64, y: f64) -> Option<f32> {
        match self {
            Interpolation::Nearest => image.sample_nearest(x, y),
            Interpolation::Bilinear => image.sample_bilinear(x, y),
        }
    }
}

/// Warped raster plus its validity map.
#[derive(Clone, Debug)]
pub struct WarpedImage {
    pub image: ImageF32,
    pub valid: Mask,
    pub valid_count: usize,
}

impl WarpedImage {
    /// Number of pixels that are both foreground in `mask` and validly sampled.
    pub fn overlap_with(&self, mask: &Mask) -> usize {
        self.valid
            .data
            .iter()
            .zip(&mask.data)
            .filter(|&(&v, &m)| v != 0 && m != 0)
            .count()
    }

    /// A warp is degenerate when no masked pixel received a valid sample.
    pub fn is_degenerate(&self, mask: &Mask) -> bool {
        self.overlap_with(mask) == 0
    }
}

/// Warp `moving` into an `out_w × out_h` raster using fixed → moving matrix `m`.
pub fn warp_image(
    moving: &ImageF32,
    m: &Matrix3<f64>,
    out_w: usize,
    out_h: usize,
    interpolation: Interpolation,
) -> WarpedImage {
    let mut image = ImageF32::new(out_w, out_h);
    let mut valid = Mask::new(out_w, out_h);
    if out_w == 0 || out_h == 0 {
        return WarpedImage {
            image,
            valid,
            valid_count: 0,
        };
    }

    let (a, b, tx) = (m[(0, 0)], m[(0, 1)], m[(0, 2)]);
    let (c, d, ty) = (m[(1, 0)], m[(1, 1)], m[(1, 2)]);
    let fill_row = |y: usize, out: &mut [f32], flags: &mut [u8]| -> usize {
        let yf = y as f64;
        let mut count = 0;
        for (x, (px, flag)) in out.iter_mut().zip(flags.iter_mut()).enumerate() {
            let xf = x as f64;
            let sx = a * xf + b * yf + tx;
            let sy = c * xf + d * yf + ty;
            match interpolation.sample(moving, sx, sy) {
                Some(v) => {
                    *px = v;
                    *flag = 1;
                    count += 1;
                }
                None => {
                    *px = 0.0;
                    *flag = 0;
                }
            }
        }
        count
    };

    #[cfg(feature = "parallel")]
    let valid_count: usize = {
        use rayon::prelude::*;
        image
            .data
            .par_chunks_mut(out_w)
            .zip(valid.data.par_chunks_mut(out_w))
            .enumerate()
            .map(|(y, (row, flags))| fill_row(y, row, flags))
            .sum()
    };
    #[cfg(not(feature = "parallel"))]
    let valid_count: usize = image
        .data
        .chunks_mut(out_w)
        .zip(valid.data.chunks_mut(out_w))
        .enumerate()
        .map(|(y, (row, flags))| fill_row(y, row, flags))
        .sum();

    WarpedImage {
        image,
        valid,
        valid_count,
    }
}
