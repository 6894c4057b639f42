//! Owned single-channel f32 image in row-major layout (stride == width).
//!
//! Every pyramid level, warped level and full-resolution input is stored in
//! this type. Intensities are not assumed to lie in any particular range;
//! estimators rescale by each image's own min/max.
use super::traits::{ImageView, ImageViewMut, OwnedImage};

#[derive(Clone, Debug, PartialEq)]
pub struct ImageF32 {
    /// Image width in pixels
    pub w: usize,
    /// Image height in pixels
    pub h: usize,
    /// Number of f32 elements between consecutive rows (equals `w`)
    pub stride: usize,
    /// Backing storage in row-major order
    pub data: Vec<f32>,
}

impl ImageF32 {
    /// Construct a zero-initialized buffer of size `w × h`.
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            stride: w,
            data: vec![0.0; w * h],
        }
    }

    /// Wrap an existing row-major buffer. Returns `None` when the length does
    /// not match `w × h`.
    pub fn from_vec(w: usize, h: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == w * h).then_some(Self {
            w,
            h,
            stride: w,
            data,
        })
    }

    /// Fill a `w × h` image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(w: usize, h: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut out = Self::new(w, h);
        for y in 0..h {
            for x in 0..w {
                out.data[y * w + x] = f(x, y);
            }
        }
        out
    }

    #[inline]
    /// Convert (x, y) to a linear index into `data`.
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.stride + x
    }
    #[inline]
    /// Get the pixel value at (x, y).
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.idx(x, y)]
    }
    #[inline]
    /// Set the pixel value at (x, y).
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }

    /// Bilinear sample at a continuous position. Returns `None` outside
    /// `[0, w-1] × [0, h-1]` or for non-finite coordinates.
    #[inline]
    pub fn sample_bilinear(&self, x: f64, y: f64) -> Option<f32> {
        if !x.is_finite() || !y.is_finite() || self.w == 0 || self.h == 0 {
            return None;
        }
        let max_x = (self.w - 1) as f64;
        let max_y = (self.h - 1) as f64;
        if x < 0.0 || y < 0.0 || x > max_x || y > max_y {
            return None;
        }
        let x0 = (x.floor() as usize).min(self.w - 1);
        let y0 = (y.floor() as usize).min(self.h - 1);
        let x1 = (x0 + 1).min(self.w - 1);
        let y1 = (y0 + 1).min(self.h - 1);
        let fx = (x - x0 as f64) as f32;
        let fy = (y - y0 as f64) as f32;
        let top = self.get(x0, y0) * (1.0 - fx) + self.get(x1, y0) * fx;
        let bottom = self.get(x0, y1) * (1.0 - fx) + self.get(x1, y1) * fx;
        Some(top * (1.0 - fy) + bottom * fy)
    }

    /// Nearest-neighbour sample with the same domain rules as
    /// [`ImageF32::sample_bilinear`].
    #[inline]
    pub fn sample_nearest(&self, x: f64, y: f64) -> Option<f32> {
        if !x.is_finite() || !y.is_finite() || self.w == 0 || self.h == 0 {
            return None;
        }
        let max_x = (self.w - 1) as f64;
        let max_y = (self.h - 1) as f64;
        if x < 0.0 || y < 0.0 || x > max_x || y > max_y {
            return None;
        }
        let xi = (x.round() as usize).min(self.w - 1);
        let yi = (y.round() as usize).min(self.h - 1);
        Some(self.get(xi, yi))
    }

    /// Minimum and maximum over all finite pixels, `None` when there are none.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;
        for &v in self.data.iter().filter(|v| v.is_finite()) {
            lo = lo.min(v);
            hi = hi.max(v);
        }
        (lo <= hi).then_some((lo, hi))
    }

    /// Mean intensity, 0 for an empty image.
    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.data.iter().map(|&v| v as f64).sum();
        (sum / self.data.len() as f64) as f32
    }
}

impl ImageView for ImageF32 {
    type Pixel = f32;

    #[inline]
    fn width(&self) -> usize {
        self.w
    }
    #[inline]
    fn height(&self) -> usize {
        self.h
    }
    #[inline]
    fn row(&self, y: usize) -> &[f32] {
        let start = y * self.stride;
        &self.data[start..start + self.w]
    }
}

impl ImageViewMut for ImageF32 {
    #[inline]
    fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.stride;
        &mut self.data[start..start + self.w]
    }
}

impl OwnedImage for ImageF32 {
    fn with_size(w: usize, h: usize) -> Self {
        Self::new(w, h)
    }
}
