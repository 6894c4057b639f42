//! Binary foreground mask aligned with the fixed image.
//!
//! Pixels with value 0 are excluded from every similarity computation. Any
//! non-zero input is normalised to 1 on construction.
use super::traits::{ImageView, ImageViewMut, OwnedImage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    pub w: usize,
    pub h: usize,
    pub data: Vec<u8>,
}

impl Mask {
    /// All-zero (fully excluded) mask.
    pub fn new(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![0; w * h],
        }
    }

    /// Mask that keeps every pixel.
    pub fn full(w: usize, h: usize) -> Self {
        Self {
            w,
            h,
            data: vec![1; w * h],
        }
    }

    pub fn from_vec(w: usize, h: usize, data: Vec<u8>) -> Option<Self> {
        if data.len() != w * h {
            return None;
        }
        let data = data.into_iter().map(|v| u8::from(v != 0)).collect();
        Some(Self { w, h, data })
    }

    pub fn from_fn(w: usize, h: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut out = Self::new(w, h);
        for y in 0..h {
            for x in 0..w {
                out.data[y * w + x] = u8::from(f(x, y));
            }
        }
        out
    }

    #[inline]
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.data[y * self.w + x] != 0
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, on: bool) {
        self.data[y * self.w + x] = u8::from(on);
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Inclusive bounding box `(x0, y0, x1, y1)` of the foreground.
    pub fn bounding_box(&self) -> Option<(usize, usize, usize, usize)> {
        let mut bbox: Option<(usize, usize, usize, usize)> = None;
        for y in 0..self.h {
            for x in 0..self.w {
                if !self.is_set(x, y) {
                    continue;
                }
                bbox = Some(match bbox {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        bbox
    }
}

impl ImageView for Mask {
    type Pixel = u8;

    #[inline]
    fn width(&self) -> usize {
        self.w
    }
    #[inline]
    fn height(&self) -> usize {
        self.h
    }
    #[inline]
    fn row(&self, y: usize) -> &[u8] {
        let start = y * self.w;
        &self.data[start..start + self.w]
    }
}

impl ImageViewMut for Mask {
    #[inline]
    fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.w;
        &mut self.data[start..start + self.w]
    }
}

impl OwnedImage for Mask {
    fn with_size(w: usize, h: usize) -> Self {
        Self::new(w, h)
    }
}
