use super::{ImageF32, Mask};

/// Borrowed 8-bit grayscale view over a decoded image buffer.
#[derive(Clone, Copy, Debug)]
pub struct ImageU8<'a> {
    pub w: usize,
    pub h: usize,
    /// Bytes between row starts.
    pub stride: usize,
    pub data: &'a [u8],
}

impl ImageU8<'_> {
    #[inline]
    fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.w]
    }

    /// Intensities scaled to `[0, 1]`.
    pub fn to_f32(&self) -> ImageF32 {
        let mut data = Vec::with_capacity(self.w * self.h);
        for y in 0..self.h {
            data.extend(self.row(y).iter().map(|&v| v as f32 / 255.0));
        }
        ImageF32 {
            w: self.w,
            h: self.h,
            stride: self.w,
            data,
        }
    }

    /// Non-zero pixels become foreground.
    pub fn to_mask(&self) -> Mask {
        Mask::from_fn(self.w, self.h, |x, y| self.row(y)[x] != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_view_converts_visible_pixels() {
        // 2x2 view over rows padded to 3 bytes
        let buf = [0u8, 255, 9, 51, 0, 9];
        let view = ImageU8 {
            w: 2,
            h: 2,
            stride: 3,
            data: &buf,
        };
        let img = view.to_f32();
        assert_eq!(img.data, vec![0.0, 1.0, 0.2, 0.0]);
        let mask = view.to_mask();
        assert_eq!(mask.data, vec![0, 1, 1, 0]);
    }
}
