//! Row access shared by intensity images and masks, so decimation and
//! export are written once for both.

/// Read access to a row-major single-channel raster.
pub trait ImageView {
    type Pixel: Copy;

    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn row(&self, y: usize) -> &[Self::Pixel];
}

pub trait ImageViewMut: ImageView {
    fn row_mut(&mut self, y: usize) -> &mut [Self::Pixel];
}

/// Raster that can be allocated (zero-filled) at a given size.
pub trait OwnedImage: ImageViewMut + Clone {
    fn with_size(w: usize, h: usize) -> Self;
}
