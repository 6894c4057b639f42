//! File helpers for the tools: grayscale images, masks and JSON reports.
//!
//! Decoding goes through the `image` crate (PNG/JPEG/TIFF), converting any
//! colour input to 8-bit luma first.
use super::{ImageF32, ImageU8, ImageView, Mask};
use crate::error::{AlignError, Result};
use image::{GrayImage, Luma};
use serde::Serialize;
use std::fs;
use std::path::Path;

fn decode_luma(path: &Path) -> Result<GrayImage> {
    let img = image::open(path)
        .map_err(|e| AlignError::io(format!("failed to open {}: {e}", path.display())))?;
    Ok(img.into_luma8())
}

fn luma_view(luma: &GrayImage) -> ImageU8<'_> {
    let w = luma.width() as usize;
    ImageU8 {
        w,
        h: luma.height() as usize,
        stride: w,
        data: luma.as_raw(),
    }
}

/// Load an image as intensities in `[0, 1]`.
pub fn load_grayscale_f32(path: &Path) -> Result<ImageF32> {
    let luma = decode_luma(path)?;
    Ok(luma_view(&luma).to_f32())
}

/// Load an image as a mask; non-zero pixels are foreground.
pub fn load_mask(path: &Path) -> Result<Mask> {
    let luma = decode_luma(path)?;
    Ok(luma_view(&luma).to_mask())
}

/// Write `image` as an 8-bit PNG, stretching its own min/max to `[0, 255]`.
pub fn save_grayscale_f32(image: &ImageF32, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let (lo, hi) = image.min_max().unwrap_or((0.0, 1.0));
    let range = if hi > lo { hi - lo } else { 1.0 };
    let out = GrayImage::from_fn(image.w as u32, image.h as u32, |x, y| {
        let v = image.row(y as usize)[x as usize];
        Luma([((v - lo) / range * 255.0).round().clamp(0.0, 255.0) as u8])
    });
    out.save(path)
        .map_err(|e| AlignError::io(format!("failed to save {}: {e}", path.display())))
}

/// Pretty-print `value` as JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
        .map_err(|e| AlignError::io(format!("failed to write {}: {e}", path.display())))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| AlignError::io(format!("failed to create {}: {e}", parent.display()))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_round_trip_keeps_stretched_values() {
        let dir = std::env::temp_dir().join(format!("mi_affine_io_{}", std::process::id()));
        let path = dir.join("nested").join("ramp.png");
        let img = ImageF32::from_fn(4, 2, |x, y| (x + 4 * y) as f32 * 2.0 - 3.0);
        save_grayscale_f32(&img, &path).expect("save");

        let back = load_grayscale_f32(&path).expect("load");
        assert_eq!((back.w, back.h), (4, 2));
        assert_eq!(back.get(0, 0), 0.0);
        assert_eq!(back.get(3, 1), 1.0);
        let mask = load_mask(&path).expect("mask");
        assert_eq!(mask.count(), 7);

        assert!(matches!(
            load_grayscale_f32(&dir.join("missing.png")),
            Err(AlignError::Io(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
