use mi_affine::geometry::build_transform;
use mi_affine::image::ImageF32;
use nalgebra::{Matrix3, Vector3};

/// Piecewise-constant scene on a zero background: a disc, a bar, a small
/// square and a second disc, all inside `[20, 108]²` of a 128 × 128 frame.
pub fn scene_value(x: f64, y: f64) -> f32 {
    let in_disc = |cx: f64, cy: f64, r: f64| (x - cx).powi(2) + (y - cy).powi(2) <= r * r;
    let in_rect = |x0: f64, y0: f64, x1: f64, y1: f64| x >= x0 && x < x1 && y >= y0 && y < y1;
    if in_disc(48.0, 50.0, 18.0) {
        0.8
    } else if in_rect(70.0, 30.0, 102.0, 58.0) {
        0.5
    } else if in_disc(82.0, 84.0, 14.0) {
        0.3
    } else if in_rect(30.0, 76.0, 52.0, 100.0) {
        0.65
    } else {
        0.0
    }
}

/// Render `w × h` pixels, averaging a 4 × 4 grid of sub-samples per pixel
/// taken at `to_scene(x, y)`.
pub fn render(w: usize, h: usize, to_scene: impl Fn(f64, f64) -> (f64, f64)) -> ImageF32 {
    const SUB: usize = 4;
    ImageF32::from_fn(w, h, |x, y| {
        let mut acc = 0.0f32;
        for sy in 0..SUB {
            for sx in 0..SUB {
                let px = x as f64 + (sx as f64 + 0.5) / SUB as f64 - 0.5;
                let py = y as f64 + (sy as f64 + 0.5) / SUB as f64 - 0.5;
                let (qx, qy) = to_scene(px, py);
                acc += scene_value(qx, qy);
            }
        }
        acc / (SUB * SUB) as f32
    })
}

pub fn fixed_scene(w: usize, h: usize) -> ImageF32 {
    render(w, h, |x, y| (x, y))
}

/// The scene as seen through `truth` (fixed → moving): the moving pixel at
/// `q` shows the scene at `truth⁻¹ · q`.
pub fn moving_scene(w: usize, h: usize, truth: &Matrix3<f64>) -> ImageF32 {
    let inverse = truth.try_inverse().expect("test transform is invertible");
    render(w, h, |x, y| {
        let p = inverse * Vector3::new(x, y, 1.0);
        (p[0], p[1])
    })
}

/// Fixed and moving images related by a rotation about the origin followed
/// by a translation.
pub fn rotated_pair(degrees: f64, translation: [f64; 2]) -> (ImageF32, ImageF32, Matrix3<f64>) {
    let truth = build_transform(degrees.to_radians(), translation, 1.0);
    let fixed = fixed_scene(128, 128);
    let moving = moving_scene(128, 128, &truth);
    (fixed, moving, truth)
}
