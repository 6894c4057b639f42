use mi_affine::geometry::{build_transform, decompose_transform, TransformKind};
use mi_affine::image::ImageF32;
use mi_affine::resample::{warp_image, Interpolation};
use mi_affine::{register, AlignParams, CostConfig, MinimizerConfig};

fn main() {
    env_logger::init();
    // Demo: register a synthetic pattern against a rotated/shifted copy of itself.
    let (w, h) = (160usize, 120usize);
    let fixed = ImageF32::from_fn(w, h, |x, y| {
        let (xf, yf) = (x as f32, y as f32);
        let disc = ((xf - 60.0).powi(2) + (yf - 50.0).powi(2)).sqrt() < 25.0;
        let bar = (95..135).contains(&x) && (30..90).contains(&y);
        0.2 + 0.5 * disc as u8 as f32 + 0.3 * bar as u8 as f32
    });
    let truth = build_transform(8f64.to_radians(), [4.0, -3.0], 1.0);
    let Some(inverse) = truth.try_inverse() else {
        eprintln!("Error: demo transform is not invertible");
        std::process::exit(1);
    };
    let moving = warp_image(&fixed, &inverse, w, h, Interpolation::Bilinear).image;

    let params = AlignParams::new(TransformKind::Euclidean, 3);
    match register(
        params,
        CostConfig::default(),
        MinimizerConfig::default(),
        moving,
        fixed,
        None,
    ) {
        Ok(outcome) => {
            let d = decompose_transform(&outcome.matrix);
            print!("{}", outcome.report);
            println!(
                "recovered rotation={:.3} deg translation=({:.3}, {:.3}); truth 8 deg (4, -3)",
                d.rotation.to_degrees(),
                d.translation[0],
                d.translation[1]
            );
        }
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
