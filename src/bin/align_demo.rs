use mi_affine::config::align::{load_config, AlignToolConfig};
use mi_affine::image::io::{load_grayscale_f32, load_mask, save_grayscale_f32, write_json_file};
use mi_affine::{AlignOutcome, CoarseToFineOptimizer};
use serde::Serialize;
use std::env;
use std::path::Path;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AlignDemoOutput<'a> {
    moving: String,
    fixed: String,
    mask: Option<String>,
    matrix: [[f64; 3]; 3],
    params: &'a [f64],
    cost_history: &'a [f64],
    report: &'a mi_affine::AlignReport,
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = load_config(Path::new(&config_path)).map_err(|e| e.to_string())?;

    let outcome = align(&config).map_err(|e| e.to_string())?;
    print!("{}", outcome.report);

    save_grayscale_f32(&outcome.aligned, &config.output.aligned_image)
        .map_err(|e| e.to_string())?;
    println!("Saved aligned image to {}", config.output.aligned_image.display());

    if let Some(report_path) = &config.output.report_json {
        let m = &outcome.matrix;
        let output = AlignDemoOutput {
            moving: config.moving.display().to_string(),
            fixed: config.fixed.display().to_string(),
            mask: config.mask.as_ref().map(|p| p.display().to_string()),
            matrix: [
                [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
                [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
            ],
            params: &outcome.params.values,
            cost_history: &outcome.cost_history,
            report: &outcome.report,
        };
        write_json_file(report_path, &output).map_err(|e| e.to_string())?;
        println!("Saved report to {}", report_path.display());
    }
    Ok(())
}

fn align(config: &AlignToolConfig) -> mi_affine::Result<AlignOutcome> {
    let moving = load_grayscale_f32(&config.moving)?;
    let fixed = load_grayscale_f32(&config.fixed)?;
    let mask = config.mask.as_deref().map(load_mask).transpose()?;
    let initial = config.initial_matrix();
    let mut optimizer = CoarseToFineOptimizer::from_config(
        config.params,
        config.cost.clone(),
        config.minimizer.clone(),
    );
    optimizer.register(moving, fixed, mask, initial.as_ref(), None)
}

fn usage() -> String {
    "Usage: align_demo <config.json>".to_string()
}
