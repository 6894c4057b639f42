mod common;

use common::init_logger;
use common::synthetic_image::{fixed_scene, moving_scene, rotated_pair};
use mi_affine::cost::{CostFunction, GlobalMi, LevelContext, SampledMi};
use mi_affine::image::{ImageF32, Mask};
use mi_affine::minimize::DifferentialEvolution;
use mi_affine::optimizer::BoundsSource;
use mi_affine::pyramid::LevelScaling;
use mi_affine::resample::Interpolation;
use mi_affine::{
    build_transform, AlignError, AlignParams, CoarseToFineOptimizer, CostConfig, MinimizerConfig,
    TransformKind, SENTINEL_COST,
};
use nalgebra::Matrix3;

fn default_optimizer(levels: usize) -> CoarseToFineOptimizer {
    CoarseToFineOptimizer::from_config(
        AlignParams::new(TransformKind::Euclidean, levels),
        CostConfig::default(),
        MinimizerConfig::default(),
    )
}

#[test]
fn empty_mask_fails_at_setup() {
    init_logger();
    let img = fixed_scene(64, 64);
    let mut opt = default_optimizer(2);
    let err = opt
        .setup(img.clone(), img, Some(Mask::new(64, 64)), None, None)
        .unwrap_err();
    assert!(matches!(err, AlignError::EmptyMask));
    assert!(matches!(opt.align(), Err(AlignError::NotSetUp)));
}

#[test]
fn mask_shape_must_match_fixed() {
    let fixed = fixed_scene(64, 64);
    let moving = fixed_scene(80, 64);
    let mut opt = default_optimizer(2);
    // the moving image may differ in size, the mask may not
    assert!(opt
        .setup(moving.clone(), fixed.clone(), Some(Mask::full(64, 64)), None, None)
        .is_ok());
    let err = opt
        .setup(moving, fixed, Some(Mask::full(80, 64)), None, None)
        .unwrap_err();
    assert!(matches!(err, AlignError::ShapeMismatch { .. }));
    assert!(!opt.is_set_up());
}

#[test]
fn tiny_inputs_use_fewer_levels() {
    init_logger();
    let img = ImageF32::from_fn(12, 12, |x, y| ((x / 3 + y / 3) % 2) as f32);
    let mut opt = default_optimizer(4);
    let outcome = opt
        .register(img.clone(), img, None, None, None)
        .expect("single-level alignment");
    assert_eq!(opt.levels(), 1);
    assert_eq!(outcome.cost_history.len(), 1);
    assert_eq!(outcome.report.pyramid.requested_levels, 4);
    assert_eq!(outcome.report.input.pyramid_levels, 1);
}

#[test]
fn start_outside_the_image_is_degenerate() {
    init_logger();
    let img = fixed_scene(64, 64);
    let far = build_transform(0.0, [1000.0, 1000.0], 1.0);
    let mut opt = default_optimizer(1);
    let err = opt
        .register(img.clone(), img, None, Some(&far), None)
        .unwrap_err();
    assert!(matches!(err, AlignError::DegenerateTransform(_)));
}

#[test]
fn singular_initial_transform_is_rejected() {
    let img = fixed_scene(64, 64);
    let flat = build_transform(0.0, [0.0, 0.0], 0.0);
    let mut opt = default_optimizer(2);
    let err = opt
        .setup(img.clone(), img, None, Some(&flat), None)
        .unwrap_err();
    assert!(matches!(err, AlignError::DegenerateTransform(_)));
}

#[test]
fn nonsense_parameters_score_as_sentinel() {
    let img = fixed_scene(32, 32);
    let mask = Mask::full(32, 32);
    let level = LevelContext {
        index: 0,
        fixed: &img,
        moving: &img,
        mask: &mask,
        scaling: LevelScaling::identity(),
        interpolation: Interpolation::Bilinear,
        points: None,
    };
    let costs: Vec<Box<dyn CostFunction>> = vec![
        Box::new(GlobalMi::default()),
        Box::new(SampledMi::default()),
        CostConfig::default().build(),
    ];
    let mut nan = Matrix3::identity();
    nan[(0, 2)] = f64::NAN;
    for cost in &costs {
        assert_eq!(cost.evaluate(&level, &nan), SENTINEL_COST, "{}", cost.name());
        let away = build_transform(0.0, [-500.0, 0.0], 1.0);
        assert_eq!(cost.evaluate(&level, &away), SENTINEL_COST, "{}", cost.name());
    }
}

#[test]
fn population_trajectory_narrows_bounds() {
    init_logger();
    let truth = build_transform(0.0, [3.0, -2.0], 1.0);
    let fixed = fixed_scene(96, 96);
    let moving = moving_scene(96, 96, &truth);
    let minimizer = MinimizerConfig::DifferentialEvolution(DifferentialEvolution {
        popsize: 6,
        max_generations: 25,
        seed: 7,
        ..DifferentialEvolution::default()
    });
    let mut opt = CoarseToFineOptimizer::from_config(
        AlignParams::new(TransformKind::Euclidean, 2),
        CostConfig::default(),
        minimizer,
    );
    let outcome = opt
        .register(moving, fixed, None, None, None)
        .expect("alignment succeeds");

    let levels = &outcome.report.levels;
    assert_eq!(levels.len(), 2);
    assert_eq!(levels[0].bounds.source, BoundsSource::Resolution);
    assert!(levels[0].trajectory_len.is_some());
    assert_eq!(levels[1].bounds.source, BoundsSource::Trajectory);
    // full-resolution box: rotation ±π, translation ±48 px
    let fine = &levels[1].bounds;
    assert!(fine.lower[0] >= -std::f64::consts::PI && fine.upper[0] <= std::f64::consts::PI);
    for i in 1..3 {
        assert!(fine.lower[i] >= -48.0 && fine.upper[i] <= 48.0, "{fine:?}");
    }
    assert!(fine.contains(&levels[1].start_params));
    assert!(outcome.cost_history.iter().all(|c| c.is_finite()));
}

#[test]
fn masked_alignment_reports_json() {
    init_logger();
    let (fixed, moving, _) = rotated_pair(4.0, [2.0, -1.0]);
    let mask = Mask::from_fn(128, 128, |x, y| (16..112).contains(&x) && (16..112).contains(&y));
    let mut opt = default_optimizer(3);
    let outcome = opt
        .register(moving, fixed, Some(mask), None, None)
        .expect("alignment succeeds");

    assert!(outcome.report.final_overlap > 0);
    assert!(outcome.report.final_overlap <= 96 * 96);
    let json = serde_json::to_value(&outcome.report).expect("report serializes");
    assert_eq!(json["cost"], "global_mi");
    assert_eq!(json["minimizer"], "nelder_mead");
    assert_eq!(json["levels"].as_array().map(Vec::len), Some(3));
    assert!(json["pyramid"]["levels"][0]["maskCoverage"].as_f64().is_some());
    assert!(json["timings"]["stages"].as_array().is_some_and(|s| !s.is_empty()));
}
