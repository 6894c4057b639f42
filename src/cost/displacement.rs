use serde::Deserialize;

use super::{CostFunction, LevelContext, SENTINEL_COST};
use crate::flow::{FlowEstimator, LucasKanadeFlow};
use crate::resample::WarpedImage;

/// Mean optical-flow magnitude between the warped moving image and the
/// fixed image. Zero at perfect alignment for same-modality inputs.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Displacement<F = LucasKanadeFlow> {
    #[serde(default)]
    pub flow: F,
}

impl<F: FlowEstimator> Displacement<F> {
    pub fn with_flow(flow: F) -> Self {
        Self { flow }
    }
}

impl<F: FlowEstimator> CostFunction for Displacement<F> {
    fn name(&self) -> &'static str {
        "displacement"
    }

    fn score(&self, level: &LevelContext<'_>, warped: &WarpedImage) -> f64 {
        self.flow
            .mean_displacement(&warped.image, level.fixed, level.mask)
            .unwrap_or(SENTINEL_COST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::test_support::{context, pattern};
    use crate::geometry::build_transform;
    use crate::image::{ImageF32, Mask};

    struct ConstantFlow(f64);

    impl FlowEstimator for ConstantFlow {
        fn mean_displacement(&self, _: &ImageF32, _: &ImageF32, _: &Mask) -> Option<f64> {
            (self.0 >= 0.0).then_some(self.0)
        }
    }

    #[test]
    fn delegates_to_flow_estimator() {
        let img = pattern(24, 24);
        let mask = Mask::full(24, 24);
        let level = context(&img, &img, &mask);
        let identity = build_transform(0.0, [0.0, 0.0], 1.0);
        assert_eq!(Displacement::with_flow(ConstantFlow(1.5)).evaluate(&level, &identity), 1.5);
        assert_eq!(
            Displacement::with_flow(ConstantFlow(-1.0)).evaluate(&level, &identity),
            SENTINEL_COST
        );
    }

    #[test]
    fn residual_shift_is_measured() {
        let img = pattern(48, 48);
        let mask = Mask::full(48, 48);
        let level = context(&img, &img, &mask);
        let cost: Displacement = Displacement::default();
        let aligned = cost.evaluate(&level, &build_transform(0.0, [0.0, 0.0], 1.0));
        let shifted = cost.evaluate(&level, &build_transform(0.0, [1.0, 0.0], 1.0));
        assert!(aligned < 1e-3, "aligned {aligned}");
        assert!(shifted > 0.5, "shifted {shifted}");
    }
}
