use serde::Deserialize;

use super::{CostFunction, LevelContext};
use crate::histogram::{mutual_information, DEFAULT_BINS};
use crate::resample::WarpedImage;

/// Negative binned mutual information over the level mask.
///
/// Pixels outside the moving image are scored with their fill value (0), so
/// shrinking overlap is penalised rather than ignored.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct GlobalMi {
    pub nbins: usize,
}

impl Default for GlobalMi {
    fn default() -> Self {
        Self {
            nbins: DEFAULT_BINS,
        }
    }
}

impl CostFunction for GlobalMi {
    fn name(&self) -> &'static str {
        "global_mi"
    }

    fn score(&self, level: &LevelContext<'_>, warped: &WarpedImage) -> f64 {
        -mutual_information(level.fixed, &warped.image, Some(level.mask), self.nbins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::test_support::{context, pattern};
    use crate::geometry::build_transform;
    use crate::image::Mask;

    #[test]
    fn identity_beats_shifted() {
        let img = pattern(48, 48);
        let mask = Mask::full(48, 48);
        let level = context(&img, &img, &mask);
        let cost = GlobalMi::default();
        let at_identity = cost.evaluate(&level, &build_transform(0.0, [0.0, 0.0], 1.0));
        let shifted = cost.evaluate(&level, &build_transform(0.0, [4.0, -3.0], 1.0));
        assert!(at_identity < shifted, "{at_identity} >= {shifted}");
        assert!(at_identity < 0.0);
    }
}
