use serde::Deserialize;

use super::{CostFunction, LevelContext, SENTINEL_COST};
use crate::histogram::knn::{knn_mutual_information_from_samples, DEFAULT_K};
use crate::resample::WarpedImage;

/// Negative Kozachenko–Leonenko MI over masked, validly warped pixels.
///
/// With `max_samples` set, every `ceil(n / max_samples)`-th pixel is kept so
/// evaluation cost stays bounded and deterministic.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct KnnMi {
    pub k: usize,
    pub max_samples: Option<usize>,
}

impl Default for KnnMi {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            max_samples: Some(4096),
        }
    }
}

impl CostFunction for KnnMi {
    fn name(&self) -> &'static str {
        "knn_mi"
    }

    fn score(&self, level: &LevelContext<'_>, warped: &WarpedImage) -> f64 {
        let mut fixed = Vec::new();
        let mut moving = Vec::new();
        let pixels = level
            .mask
            .data
            .iter()
            .zip(&warped.valid.data)
            .enumerate()
            .filter(|&(_, (&m, &v))| m != 0 && v != 0)
            .map(|(i, _)| i);
        let n = warped.overlap_with(level.mask);
        let stride = match self.max_samples {
            Some(max) if max > 0 && n > max => n.div_ceil(max),
            _ => 1,
        };
        for i in pixels.step_by(stride) {
            fixed.push(level.fixed.data[i]);
            moving.push(warped.image.data[i]);
        }
        if fixed.len() <= self.k {
            return SENTINEL_COST;
        }
        -knn_mutual_information_from_samples(&fixed, &moving, self.k)
    }
}
