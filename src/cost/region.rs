use serde::Deserialize;

use super::{CostFunction, LevelContext, SENTINEL_COST};
use crate::error::Result;
use crate::histogram::{bin_image, region_mutual_information_window, Window};
use crate::image::ImageF32;
use crate::resample::WarpedImage;

/// Mean negative region MI over windows tiling the mask.
///
/// Both images are bin-normalised first so intensity scale does not leak
/// into the covariance determinants. `radius` (patch half size) and `window`
/// (anchor window half size) are given in full-resolution pixels and shrink
/// with the level.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegionMi {
    pub nbins: usize,
    pub radius: usize,
    pub window: usize,
    #[serde(skip)]
    level: Option<RegionLevel>,
}

impl Default for RegionMi {
    fn default() -> Self {
        Self {
            nbins: 16,
            radius: 1,
            window: 12,
            level: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct RegionLevel {
    radius: usize,
    half: usize,
    anchors: Vec<(usize, usize)>,
    binned_fixed: ImageF32,
}

impl RegionMi {
    fn prepare(&self, level: &LevelContext<'_>) -> RegionLevel {
        let radius = level.scaling.radius_from_full(self.radius, 1);
        let half = level.scaling.radius_from_full(self.window, radius + 3).max(radius + 3);
        let mut anchors = Vec::new();
        if let Some((x0, y0, x1, y1)) = level.mask.bounding_box() {
            let step = 2 * half + 1;
            let mut cy = (y0 + half).min(y1);
            while cy <= y1 {
                let mut cx = (x0 + half).min(x1);
                while cx <= x1 {
                    if level.mask.is_set(cx, cy) {
                        anchors.push((cx, cy));
                    }
                    cx += step;
                }
                cy += step;
            }
        }
        RegionLevel {
            radius,
            half,
            anchors,
            binned_fixed: bin_image(level.fixed, self.nbins),
        }
    }

    fn score_prepared(&self, prepared: &RegionLevel, warped: &WarpedImage) -> f64 {
        let binned_moving = bin_image(&warped.image, self.nbins);
        let (w, h) = (warped.image.w, warped.image.h);
        let window_score = |&(cx, cy): &(usize, usize)| -> Option<f64> {
            let window = Window::centered(cx, cy, prepared.half, w, h);
            let all_valid = (window.y0..window.y1)
                .all(|y| (window.x0..window.x1).all(|x| warped.valid.is_set(x, y)));
            if !all_valid {
                return None;
            }
            Some(region_mutual_information_window(
                &prepared.binned_fixed,
                &binned_moving,
                window,
                prepared.radius,
            ))
        };

        #[cfg(feature = "parallel")]
        let (sum, count) = {
            use rayon::prelude::*;
            prepared
                .anchors
                .par_iter()
                .filter_map(window_score)
                .fold(|| (0.0f64, 0usize), |(s, n), v| (s + v, n + 1))
                .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
        };
        #[cfg(not(feature = "parallel"))]
        let (sum, count) = prepared
            .anchors
            .iter()
            .filter_map(window_score)
            .fold((0.0f64, 0usize), |(s, n), v| (s + v, n + 1));

        if count == 0 {
            return SENTINEL_COST;
        }
        -sum / count as f64
    }
}

impl CostFunction for RegionMi {
    fn name(&self) -> &'static str {
        "region_mi"
    }

    fn bind_level(&mut self, level: &LevelContext<'_>) -> Result<()> {
        let prepared = self.prepare(level);
        log::debug!(
            "RegionMi level {}: radius {} window {} anchors {}",
            level.index,
            prepared.radius,
            2 * prepared.half + 1,
            prepared.anchors.len()
        );
        self.level = Some(prepared);
        Ok(())
    }

    fn score(&self, level: &LevelContext<'_>, warped: &WarpedImage) -> f64 {
        match &self.level {
            Some(prepared) => self.score_prepared(prepared, warped),
            None => self.score_prepared(&self.prepare(level), warped),
        }
    }
}
