//! Parameter types configuring the coarse-to-fine driver.
//!
//! Defaults search translations up to half the image size in each direction
//! and any rotation on the coarsest level. For inputs where the content
//! needs more room, raise `bounds.translation_fraction`.

use serde::Deserialize;

use super::bounds::BoundsPolicy;
use crate::error::{AlignError, Result};
use crate::geometry::TransformKind;
use crate::pyramid::PyramidOptions;
use crate::resample::Interpolation;

/// Driver-wide parameters. Cost and minimizer are chosen separately.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlignParams {
    pub transform: TransformKind,
    pub pyramid: PyramidOptions,
    pub bounds: BoundsPolicy,
    /// Interpolation for every warp, including the final one.
    pub interpolation: Interpolation,
}

impl AlignParams {
    pub fn new(transform: TransformKind, levels: usize) -> Self {
        Self {
            transform,
            pyramid: PyramidOptions::new(levels),
            ..Self::default()
        }
    }

    pub fn with_pyramid(mut self, pyramid: PyramidOptions) -> Self {
        self.pyramid = pyramid;
        self
    }

    pub fn with_bounds(mut self, bounds: BoundsPolicy) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.pyramid.levels == 0 {
            return Err(AlignError::invalid_configuration(
                "pyramid.levels must be at least 1",
            ));
        }
        self.bounds.validate()
    }
}
