#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod cost;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod image;
pub mod minimize;
pub mod optimizer;

// Estimators and building blocks used by the costs. Public for tools and
// experiments; expect their signatures to move.
pub mod flow;
pub mod histogram;
pub mod pyramid;
pub mod resample;
pub mod scattered;

pub mod config;

// --- High-level re-exports -------------------------------------------------

pub use crate::error::{AlignError, Result};
pub use crate::optimizer::{
    register, AlignOutcome, AlignParams, BoundsPolicy, CoarseToFineOptimizer,
};

pub use crate::cost::{CorrespondingPoints, CostConfig, CostFunction, SENTINEL_COST};
pub use crate::minimize::{Minimizer, MinimizerConfig};

pub use crate::diagnostics::{AlignReport, LevelReport};
pub use crate::geometry::{build_transform, decompose_transform, AffineParams, TransformKind};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use mi_affine::prelude::*;
///
/// # fn main() -> mi_affine::Result<()> {
/// let fixed = ImageF32::from_fn(64, 64, |x, y| ((x / 8 + y / 8) % 2) as f32);
/// let moving = fixed.clone();
/// let outcome = register(
///     AlignParams::new(TransformKind::Euclidean, 2),
///     CostConfig::default(),
///     MinimizerConfig::default(),
///     moving,
///     fixed,
///     None,
/// )?;
/// println!("{:?}", outcome.params.values);
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::image::{ImageF32, Mask};
    pub use crate::{
        register, AlignParams, CoarseToFineOptimizer, CostConfig, MinimizerConfig, TransformKind,
    };
}
