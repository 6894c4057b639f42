//! Coarse-to-fine affine registration.
//!
//! Overview
//! - Builds fixed, moving and mask pyramids once, then walks them from the
//!   coarsest level to full resolution.
//! - On each level a [`CostFunction`](crate::cost::CostFunction) is bound to
//!   that level's images and a [`Minimizer`](crate::minimize::Minimizer)
//!   searches rotation, translation and (for similarity) scale inside a box.
//! - The level's optimum seeds the next level with its translation doubled.
//!   When the minimizer reports the path it took, the next box is narrowed to
//!   that path's extent.
//!
//! Modules
//! - [`params`] – driver parameters ([`AlignParams`]).
//! - [`bounds`] – the per-level box schedule ([`BoundsPolicy`]).
//! - `pipeline` – [`CoarseToFineOptimizer`] and the one-shot [`register`].

pub mod bounds;
pub mod params;
mod pipeline;

pub use bounds::{BoundsPolicy, BoundsSource, LevelBounds};
pub use params::AlignParams;
pub use pipeline::{register, AlignOutcome, CoarseToFineOptimizer};
