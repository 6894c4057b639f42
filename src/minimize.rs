//! Derivative-free minimizers driving the per-level search.
//!
//! The driver hands a minimizer a closure `f(params) -> cost`, a starting
//! vector and (optionally) a box. Costs may be `+∞` for rejected candidates;
//! both implementations treat that as "worse than anything finite".
//!
//! [`MinimizeResult::trajectory`] is filled by population-based searches with
//! the best vector of each generation. The driver uses it to narrow the box
//! of the next pyramid level.
pub mod differential_evolution;
pub mod nelder_mead;

use serde::Deserialize;

use crate::error::{AlignError, Result};

pub use differential_evolution::DifferentialEvolution;
pub use nelder_mead::NelderMead;

/// Axis-aligned search box.
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(AlignError::invalid_configuration(format!(
                "bounds have {} lower and {} upper values",
                lower.len(),
                upper.len()
            )));
        }
        if let Some(i) = (0..lower.len()).find(|&i| !(lower[i] <= upper[i])) {
            return Err(AlignError::invalid_configuration(format!(
                "bound {i} is empty: [{}, {}]",
                lower[i], upper[i]
            )));
        }
        Ok(Self { lower, upper })
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn width(&self, i: usize) -> f64 {
        self.upper[i] - self.lower[i]
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(&v, (&lo, &hi))| v >= lo && v <= hi)
    }

    pub fn clamp(&self, x: &mut [f64]) {
        for (v, (&lo, &hi)) in x.iter_mut().zip(self.lower.iter().zip(&self.upper)) {
            *v = v.clamp(lo, hi);
        }
    }
}

/// Outcome of one minimization.
#[derive(Clone, Debug, PartialEq)]
pub struct MinimizeResult {
    pub params: Vec<f64>,
    pub cost: f64,
    pub evaluations: usize,
    /// Best vector per generation, oldest first, when the method has one.
    pub trajectory: Option<Vec<Vec<f64>>>,
}

/// Black-box minimizer over a real parameter vector.
pub trait Minimizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> f64,
        x0: &[f64],
        bounds: Option<&Bounds>,
    ) -> MinimizeResult;
}

/// Serializable choice of minimizer.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MinimizerConfig {
    NelderMead(NelderMead),
    DifferentialEvolution(DifferentialEvolution),
}

impl Default for MinimizerConfig {
    fn default() -> Self {
        MinimizerConfig::NelderMead(NelderMead::default())
    }
}

impl MinimizerConfig {
    pub fn build(self) -> Box<dyn Minimizer> {
        match self {
            MinimizerConfig::NelderMead(m) => Box::new(m),
            MinimizerConfig::DifferentialEvolution(m) => Box::new(m),
        }
    }
}

/// Order costs with `NaN` treated as `+∞`.
#[inline]
pub(crate) fn cost_cmp(a: f64, b: f64) -> std::cmp::Ordering {
    let key = |v: f64| if v.is_nan() { f64::INFINITY } else { v };
    key(a).total_cmp(&key(b))
}
