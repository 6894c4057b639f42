//! Differential evolution (`best/1/bin`) with dithered mutation.
//!
//! The population is `popsize · dim` vectors drawn uniformly inside the
//! bounds, with `x0` injected as the first member. Each generation mutates
//! the current best with one scaled difference vector, applies binomial
//! crossover, clamps to the box and keeps the trial when it is not worse.
//!
//! The best vector of every generation is recorded in the result trajectory.
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

use super::{cost_cmp, Bounds, MinimizeResult, Minimizer};

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DifferentialEvolution {
    /// Population size multiplier (population = `popsize · dim`, at least 5).
    pub popsize: usize,
    pub max_generations: usize,
    /// Mutation factor range; a value is drawn per generation.
    pub mutation: (f64, f64),
    pub recombination: f64,
    /// Relative convergence tolerance on the population cost spread.
    pub tol: f64,
    /// Absolute convergence tolerance on the population cost spread.
    pub atol: f64,
    pub seed: u64,
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self {
            popsize: 15,
            max_generations: 100,
            mutation: (0.5, 1.0),
            recombination: 0.7,
            tol: 0.01,
            atol: 0.0,
            seed: 0,
        }
    }
}

impl DifferentialEvolution {
    fn converged(&self, costs: &[f64]) -> bool {
        if costs.iter().any(|c| !c.is_finite()) {
            return false;
        }
        let n = costs.len() as f64;
        let mean = costs.iter().sum::<f64>() / n;
        let var = costs.iter().map(|c| (c - mean) * (c - mean)).sum::<f64>() / n;
        var.sqrt() <= self.atol + self.tol * mean.abs()
    }
}

/// Box for an unbounded call: `x0 ± (|x0| + 1)` per axis.
fn default_bounds(x0: &[f64]) -> Bounds {
    Bounds {
        lower: x0.iter().map(|v| v - (v.abs() + 1.0)).collect(),
        upper: x0.iter().map(|v| v + (v.abs() + 1.0)).collect(),
    }
}

impl Minimizer for DifferentialEvolution {
    fn name(&self) -> &'static str {
        "differential_evolution"
    }

    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> f64,
        x0: &[f64],
        bounds: Option<&Bounds>,
    ) -> MinimizeResult {
        let dim = x0.len();
        let owned;
        let bounds = match bounds {
            Some(b) => b,
            None => {
                owned = default_bounds(x0);
                &owned
            }
        };
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut evaluations = 0usize;
        let mut eval = |x: &[f64]| -> f64 {
            evaluations += 1;
            let v = objective(x);
            if v.is_nan() {
                f64::INFINITY
            } else {
                v
            }
        };

        let pop_size = (self.popsize * dim).max(5);
        let mut population: Vec<Vec<f64>> = Vec::with_capacity(pop_size);
        let mut start = x0.to_vec();
        bounds.clamp(&mut start);
        population.push(start);
        while population.len() < pop_size {
            let member = (0..dim)
                .map(|j| {
                    let (lo, hi) = (bounds.lower[j], bounds.upper[j]);
                    if hi > lo {
                        rng.random_range(lo..=hi)
                    } else {
                        lo
                    }
                })
                .collect();
            population.push(member);
        }
        let mut costs: Vec<f64> = population.iter().map(|x| eval(x)).collect();
        let mut best = best_index(&costs);
        let mut trajectory = vec![population[best].clone()];

        for _ in 0..self.max_generations {
            if self.converged(&costs) {
                break;
            }
            let (m_lo, m_hi) = self.mutation;
            let f = if m_hi > m_lo {
                rng.random_range(m_lo..m_hi)
            } else {
                m_lo
            };
            for i in 0..pop_size {
                let (r1, r2) = distinct_pair(&mut rng, pop_size, i);
                let forced = rng.random_range(0..dim.max(1));
                let mut trial = population[i].clone();
                for j in 0..dim {
                    if j == forced || rng.random::<f64>() < self.recombination {
                        trial[j] = population[best][j] + f * (population[r1][j] - population[r2][j]);
                    }
                }
                bounds.clamp(&mut trial);
                let c = eval(&trial);
                if cost_cmp(c, costs[i]).is_le() {
                    population[i] = trial;
                    costs[i] = c;
                    if cost_cmp(c, costs[best]).is_lt() {
                        best = i;
                    }
                }
            }
            trajectory.push(population[best].clone());
        }

        MinimizeResult {
            params: population[best].clone(),
            cost: costs[best],
            evaluations,
            trajectory: Some(trajectory),
        }
    }
}

fn best_index(costs: &[f64]) -> usize {
    (0..costs.len())
        .min_by(|&a, &b| cost_cmp(costs[a], costs[b]))
        .unwrap_or(0)
}

/// Two distinct indices in `0..n`, both different from `exclude`.
fn distinct_pair<R: Rng>(rng: &mut R, n: usize, exclude: usize) -> (usize, usize) {
    let mut r1 = rng.random_range(0..n);
    while r1 == exclude {
        r1 = rng.random_range(0..n);
    }
    let mut r2 = rng.random_range(0..n);
    while r2 == exclude || r2 == r1 {
        r2 = rng.random_range(0..n);
    }
    (r1, r2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minimize::test_functions::bowl;

    #[test]
    fn finds_bowl_minimum_with_trajectory() {
        let center = [1.5, -0.5];
        let mut f = bowl(&center);
        let bounds = Bounds::new(vec![-4.0, -4.0], vec![4.0, 4.0]).expect("bounds");
        let de = DifferentialEvolution {
            tol: 1e-8,
            atol: 1e-10,
            ..DifferentialEvolution::default()
        };
        let result = de.minimize(&mut f, &[0.0, 0.0], Some(&bounds));
        assert!((result.params[0] - 1.5).abs() < 1e-2, "{:?}", result.params);
        assert!((result.params[1] + 0.5).abs() < 1e-2, "{:?}", result.params);
        let trajectory = result.trajectory.expect("population search records a trajectory");
        assert!(trajectory.len() >= 2);
        assert!(trajectory.iter().all(|x| bounds.contains(x)));
    }

    #[test]
    fn same_seed_same_result() {
        let center = [0.2, 0.1, -0.3];
        let bounds = Bounds::new(vec![-1.0; 3], vec![1.0; 3]).expect("bounds");
        let de = DifferentialEvolution {
            max_generations: 10,
            seed: 42,
            ..DifferentialEvolution::default()
        };
        let a = de.minimize(&mut bowl(&center), &[0.0; 3], Some(&bounds));
        let b = de.minimize(&mut bowl(&center), &[0.0; 3], Some(&bounds));
        assert_eq!(a, b);
    }

    #[test]
    fn escapes_infinite_region() {
        let mut f = |x: &[f64]| if x[0] < 1.0 { f64::INFINITY } else { (x[0] - 2.0).powi(2) };
        let bounds = Bounds::new(vec![-3.0], vec![3.0]).expect("bounds");
        let result = DifferentialEvolution::default().minimize(&mut f, &[0.0], Some(&bounds));
        assert!(result.cost.is_finite());
        assert!((result.params[0] - 2.0).abs() < 0.1);
    }
}
