//! Bounded Nelder–Mead simplex search with restarts.
//!
//! Bounds are enforced by clamping every candidate vertex before it is
//! evaluated. After convergence the search restarts from the best vertex with
//! a fresh simplex; restarts stop early once one fails to improve the cost.
use serde::Deserialize;

use super::{cost_cmp, Bounds, MinimizeResult, Minimizer};

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct NelderMead {
    pub max_evaluations: usize,
    /// Convergence tolerance on vertex spread, in parameter units.
    pub xatol: f64,
    /// Convergence tolerance on cost spread.
    pub fatol: f64,
    /// Initial simplex edge as a fraction of the bound width (or of `|x0|`
    /// when unbounded).
    pub initial_step: f64,
    pub restarts: usize,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_evaluations: 800,
            xatol: 1e-4,
            fatol: 1e-7,
            initial_step: 0.05,
            restarts: 2,
        }
    }
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

struct Counted<'a> {
    f: &'a mut dyn FnMut(&[f64]) -> f64,
    bounds: Option<&'a Bounds>,
    evaluations: usize,
}

impl Counted<'_> {
    fn eval(&mut self, x: &mut [f64]) -> f64 {
        if let Some(b) = self.bounds {
            b.clamp(x);
        }
        self.evaluations += 1;
        let v = (self.f)(x);
        if v.is_nan() {
            f64::INFINITY
        } else {
            v
        }
    }
}

impl NelderMead {
    fn initial_simplex(&self, x0: &[f64], bounds: Option<&Bounds>) -> Vec<Vec<f64>> {
        let n = x0.len();
        let mut simplex = vec![x0.to_vec()];
        for i in 0..n {
            let mut v = x0.to_vec();
            let step = match bounds {
                Some(b) if b.width(i) > 0.0 => {
                    let step = self.initial_step * b.width(i);
                    // step away from the nearer wall
                    if v[i] + step > b.upper[i] {
                        -step
                    } else {
                        step
                    }
                }
                _ if v[i] != 0.0 => self.initial_step * v[i].abs(),
                _ => 2.5e-4,
            };
            v[i] += step;
            simplex.push(v);
        }
        simplex
    }

    fn run_simplex(&self, counted: &mut Counted<'_>, x0: &[f64]) -> (Vec<f64>, f64) {
        let n = x0.len();
        let mut simplex = self.initial_simplex(x0, counted.bounds);
        let mut values: Vec<f64> = simplex.iter_mut().map(|v| counted.eval(v)).collect();

        loop {
            let mut order: Vec<usize> = (0..=n).collect();
            order.sort_by(|&a, &b| cost_cmp(values[a], values[b]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            values = order.iter().map(|&i| values[i]).collect();

            if self.converged(&simplex, &values) || counted.evaluations >= self.max_evaluations {
                break;
            }

            let centroid: Vec<f64> = (0..n)
                .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
                .collect();
            let along = |t: f64| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(&simplex[n])
                    .map(|(&c, &w)| c + t * (c - w))
                    .collect()
            };

            let mut reflected = along(REFLECT);
            let f_r = counted.eval(&mut reflected);
            if f_r < values[0] {
                let mut expanded = along(EXPAND);
                let f_e = counted.eval(&mut expanded);
                if f_e < f_r {
                    simplex[n] = expanded;
                    values[n] = f_e;
                } else {
                    simplex[n] = reflected;
                    values[n] = f_r;
                }
                continue;
            }
            if f_r < values[n - 1] {
                simplex[n] = reflected;
                values[n] = f_r;
                continue;
            }
            let (mut contracted, outside) = if f_r < values[n] {
                (along(CONTRACT * REFLECT), true)
            } else {
                (along(-CONTRACT), false)
            };
            let f_c = counted.eval(&mut contracted);
            let accept = if outside { f_c <= f_r } else { f_c < values[n] };
            if accept {
                simplex[n] = contracted;
                values[n] = f_c;
                continue;
            }
            let best = simplex[0].clone();
            for i in 1..=n {
                let mut v: Vec<f64> = best
                    .iter()
                    .zip(&simplex[i])
                    .map(|(&b, &x)| b + SHRINK * (x - b))
                    .collect();
                values[i] = counted.eval(&mut v);
                simplex[i] = v;
            }
        }
        (simplex.swap_remove(0), values[0])
    }

    fn converged(&self, simplex: &[Vec<f64>], values: &[f64]) -> bool {
        let best = &simplex[0];
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(best).map(|(a, b)| (a - b).abs()))
            .fold(0.0f64, f64::max);
        let f_spread = values[1..]
            .iter()
            .map(|&v| if v == values[0] { 0.0 } else { (v - values[0]).abs() })
            .fold(0.0f64, f64::max);
        x_spread <= self.xatol && f_spread <= self.fatol
    }
}

impl Minimizer for NelderMead {
    fn name(&self) -> &'static str {
        "nelder_mead"
    }

    fn minimize(
        &self,
        objective: &mut dyn FnMut(&[f64]) -> f64,
        x0: &[f64],
        bounds: Option<&Bounds>,
    ) -> MinimizeResult {
        let mut counted = Counted {
            f: objective,
            bounds,
            evaluations: 0,
        };
        if x0.is_empty() {
            let cost = counted.eval(&mut []);
            return MinimizeResult {
                params: Vec::new(),
                cost,
                evaluations: counted.evaluations,
                trajectory: None,
            };
        }
        let mut start = x0.to_vec();
        if let Some(b) = bounds {
            b.clamp(&mut start);
        }
        let (mut best_x, mut best_f) = self.run_simplex(&mut counted, &start);
        for _ in 0..self.restarts {
            if counted.evaluations >= self.max_evaluations {
                break;
            }
            let (x, f) = self.run_simplex(&mut counted, &best_x);
            let improved = cost_cmp(f, best_f).is_lt() && (best_f - f) > self.fatol;
            if cost_cmp(f, best_f).is_lt() {
                best_x = x;
                best_f = f;
            }
            if !improved {
                break;
            }
        }
        MinimizeResult {
            params: best_x,
            cost: best_f,
            evaluations: counted.evaluations,
            trajectory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minimize::test_functions::bowl;

    #[test]
    fn finds_bowl_minimum() {
        let center = [0.3, -2.0, 5.0];
        let mut f = bowl(&center);
        let result = NelderMead::default().minimize(&mut f, &[0.0, 0.0, 0.0], None);
        for (x, c) in result.params.iter().zip(&center) {
            assert!((x - c).abs() < 1e-3, "{:?}", result.params);
        }
        assert!(result.trajectory.is_none());
        assert!(result.evaluations > 0);
    }

    #[test]
    fn respects_bounds() {
        let center = [3.0, 3.0];
        let mut f = bowl(&center);
        let bounds = Bounds::new(vec![-1.0, -1.0], vec![1.0, 2.0]).expect("bounds");
        let result = NelderMead::default().minimize(&mut f, &[0.0, 0.0], Some(&bounds));
        assert!(bounds.contains(&result.params));
        assert!((result.params[0] - 1.0).abs() < 1e-3);
        assert!((result.params[1] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn tolerates_infinite_costs() {
        // infeasible for x < 0
        let mut f = |x: &[f64]| if x[0] < 0.0 { f64::INFINITY } else { (x[0] - 1.0).powi(2) };
        let result = NelderMead::default().minimize(&mut f, &[0.5], None);
        assert!((result.params[0] - 1.0).abs() < 1e-3);
        assert!(result.cost.is_finite());
    }
}
