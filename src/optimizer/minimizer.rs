//! Unconstrained inner minimizer used by every barrier round.

use crate::array::Chronology;
use crate::error::{RateSmoothError, SmoothResult};
use crate::objective::{Barrier, Objective};
use argmin::core::{CostFunction, Error, Executor};
use argmin::solver::neldermead::NelderMead;
use std::cell::RefCell;
use strum_macros::{Display, EnumIter, EnumString};

/// Relative size of the initial simplex around the starting point.
const SIMPLEX_STEP: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Algorithm {
    NelderMead,
}

#[derive(Debug, Clone, Copy)]
pub struct Minimizer {
    pub algorithm: Algorithm,
    pub max_iters: u64,
    pub tolerance: f64,
}

/// `objective(x) + factor * barrier(x)`, evaluated against a scratch chronology.
struct BarrierProblem<'a, 'c> {
    objective: &'a dyn Objective,
    barrier: &'a Barrier<'a>,
    factor: f64,
    chrono: RefCell<&'c mut Chronology>,
}

impl CostFunction for BarrierProblem<'_, '_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        let mut chrono = self.chrono.borrow_mut();
        let value = self.objective.evaluate(x, &mut **chrono);
        Ok(value + self.factor * self.barrier.penalty(&chrono.time))
    }
}

impl BarrierProblem<'_, '_> {
    fn feasible(&self, x: &[f64]) -> bool {
        let mut chrono = self.chrono.borrow_mut();
        let largeval = self.barrier.largeval();
        self.objective.evaluate(x, &mut **chrono) < largeval
            && self.barrier.penalty(&chrono.time) < largeval
    }

    /// Start point plus one vertex per coordinate. A vertex that would land
    /// outside the feasible region is mirrored to the other side.
    fn initial_simplex(&self, start: &[f64]) -> Vec<Vec<f64>> {
        let mut vertices = Vec::with_capacity(start.len() + 1);
        vertices.push(start.to_vec());

        for i in 0..start.len() {
            let step = if start[i] == 0.0 {
                SIMPLEX_STEP
            } else {
                SIMPLEX_STEP * start[i].abs()
            };
            let mut vertex = start.to_vec();
            vertex[i] += step;
            if !self.feasible(&vertex) {
                vertex[i] = start[i] - step;
            }
            vertices.push(vertex);
        }

        vertices
    }
}

impl Minimizer {
    /// Minimizes the barrier-augmented objective from `start` and returns the
    /// best point found. `chrono` is used as scratch space.
    pub fn minimize(
        &self,
        objective: &dyn Objective,
        barrier: &Barrier,
        factor: f64,
        start: &[f64],
        chrono: &mut Chronology,
    ) -> SmoothResult<Vec<f64>> {
        if start.is_empty() {
            return Ok(Vec::new());
        }

        let problem = BarrierProblem {
            objective,
            barrier,
            factor,
            chrono: RefCell::new(chrono),
        };

        match self.algorithm {
            Algorithm::NelderMead => {
                let simplex = problem.initial_simplex(start);
                let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex)
                    .with_sd_tolerance(self.tolerance)
                    .map_err(solver_error)?;
                let max_iters = self.max_iters;

                let res = Executor::new(problem, solver)
                    .configure(|state| state.max_iters(max_iters))
                    .run()
                    .map_err(solver_error)?;

                res.state.best_param.ok_or_else(|| {
                    RateSmoothError::Solver("Nelder-Mead returned no best point".to_string())
                })
            }
        }
    }
}

fn solver_error(e: Error) -> RateSmoothError {
    RateSmoothError::Solver(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{build_array, Array};
    use crate::config::{BranchLengthFormat, Config};
    use crate::objective::NprsObjective;
    use crate::tree::prepare::preprocess;
    use crate::tree::Tree;
    use std::str::FromStr;

    // root fixed at 100 -> (A:10, B:10, X:6 -> (C:4, D:4))
    fn clock_array() -> Array {
        let mut t = Tree::new(Some("root"));
        t.node_mut(0).fix = Some(100.0);
        t.add_child(0, Some("A"), Some(10.0));
        t.add_child(0, Some("B"), Some(10.0));
        let x = t.add_child(0, Some("X"), Some(6.0));
        t.add_child(x, Some("C"), Some(4.0));
        t.add_child(x, Some("D"), Some(4.0));
        let mut cfg = Config::default();
        cfg.branch_length.format = BranchLengthFormat::Total;
        build_array(preprocess(&t, &cfg).unwrap()).unwrap()
    }

    fn minimizer() -> Minimizer {
        Minimizer {
            algorithm: Algorithm::NelderMead,
            max_iters: 2000,
            tolerance: 1e-14,
        }
    }

    #[test]
    fn test_algorithm_names() {
        assert_eq!(Algorithm::from_str("nelder_mead").unwrap(), Algorithm::NelderMead);
        assert_eq!(Algorithm::NelderMead.to_string(), "nelder_mead");
        assert!(Algorithm::from_str("simplex").is_err());
    }

    #[test]
    fn test_weak_barrier_finds_clock_age() {
        let a = clock_array();
        let objective = NprsObjective::new(&a, 2, false, 1e30);
        let barrier = Barrier::new(&a, 1e30);
        let mut chrono = a.chronology();
        let x = minimizer()
            .minimize(&objective, &barrier, 1e-9, &[70.0], &mut chrono)
            .unwrap();
        assert!((x[0] - 40.0).abs() < 0.05, "x = {:?}", x);
    }

    #[test]
    fn test_simplex_mirrors_infeasible_vertex() {
        let a = clock_array();
        let objective = NprsObjective::new(&a, 2, false, 1e30);
        let barrier = Barrier::new(&a, 1e30);
        let mut chrono = a.chronology();
        let problem = BarrierProblem {
            objective: &objective,
            barrier: &barrier,
            factor: 1.0,
            chrono: RefCell::new(&mut chrono),
        };
        // 99.5 + 1% crosses the fixed root at 100
        let simplex = problem.initial_simplex(&[99.5]);
        assert_eq!(simplex.len(), 2);
        assert!(simplex[1][0] < 99.5);
    }

    #[test]
    fn test_empty_start_is_noop() {
        let a = clock_array();
        let objective = NprsObjective::new(&a, 2, false, 1e30);
        let barrier = Barrier::new(&a, 1e30);
        let mut chrono = a.chronology();
        let x = minimizer()
            .minimize(&objective, &barrier, 1.0, &[], &mut chrono)
            .unwrap();
        assert!(x.is_empty());
    }
}
