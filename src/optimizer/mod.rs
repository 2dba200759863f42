pub mod initialization;
pub mod minimizer;
pub mod mutation;
pub mod runner;

use self::minimizer::Minimizer;
use crate::array::{Array, Chronology};
use crate::config::Config;
use crate::error::SmoothResult;
use crate::objective::{Barrier, Objective};
use serde::Serialize;
use tracing::debug;

/// Where a restart's barrier relaxation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RelaxationState {
    Iterating,
    /// The pure objective stopped improving, or hit exactly zero.
    Converged,
    /// Ran out of barrier rounds without converging. Not an error.
    LimitReached,
}

/// Barrier schedule and perturbation size, shared by every restart.
#[derive(Debug, Clone, Copy)]
pub struct RelaxationSettings {
    pub initial_factor: f64,
    pub multiplier: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub perturb_factor: f64,
    pub largeval: f64,
}

impl From<&Config> for RelaxationSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            initial_factor: cfg.barrier.initial_factor,
            multiplier: cfg.barrier.multiplier,
            tolerance: cfg.barrier.tolerance,
            max_iterations: cfg.barrier.max_iterations,
            perturb_factor: cfg.general.perturb_factor,
            largeval: cfg.general.largeval,
        }
    }
}

/// One multi-start attempt: a random guess refined by a sequence of barrier
/// rounds with a shrinking barrier weight.
pub struct Restart<'a> {
    array: &'a Array,
    objective: &'a dyn Objective,
    barrier: Barrier<'a>,
    minimizer: Minimizer,
    settings: RelaxationSettings,

    /// Working ages and rates; holds the perturbed start of the next round.
    chrono: Chronology,
    /// Ages and rates at the last minimized point.
    pub solution: Chronology,
    /// Pure objective at `solution`.
    pub value: f64,
    pub factor: f64,
    pub rounds: usize,
    pub state: RelaxationState,

    pub rng: fastrand::Rng,
}

impl<'a> Restart<'a> {
    pub fn new(
        array: &'a Array,
        objective: &'a dyn Objective,
        minimizer: Minimizer,
        settings: RelaxationSettings,
        seed: Option<u64>,
    ) -> SmoothResult<Self> {
        let mut rng = if let Some(s) = seed {
            fastrand::Rng::with_seed(s)
        } else {
            fastrand::Rng::new()
        };

        let mut chrono = array.chronology();
        initialization::generate_guess(array, &mut chrono.time, &mut rng)?;
        array.check(&chrono.time)?;

        let x = chrono.variables(array);
        let value = objective.evaluate(&x, &mut chrono);

        Ok(Self {
            array,
            objective,
            barrier: Barrier::new(array, settings.largeval),
            minimizer,
            settings,
            solution: chrono.clone(),
            chrono,
            value,
            factor: settings.initial_factor,
            rounds: 0,
            state: RelaxationState::Iterating,
            rng,
        })
    }

    /// Runs one barrier round. Returns the new state; a feasibility failure
    /// after perturbation is an error and ends the whole optimization.
    pub fn step(&mut self) -> SmoothResult<RelaxationState> {
        if self.state != RelaxationState::Iterating {
            return Ok(self.state);
        }

        let start = self.chrono.variables(self.array);
        let x = self.minimizer.minimize(
            self.objective,
            &self.barrier,
            self.factor,
            &start,
            &mut self.chrono,
        )?;

        let value = self.objective.evaluate(&x, &mut self.chrono);
        self.solution.clone_from(&self.chrono);
        self.rounds += 1;

        let previous = std::mem::replace(&mut self.value, value);
        let change = (previous - value).abs() / previous.abs();
        debug!(
            "Round {}: objective {:.6e} (change {:.3e}, barrier factor {:.3e})",
            self.rounds, value, change, self.factor
        );

        if value == 0.0 || change < self.settings.tolerance {
            self.state = RelaxationState::Converged;
        } else if self.rounds >= self.settings.max_iterations {
            self.state = RelaxationState::LimitReached;
        } else {
            self.factor *= self.settings.multiplier;
            mutation::perturb(
                self.array,
                &mut self.chrono.time,
                self.settings.perturb_factor,
                &mut self.rng,
            )?;
            self.array.check(&self.chrono.time)?;
        }

        Ok(self.state)
    }

    /// Steps until the restart leaves the iterating state.
    pub fn relax(&mut self) -> SmoothResult<RelaxationState> {
        while self.step()? == RelaxationState::Iterating {}
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::minimizer::Algorithm;
    use super::*;
    use crate::array::build_array;
    use crate::config::BranchLengthFormat;
    use crate::objective::NprsObjective;
    use crate::tree::prepare::preprocess;
    use crate::tree::Tree;

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
            tolerance: 1e-12,
        }
    }

    #[test]
    fn test_relaxation_reaches_clock_age() {
        let a = clock_array();
        let objective = NprsObjective::new(&a, 2, false, 1e30);
        let settings = RelaxationSettings::from(&Config::default());
        let mut restart = Restart::new(&a, &objective, minimizer(), settings, Some(42)).unwrap();

        let state = restart.relax().unwrap();
        assert_ne!(state, RelaxationState::Iterating);
        assert!(restart.rounds >= 1 && restart.rounds <= settings.max_iterations);
        assert!((restart.solution.time[3] - 40.0).abs() < 0.05);
        assert!(restart.value < 1e-6);
        a.check(&restart.solution.time).unwrap();
    }

    #[test]
    fn test_single_round_budget_hits_limit() {
        let a = clock_array();
        let objective = NprsObjective::new(&a, 2, false, 1e30);
        let mut settings = RelaxationSettings::from(&Config::default());
        settings.max_iterations = 1;
        settings.tolerance = 0.0;
        let mut restart = Restart::new(&a, &objective, minimizer(), settings, Some(7)).unwrap();
        let state = restart.step().unwrap();
        if restart.value != 0.0 {
            assert_eq!(state, RelaxationState::LimitReached);
        }
        assert_eq!(restart.rounds, 1);
        // Further steps are no-ops.
        assert_eq!(restart.step().unwrap(), state);
        assert_eq!(restart.rounds, 1);
    }

    #[test]
    fn test_factor_shrinks_between_rounds() {
        let a = clock_array();
        let objective = NprsObjective::new(&a, 2, false, 1e30);
        let mut settings = RelaxationSettings::from(&Config::default());
        settings.tolerance = 0.0;
        let mut restart = Restart::new(&a, &objective, minimizer(), settings, Some(9)).unwrap();
        if restart.step().unwrap() == RelaxationState::Iterating {
            assert!((restart.factor - 0.025).abs() < 1e-15);
        }
    }
}
