use crate::array::{Array, Chronology};
use crate::config::{Config, Strategy};
use crate::error::{RateSmoothError, SmoothResult};
use crate::objective::Objective;
use crate::optimizer::minimizer::Minimizer;
use crate::optimizer::{RelaxationSettings, RelaxationState, Restart};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

pub struct OptimizationOptions {
    pub restarts: usize,
    pub seed: Option<u64>,
    pub parallel: bool,
    pub minimizer: Minimizer,
    pub relaxation: RelaxationSettings,
}

impl OptimizationOptions {
    pub fn new(cfg: &Config, strategy: Strategy) -> Self {
        Self {
            restarts: cfg.general.number_of_guesses,
            seed: cfg.seed(),
            parallel: cfg.general.parallel,
            minimizer: Minimizer {
                algorithm: strategy.algorithm,
                max_iters: cfg.method.solver_iterations,
                tolerance: cfg.method.solver_tolerance,
            },
            relaxation: RelaxationSettings::from(cfg),
        }
    }
}

/// Outcome of one restart, kept for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RestartSummary {
    pub restart: usize,
    pub value: f64,
    pub rounds: usize,
    pub state: RelaxationState,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub restarts: Vec<RestartSummary>,
    pub best_restart: Option<usize>,
    /// The best restart ran out of barrier rounds without converging.
    pub limit_reached: bool,
    /// The callback asked to stop; results are the best seen until then.
    pub cancelled: bool,
}

pub struct OptimizationResult {
    /// Best free-variable vector, in `variable_index` order.
    pub variables: Vec<f64>,
    pub value: f64,
    pub chronology: Chronology,
    pub diagnostics: Diagnostics,
}

/// A trait for receiving updates during optimization.
/// Boolean return value indicates if the search should continue (true) or abort (false).
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, restart: usize, round: usize, value: f64) -> bool;
}

/// Callback that never stops the search.
pub struct Silent;

impl ProgressCallback for Silent {
    fn on_progress(&self, _restart: usize, _round: usize, _value: f64) -> bool {
        true
    }
}

struct Finished {
    summary: RestartSummary,
    solution: Chronology,
}

pub struct Optimizer<'a> {
    array: &'a Array,
    objective: &'a dyn Objective,
    options: OptimizationOptions,
}

impl<'a> Optimizer<'a> {
    pub fn new(array: &'a Array, objective: &'a dyn Objective, options: OptimizationOptions) -> Self {
        Self {
            array,
            objective,
            options,
        }
    }

    pub fn run<CB: ProgressCallback>(&self, callback: &CB) -> SmoothResult<OptimizationResult> {
        if self.array.variable_index.is_empty() {
            return self.evaluate_fixed();
        }

        let opts = &self.options;
        let stop = AtomicBool::new(false);

        let finished: Vec<Finished> = if opts.parallel {
            (0..opts.restarts)
                .into_par_iter()
                .map(|k| self.run_restart(k, callback, &stop))
                .collect::<SmoothResult<Vec<_>>>()?
                .into_iter()
                .flatten()
                .collect()
        } else {
            let mut done = Vec::with_capacity(opts.restarts);
            for k in 0..opts.restarts {
                if let Some(f) = self.run_restart(k, callback, &stop)? {
                    done.push(f);
                }
            }
            done
        };

        // Lowest value wins; ties go to the earlier restart.
        let best = finished
            .iter()
            .min_by(|a, b| {
                a.summary
                    .value
                    .total_cmp(&b.summary.value)
                    .then(a.summary.restart.cmp(&b.summary.restart))
            })
            .ok_or_else(|| {
                RateSmoothError::Solver("no restart produced a result".to_string())
            })?;

        let diagnostics = Diagnostics {
            restarts: finished.iter().map(|f| f.summary.clone()).collect(),
            best_restart: Some(best.summary.restart),
            limit_reached: best.summary.state == RelaxationState::LimitReached,
            cancelled: stop.load(Ordering::Relaxed),
        };

        info!(
            "Best of {} restart(s): #{} with objective {:.6e} ({})",
            finished.len(),
            best.summary.restart,
            best.summary.value,
            best.summary.state
        );
        if diagnostics.limit_reached {
            warn!(
                "Barrier iteration limit reached before convergence; result may not be optimal"
            );
        }

        Ok(OptimizationResult {
            variables: best.solution.variables(self.array),
            value: best.summary.value,
            chronology: best.solution.clone(),
            diagnostics,
        })
    }

    /// Returns `None` only if the search was stopped before this restart began.
    fn run_restart<CB: ProgressCallback>(
        &self,
        k: usize,
        callback: &CB,
        stop: &AtomicBool,
    ) -> SmoothResult<Option<Finished>> {
        if stop.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let opts = &self.options;
        // Wraps near u64::MAX so every valid seed works.
        let seed = opts.seed.map(|s| s.wrapping_add(k as u64));
        let mut restart = Restart::new(
            self.array,
            self.objective,
            opts.minimizer,
            opts.relaxation,
            seed,
        )?;

        loop {
            let state = restart.step()?;
            if !callback.on_progress(k, restart.rounds, restart.value) {
                if !stop.swap(true, Ordering::Relaxed) {
                    warn!("Optimization cancelled during restart #{}", k);
                }
                break;
            }
            if state != RelaxationState::Iterating || stop.load(Ordering::Relaxed) {
                break;
            }
        }

        info!(
            "Restart #{}: objective {:.6e} after {} round(s), {}",
            k, restart.value, restart.rounds, restart.state
        );

        Ok(Some(Finished {
            summary: RestartSummary {
                restart: k,
                value: restart.value,
                rounds: restart.rounds,
                state: restart.state,
            },
            solution: restart.solution,
        }))
    }

    /// Every age is fixed: score the fixed times once.
    fn evaluate_fixed(&self) -> SmoothResult<OptimizationResult> {
        let mut chrono = self.array.chronology();
        self.array.check(&chrono.time)?;
        let value = self.objective.evaluate(&[], &mut chrono);
        info!("No free ages; objective at the fixed times is {:.6e}", value);

        Ok(OptimizationResult {
            variables: Vec::new(),
            value,
            chronology: chrono,
            diagnostics: Diagnostics {
                restarts: vec![RestartSummary {
                    restart: 0,
                    value,
                    rounds: 0,
                    state: RelaxationState::Converged,
                }],
                best_restart: Some(0),
                limit_reached: false,
                cancelled: false,
            },
        })
    }
}
