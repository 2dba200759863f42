//! Entry points for callers that own a tree: prepare, optimize, materialize,
//! and a session type that ties them together across repeated runs.

use crate::array::{build_array, Array};
use crate::config::Config;
use crate::error::{RateSmoothError, SmoothResult};
use crate::optimizer::runner::{
    Diagnostics, OptimizationOptions, Optimizer, ProgressCallback, Silent,
};
use crate::tree::prepare::{ground, preprocess};
use crate::tree::Tree;
use tracing::info;

/// Best outcome of a multi-start optimization.
#[derive(Debug, Clone)]
pub struct Optimization {
    /// Free ages of the best restart, in `variable_index` order.
    pub variables: Vec<f64>,
    pub value: f64,
    pub diagnostics: Diagnostics,
}

/// Preprocesses `tree` into a fresh [`Array`].
///
/// The configuration is validated first. On success, leaf grounding is
/// written back onto `tree`; on failure `tree` is left untouched.
pub fn prepare(tree: &mut Tree, config: &Config) -> SmoothResult<Array> {
    config.validate()?;
    let pre = preprocess(tree, config)?;
    let grounded = pre.grounded;
    let array = build_array(pre)?;
    if grounded {
        ground(tree);
    }
    Ok(array)
}

/// Runs every restart and stores the best ages and rates in `array`.
pub fn optimize<CB: ProgressCallback>(
    array: &mut Array,
    config: &Config,
    callback: &CB,
) -> SmoothResult<Optimization> {
    let strategy = config.validate()?;
    let result = {
        let objective = strategy.method.build(array, config);
        let options = OptimizationOptions::new(config, strategy);
        Optimizer::new(array, objective.as_ref(), options).run(callback)?
    };

    array.check(&result.chronology.time)?;
    array.adopt(result.chronology);

    Ok(Optimization {
        variables: result.variables,
        value: result.value,
        diagnostics: result.diagnostics,
    })
}

/// Copy of the working tree annotated with every node's age and rate.
pub fn materialize(array: &Array) -> Tree {
    array.materialize()
}

/// Everything one [`Analysis::run`] produces.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub dated: Tree,
    pub array: Array,
    pub optimization: Optimization,
}

impl AnalysisReport {
    /// Constraints relocated by branch collapsing, plus the iteration-limit
    /// warning when it applies.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = self.array.warnings.clone();
        if self.optimization.diagnostics.limit_reached {
            out.push("barrier iteration limit reached before convergence".to_string());
        }
        out
    }
}

/// A user tree plus configuration that can be dated, re-calibrated by label
/// and dated again.
pub struct Analysis {
    pub tree: Tree,
    pub config: Config,
}

impl Analysis {
    pub fn new(tree: Tree, config: Config) -> Self {
        Self { tree, config }
    }

    pub fn set_fix(&mut self, label: &str, age: Option<f64>) -> SmoothResult<()> {
        let id = self.locate(label, age)?;
        self.tree.node_mut(id).fix = age;
        Ok(())
    }

    pub fn set_min(&mut self, label: &str, age: Option<f64>) -> SmoothResult<()> {
        let id = self.locate(label, age)?;
        self.tree.node_mut(id).min = age;
        Ok(())
    }

    pub fn set_max(&mut self, label: &str, age: Option<f64>) -> SmoothResult<()> {
        let id = self.locate(label, age)?;
        self.tree.node_mut(id).max = age;
        Ok(())
    }

    pub fn clear_constraints(&mut self, label: &str) -> SmoothResult<()> {
        let id = self.locate(label, None)?;
        self.tree.node_mut(id).clear_constraints();
        Ok(())
    }

    fn locate(&self, label: &str, age: Option<f64>) -> SmoothResult<usize> {
        if let Some(a) = age {
            if !(a.is_finite() && a >= 0.0) {
                return Err(RateSmoothError::InvalidConstraint {
                    label: label.to_string(),
                    reason: format!("age must be a non-negative number, got {}", a),
                });
            }
        }
        self.tree
            .find(label)
            .ok_or_else(|| RateSmoothError::InvalidConstraint {
                label: label.to_string(),
                reason: "no node carries this label".to_string(),
            })
    }

    pub fn run(&mut self) -> SmoothResult<AnalysisReport> {
        self.run_with(&Silent)
    }

    pub fn run_with<CB: ProgressCallback>(&mut self, callback: &CB) -> SmoothResult<AnalysisReport> {
        let mut array = prepare(&mut self.tree, &self.config)?;
        let optimization = optimize(&mut array, &self.config, callback)?;
        let dated = materialize(&array);
        info!(
            "Analysis finished: objective {:.6e}, {} free age(s)",
            optimization.value,
            optimization.variables.len()
        );
        Ok(AnalysisReport {
            dated,
            array,
            optimization,
        })
    }
}
