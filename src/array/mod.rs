//! Flat, preorder-indexed view of a preprocessed tree.
//!
//! Index 0 is the root and every node's index is smaller than those of its
//! descendants, so a forward scan visits parents first and a backward scan
//! visits children first.

pub mod builder;

pub use self::builder::build_array;

use crate::error::{describe_bounds, RateSmoothError, SmoothResult};
use crate::tree::{NodeId, Tree};

#[derive(Debug, Clone)]
pub struct Array {
    pub n: usize,
    pub parent: Vec<usize>,
    pub subs: Vec<f64>,
    pub fix: Vec<Option<f64>>,
    pub low: Vec<Option<f64>>,
    pub high: Vec<Option<f64>>,
    pub order: Vec<usize>,
    pub labels: Vec<String>,
    pub children: Vec<Vec<usize>>,

    /// Free nodes, in preorder. These are the optimization variables.
    pub variable_index: Vec<usize>,
    /// Non-root nodes hanging directly off the root.
    pub root_children: Vec<usize>,
    /// Non-root nodes whose parent is not the root.
    pub inner_nodes: Vec<usize>,
    /// Free nodes with at least one propagated bound.
    pub constrained: Vec<usize>,

    pub time: Vec<f64>,
    pub rate: Vec<f64>,

    /// Preprocessed working tree and the arena id of every index.
    pub tree: Tree,
    pub node_ids: Vec<NodeId>,
    pub terminal_zero: Vec<NodeId>,
    pub multiplier: f64,
    pub warnings: Vec<String>,
}

/// Mutable ages and rates for one optimization attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Chronology {
    pub time: Vec<f64>,
    pub rate: Vec<f64>,
}

impl Chronology {
    /// Current values of the free variables.
    pub fn variables(&self, array: &Array) -> Vec<f64> {
        array.variable_index.iter().map(|&i| self.time[i]).collect()
    }

    pub fn set_variables(&mut self, array: &Array, x: &[f64]) {
        for (&i, &v) in array.variable_index.iter().zip(x) {
            self.time[i] = v;
        }
    }

    /// Recomputes every edge rate from the current ages.
    pub fn refresh_rates(&mut self, array: &Array) {
        self.rate[0] = 0.0;
        for i in 1..array.n {
            let dt = self.time[array.parent[i]] - self.time[i];
            self.rate[i] = array.subs[i] / dt;
        }
    }
}

impl Array {
    /// Fresh copy of the mutable state.
    pub fn chronology(&self) -> Chronology {
        Chronology {
            time: self.time.clone(),
            rate: self.rate.clone(),
        }
    }

    pub fn adopt(&mut self, chrono: Chronology) {
        self.time = chrono.time;
        self.rate = chrono.rate;
    }

    pub fn is_root(&self, i: usize) -> bool {
        i == 0
    }

    pub fn is_free(&self, i: usize) -> bool {
        self.fix[i].is_none()
    }

    /// Verifies strict ancestor ordering and every propagated bound.
    pub fn check(&self, time: &[f64]) -> SmoothResult<()> {
        for i in 0..self.n {
            let t = time[i];
            let violation = |reason: String| RateSmoothError::ConstraintViolated {
                label: self.labels[i].clone(),
                reason,
            };
            if !t.is_finite() {
                return Err(violation(format!("age is not a finite number ({})", t)));
            }
            if i > 0 {
                let p = self.parent[i];
                if t >= time[p] {
                    return Err(violation(format!(
                        "age {} is not younger than parent '{}' at {}",
                        t, self.labels[p], time[p]
                    )));
                }
            }
            let out_low = self.low[i].is_some_and(|l| t < l);
            let out_high = self.high[i].is_some_and(|h| t > h);
            if out_low || out_high {
                return Err(violation(format!(
                    "age {} outside bounds ({})",
                    t,
                    describe_bounds(self.low[i], self.fix[i], self.high[i])
                )));
            }
        }
        Ok(())
    }

    /// Copy of the working tree with `age` and `rate` filled in from the
    /// current state. Terminal zeros report age 0 and rate 0.
    pub fn materialize(&self) -> Tree {
        let mut tree = self.tree.clone();
        for (i, &id) in self.node_ids.iter().enumerate() {
            let node = tree.node_mut(id);
            node.age = Some(self.time[i]).filter(|t| t.is_finite());
            node.rate = if i == 0 {
                Some(0.0)
            } else {
                Some(self.rate[i]).filter(|r| r.is_finite())
            };
        }
        for &id in &self.terminal_zero {
            let node = tree.node_mut(id);
            node.age = Some(0.0);
            node.rate = Some(0.0);
        }
        tree
    }
}

/// Maximum of the set values; unset if none are set.
pub fn max_set(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().reduce(f64::max)
}

/// Minimum of the set values; unset if none are set.
pub fn min_set(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().reduce(f64::min)
}
