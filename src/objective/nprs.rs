use super::Objective;
use crate::array::{Array, Chronology};

/// Sanderson's nonparametric rate smoothing criterion.
///
/// Penalizes rate differences between each edge and its parent edge. Edges
/// leaving the root have no parent edge and contribute the variance of their
/// rates instead.
pub struct NprsObjective<'a> {
    array: &'a Array,
    exponent: i32,
    logarithmic: bool,
    largeval: f64,
}

impl<'a> NprsObjective<'a> {
    pub fn new(array: &'a Array, exponent: i32, logarithmic: bool, largeval: f64) -> Self {
        Self {
            array,
            exponent,
            logarithmic,
            largeval,
        }
    }

    #[inline(always)]
    fn transform(&self, rate: f64) -> f64 {
        if self.logarithmic {
            rate.ln()
        } else {
            rate
        }
    }

    /// Penalty for the rates currently stored in `chrono`.
    pub fn penalty(&self, chrono: &Chronology) -> f64 {
        let a = self.array;
        let rate = &chrono.rate;

        let mut root_term = 0.0;
        let r = a.root_children.len();
        if r > 0 {
            let mut sum = 0.0;
            let mut sum_sq = 0.0;
            for &i in &a.root_children {
                let v = self.transform(rate[i]);
                sum += v;
                sum_sq += v * v;
            }
            let r = r as f64;
            root_term = ((sum_sq - sum * sum / r) / r).max(0.0);
        }

        let mut rest = 0.0;
        for &i in &a.inner_nodes {
            let d = self.transform(rate[a.parent[i]]) - self.transform(rate[i]);
            rest += if self.exponent == 2 {
                d * d
            } else {
                d.abs().powi(self.exponent)
            };
        }

        root_term + rest
    }
}

impl Objective for NprsObjective<'_> {
    fn evaluate(&self, x: &[f64], chrono: &mut Chronology) -> f64 {
        let a = self.array;
        chrono.set_variables(a, x);

        for i in 1..a.n {
            let dt = chrono.time[a.parent[i]] - chrono.time[i];
            // Also rejects NaN.
            if !(dt > 0.0) {
                return self.largeval;
            }
        }
        chrono.refresh_rates(a);

        self.penalty(chrono)
    }
}
