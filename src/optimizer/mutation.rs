use crate::array::Array;
use crate::error::{RateSmoothError, SmoothResult};
use fastrand::Rng;

/// Nudges every free age by at most `factor` of its value while keeping the
/// whole assignment feasible.
///
/// Runs bottom-up so each node already knows the new ages of its children,
/// which become its floor. The ceiling is its parent's current age.
pub fn perturb(array: &Array, time: &mut [f64], factor: f64, rng: &mut Rng) -> SmoothResult<()> {
    if let Some(&i) = array.variable_index.iter().find(|&&i| !time[i].is_finite()) {
        return Err(RateSmoothError::Solver(format!(
            "cannot perturb before a complete guess exists (node '{}' has no age)",
            array.labels[i]
        )));
    }

    for &i in array.variable_index.iter().rev() {
        let v = time[i];
        let mut lo = v * (1.0 - factor);
        let mut hi = v * (1.0 + factor);

        if let Some(h) = array.high[i] {
            hi = hi.min(h);
        }
        if i > 0 {
            hi = hi.min(time[array.parent[i]]);
        }
        if let Some(l) = array.low[i] {
            lo = lo.max(l);
        }
        for &c in &array.children[i] {
            lo = lo.max(time[c]);
        }

        if lo < hi {
            time[i] = lo + (hi - lo) * rng.f64();
        }
    }

    Ok(())
}
