use crate::array::Array;
use crate::error::{RateSmoothError, SmoothResult};
use fastrand::Rng;

/// Uniform draw in [0.02, 0.98]; keeps every guess clear of its bounds.
#[inline(always)]
fn margin(rng: &mut Rng) -> f64 {
    0.02 + 0.96 * rng.f64()
}

/// Writes a random, feasible age into every free slot of `time`.
///
/// Works top-down: each node's window is the tightest ceiling known so far
/// (its own high bound or the age just drawn for its parent) and free ages
/// are drawn below it. Nodes of high order are kept further from their low
/// bound so their subtrees keep room underneath.
pub fn generate_guess(array: &Array, time: &mut [f64], rng: &mut Rng) -> SmoothResult<()> {
    let n = array.n;
    let mut window: Vec<Option<f64>> = vec![None; n];

    if array.is_free(0) {
        let low = array.low[0].filter(|&l| l > 0.0);
        let age = match (low, array.high[0]) {
            (Some(l), Some(h)) => h - (h - l) * margin(rng),
            (Some(l), None) => 1.25 * l,
            (None, Some(h)) => 0.75 * h,
            (None, None) => {
                let ceiling = array
                    .high
                    .iter()
                    .flatten()
                    .copied()
                    .reduce(f64::max)
                    .ok_or_else(|| {
                        RateSmoothError::Underconstrained(
                            "no upper bound to anchor the root age guess".to_string(),
                        )
                    })?;
                1.25 * ceiling
            }
        };
        time[0] = age;
        window[0] = Some(age);
    } else {
        window[0] = array.high[0];
    }

    for i in 1..n {
        let inherited = window[array.parent[i]];
        let w = match (array.high[i], inherited) {
            (Some(h), Some(p)) => Some(h.min(p)),
            (h, p) => h.or(p),
        };
        window[i] = w;

        if array.is_free(i) {
            let w = w.ok_or_else(|| {
                RateSmoothError::Underconstrained(format!(
                    "node '{}' has no ceiling to draw an age below",
                    array.labels[i]
                ))
            })?;
            let low = array.low[i].unwrap_or(0.0);
            let depth = (array.order[i] as f64 + 3.0).ln();
            let age = w - (w - low) * margin(rng) / depth;
            time[i] = age;
            window[i] = Some(age);
        }
    }

    Ok(())
}
