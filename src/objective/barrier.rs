use crate::array::Array;

/// Log-free interior barrier over the bounded free nodes.
///
/// Grows without limit as an age approaches one of its propagated bounds and
/// returns `largeval` once an age touches or crosses one.
pub struct Barrier<'a> {
    array: &'a Array,
    largeval: f64,
}

impl<'a> Barrier<'a> {
    pub fn new(array: &'a Array, largeval: f64) -> Self {
        Self { array, largeval }
    }

    pub fn largeval(&self) -> f64 {
        self.largeval
    }

    pub fn penalty(&self, time: &[f64]) -> f64 {
        let a = self.array;
        let mut total = 0.0;
        for &i in &a.constrained {
            let t = time[i];
            let low_gap = a.low[i].map_or(f64::INFINITY, |l| t - l);
            let high_gap = a.high[i].map_or(f64::INFINITY, |h| h - t);
            if !(low_gap > 0.0 && high_gap > 0.0) {
                return self.largeval;
            }
            total += 1.0 / low_gap + 1.0 / high_gap;
        }
        total
    }
}
