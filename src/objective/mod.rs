//! Objective functions scored by the optimizer.

pub mod barrier;
pub mod nprs;

pub use self::barrier::Barrier;
pub use self::nprs::NprsObjective;

use crate::array::{Array, Chronology};
use crate::config::Config;
use strum_macros::{Display, EnumIter, EnumString};

/// Rate-smoothing criteria that can be selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Method {
    Nprs,
}

/// A penalty over the free variables of an [`Array`].
///
/// `evaluate` writes `x` into the chronology's ages and refreshes its rates
/// as a side effect, so the barrier and reports can read them afterwards.
pub trait Objective: Send + Sync {
    fn evaluate(&self, x: &[f64], chrono: &mut Chronology) -> f64;
}

impl Method {
    pub fn build<'a>(self, array: &'a Array, config: &Config) -> Box<dyn Objective + 'a> {
        match self {
            Method::Nprs => Box::new(NprsObjective::new(
                array,
                config.method.exponent,
                config.method.logarithmic,
                config.general.largeval,
            )),
        }
    }
}
