use crate::error::{RateSmoothError, SmoothResult};
use crate::objective::Method;
use crate::optimizer::minimizer::Algorithm;
use clap::{parser::ValueSource, ArgAction, ArgMatches, Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::Display;

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    #[command(flatten)]
    pub branch_length: BranchLengthParams,
    #[command(flatten)]
    pub general: GeneralParams,
    #[command(flatten)]
    pub method: MethodParams,
    #[command(flatten)]
    pub barrier: BarrierParams,
}

/// How raw edge lengths are turned into substitution counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BranchLengthFormat {
    /// Lengths already are substitution counts.
    Total,
    /// Lengths are substitutions per site; multiplied by `nsites`.
    Persite,
    /// Multiplier picked so the longest branch reaches four integer digits.
    Guess,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchLengthParams {
    #[arg(long, value_enum, default_value_t = BranchLengthFormat::Guess)]
    pub format: BranchLengthFormat,
    #[arg(long)]
    pub nsites: Option<u64>,
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub round: bool,
}

impl Default for BranchLengthParams {
    fn default() -> Self {
        Self {
            format: BranchLengthFormat::Guess,
            nsites: None,
            round: true,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralParams {
    #[arg(long, default_value_t = false)]
    pub scalar: bool,
    #[arg(long = "guesses", default_value_t = 10)]
    pub number_of_guesses: usize,
    #[arg(long, default_value_t = 0.01)]
    pub perturb_factor: f64,
    #[arg(long, default_value_t = 1e30)]
    pub largeval: f64,
    /// 0 draws from the process-wide generator.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
    /// Treat constraints moved by branch collapsing as errors.
    #[arg(long, default_value_t = false)]
    pub strict: bool,
    #[arg(long, default_value_t = false)]
    pub parallel: bool,
}

impl Default for GeneralParams {
    fn default() -> Self {
        Self {
            scalar: false,
            number_of_guesses: 10,
            perturb_factor: 0.01,
            largeval: 1e30,
            seed: 0,
            strict: false,
            parallel: false,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodParams {
    #[arg(long, default_value = "nprs")]
    pub method: String,
    #[arg(long, default_value = "nelder_mead")]
    pub algorithm: String,
    #[arg(long, default_value_t = 2)]
    pub exponent: i32,
    #[arg(long, default_value_t = false)]
    pub logarithmic: bool,
    #[arg(long, default_value_t = 2000)]
    pub solver_iterations: u64,
    #[arg(long, default_value_t = 1e-12)]
    pub solver_tolerance: f64,
}

impl Default for MethodParams {
    fn default() -> Self {
        Self {
            method: "nprs".to_string(),
            algorithm: "nelder_mead".to_string(),
            exponent: 2,
            logarithmic: false,
            solver_iterations: 2000,
            solver_tolerance: 1e-12,
        }
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierParams {
    #[arg(long = "barrier-iterations", default_value_t = 10)]
    pub max_iterations: usize,
    #[arg(long, default_value_t = 0.25)]
    pub initial_factor: f64,
    #[arg(long, default_value_t = 0.10)]
    pub multiplier: f64,
    #[arg(long = "barrier-tolerance", default_value_t = 0.0001)]
    pub tolerance: f64,
}

impl Default for BarrierParams {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            initial_factor: 0.25,
            multiplier: 0.10,
            tolerance: 0.0001,
        }
    }
}

/// Objective and solver resolved from their configured names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    pub method: Method,
    pub algorithm: Algorithm,
}

/// Comma-separated names of every variant, for error messages.
fn known_names<E: IntoEnumIterator + std::fmt::Display>() -> String {
    E::iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SmoothResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SmoothResult<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The seed to use, if the run should be reproducible.
    pub fn seed(&self) -> Option<u64> {
        match self.general.seed {
            0 => None,
            s => Some(s),
        }
    }

    /// Checks ranges and resolves method names. Runs before any tree work.
    pub fn validate(&self) -> SmoothResult<Strategy> {
        let method = Method::from_str(self.method.method.trim()).map_err(|_| {
            RateSmoothError::Config(format!(
                "Unknown method '{}' (expected one of: {})",
                self.method.method,
                known_names::<Method>()
            ))
        })?;
        let algorithm = Algorithm::from_str(self.method.algorithm.trim()).map_err(|_| {
            RateSmoothError::Config(format!(
                "Unknown algorithm '{}' (expected one of: {})",
                self.method.algorithm,
                known_names::<Algorithm>()
            ))
        })?;

        let bl = &self.branch_length;
        match (bl.format, bl.nsites) {
            (BranchLengthFormat::Persite, None) => {
                return Err(RateSmoothError::Config(
                    "branch_length.nsites is required when format is persite".to_string(),
                ))
            }
            (BranchLengthFormat::Persite, Some(0)) => {
                return Err(RateSmoothError::Config(
                    "branch_length.nsites must be positive".to_string(),
                ))
            }
            _ => {}
        }

        let g = &self.general;
        if g.number_of_guesses < 1 {
            return Err(RateSmoothError::Config(
                "general.number_of_guesses must be at least 1".to_string(),
            ));
        }
        if !(g.perturb_factor > 0.0 && g.perturb_factor < 1.0) {
            return Err(RateSmoothError::Config(format!(
                "general.perturb_factor must lie in (0, 1), got {}",
                g.perturb_factor
            )));
        }
        if !(g.largeval.is_finite() && g.largeval > 0.0) {
            return Err(RateSmoothError::Config(format!(
                "general.largeval must be a positive finite number, got {}",
                g.largeval
            )));
        }

        if self.method.exponent < 1 {
            return Err(RateSmoothError::Config(format!(
                "method.exponent must be at least 1, got {}",
                self.method.exponent
            )));
        }
        if self.method.solver_tolerance < 0.0 {
            return Err(RateSmoothError::Config(
                "method.solver_tolerance must not be negative".to_string(),
            ));
        }

        let b = &self.barrier;
        if b.max_iterations < 1 {
            return Err(RateSmoothError::Config(
                "barrier.max_iterations must be at least 1".to_string(),
            ));
        }
        if !(b.initial_factor > 0.0) {
            return Err(RateSmoothError::Config(format!(
                "barrier.initial_factor must be positive, got {}",
                b.initial_factor
            )));
        }
        if !(b.multiplier > 0.0 && b.multiplier < 1.0) {
            return Err(RateSmoothError::Config(format!(
                "barrier.multiplier must lie in (0, 1), got {}",
                b.multiplier
            )));
        }
        if b.tolerance < 0.0 {
            return Err(RateSmoothError::Config(
                "barrier.tolerance must not be negative".to_string(),
            ));
        }

        Ok(Strategy { method, algorithm })
    }

    /// Copies over only the values the user typed on the command line,
    /// leaving file-loaded values in place for everything else.
    pub fn merge_from_cli(&mut self, cli: &Config, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($section:ident . $field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$section.$field = cli.$section.$field.clone();
                }
            };
        }

        update_if_present!(branch_length.format);
        update_if_present!(branch_length.nsites);
        update_if_present!(branch_length.round);

        update_if_present!(general.scalar);
        update_if_present!(general.number_of_guesses);
        update_if_present!(general.perturb_factor);
        update_if_present!(general.largeval);
        update_if_present!(general.seed);
        update_if_present!(general.strict);
        update_if_present!(general.parallel);

        update_if_present!(method.method);
        update_if_present!(method.algorithm);
        update_if_present!(method.exponent);
        update_if_present!(method.logarithmic);
        update_if_present!(method.solver_iterations);
        update_if_present!(method.solver_tolerance);

        update_if_present!(barrier.max_iterations);
        update_if_present!(barrier.initial_factor);
        update_if_present!(barrier.multiplier);
        update_if_present!(barrier.tolerance);
    }
}
