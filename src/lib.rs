pub mod api;
pub mod array;
pub mod config;
pub mod error;
pub mod objective;
pub mod optimizer;
pub mod tree;
// cmd and reports are binary modules (see main.rs).

pub use api::{materialize, optimize, prepare, Analysis, AnalysisReport, Optimization};
pub use array::Array;
pub use config::Config;
pub use error::{RateSmoothError, SmoothResult};
pub use tree::{NodeSpec, Tree};
