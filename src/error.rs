use thiserror::Error;

#[derive(Error, Debug)]
pub enum RateSmoothError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Invalid Tree: {0}")]
    InvalidTree(String),

    #[error("Invalid Constraint at node '{label}': {reason}")]
    InvalidConstraint { label: String, reason: String },

    #[error("Underconstrained: {0}")]
    Underconstrained(String),

    #[error("Constraint Violated at node '{label}': {reason}")]
    ConstraintViolated { label: String, reason: String },

    #[error("Solver Error: {0}")]
    Solver(String),
}

pub type SmoothResult<T> = Result<T, RateSmoothError>;

/// Renders a (low, fix, high) triple with unset members shown as `-`.
pub(crate) fn describe_bounds(low: Option<f64>, fix: Option<f64>, high: Option<f64>) -> String {
    let show = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{}", x));
    format!("low={}, fix={}, high={}", show(low), show(fix), show(high))
}
