//! Error types for the savings model.
//!
//! Configuration problems are fatal and surface before any iteration starts.
//! Failing to converge is not an error: it travels as
//! [`fixed_point::Status::MaxIterExceeded`] next to the best-effort result.

use thiserror::Error;

/// Invalid model configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("asset grid needs at least 2 points, got {0}")]
    TooFewGridPoints(usize),

    #[error("asset grid upper bound {a_max} must exceed lower bound {a_min}")]
    EmptyGridRange { a_min: f64, a_max: f64 },

    #[error("asset grid bounds must be finite, got [{a_min}, {a_max}]")]
    NonFiniteGridBound { a_min: f64, a_max: f64 },

    #[error("asset grid [{a_min}, {a_max}] is too narrow for {points} distinct points")]
    DegenerateGrid { a_min: f64, a_max: f64, points: usize },

    #[error("income process needs at least one state")]
    NoStates,

    #[error("transition matrix is {rows}x{cols}, expected {expected}x{expected}")]
    TransitionShape {
        rows: usize,
        cols: usize,
        expected: usize,
    },

    #[error("transition entry P[{row}][{col}] = {value} is outside [0, 1]")]
    TransitionEntry { row: usize, col: usize, value: f64 },

    #[error("transition row {row} sums to {sum}, expected 1")]
    RowNotStochastic { row: usize, sum: f64 },

    #[error("income in state {state} is not finite: {value}")]
    NonFiniteIncome { state: usize, value: f64 },

    #[error("discount factor {0} must lie in (0, 1)")]
    DiscountFactor(f64),

    #[error("risk aversion {0} must be finite and positive")]
    RiskAversion(f64),

    #[error("{name} = {value} must be a finite rate above -1")]
    ReturnRate { name: &'static str, value: f64 },

    #[error("{name} tolerance {value} must be finite and positive")]
    Tolerance { name: &'static str, value: f64 },

    #[error("{name} iteration cap must be positive")]
    IterationCap { name: &'static str },

    #[error("period length {0} weeks must be finite and positive")]
    PeriodLength(f64),

    #[error("thread count must be positive")]
    ThreadCount,
}

/// Top-level error type for the savings model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ModelError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type alias for the savings model.
pub type Result<T> = std::result::Result<T, ModelError>;
