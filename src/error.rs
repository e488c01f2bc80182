//! Error types shared by every sampler in the crate.

use thiserror::Error;

/// Boxed error produced by a fallible user likelihood.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A problem with the sampler configuration, detected before any iteration runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("at least one parameter is required")]
    NoParameters,
    #[error("parameter name {0:?} appears more than once")]
    DuplicateParameter(String),
    #[error("{what} has length {found}, expected one entry per parameter ({expected})")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("bound for parameter {index} is invalid: [{lo}, {hi}] (need finite lo < hi)")]
    InvalidBound { index: usize, lo: f64, hi: f64 },
    #[error("jump scale for parameter {index} must be positive and finite, got {value}")]
    InvalidJumpScale { index: usize, value: f64 },
    #[error("initial value {value} of parameter {index} lies outside [{lo}, {hi}]")]
    InitialPointOutOfBounds {
        index: usize,
        value: f64,
        lo: f64,
        hi: f64,
    },
    #[error("temperature ladder is invalid: {0}")]
    InvalidLadder(String),
    #[error("tuning configuration is invalid: {0}")]
    InvalidTuning(String),
    #[error("{0} must be positive")]
    NonPositive(&'static str),
}

/// Error type for sampler runs.
#[derive(Error, Debug)]
pub enum McmcError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("likelihood evaluation failed at {params:?}: {source}")]
    LikelihoodEvaluation {
        params: Vec<f64>,
        #[source]
        source: BoxError,
    },
    #[error("no in-bounds proposal for parameter {parameter} after {retries} draws")]
    NonTerminationRisk { parameter: usize, retries: usize },
    #[error("jump scale tuning did not settle after {rounds} rounds")]
    TuningExhausted { rounds: usize },
}

/// Convenience type for `Result<T, McmcError>`.
pub type McmcResult<T> = Result<T, McmcError>;
