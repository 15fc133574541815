//! Metric evaluation over item result history
//!
//! Stateless aggregate functions the expression engine calls to test
//! trigger conditions. None of them mutate the set they read.

pub mod evaluator;
pub mod functions;
pub mod window;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use evaluator::Evaluator;
pub use functions::MetricFunction;

/// Divisor used by `avg`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AvgMode {
    /// Sum of the window divided by the window length
    #[default]
    Window,
    /// Sum of the window divided by the length of the whole set.
    /// Kept for parity with result histories evaluated by older releases.
    FullLength,
}

impl FromStr for AvgMode {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "window" => Ok(AvgMode::Window),
            "full-length" | "full_length" | "legacy" => Ok(AvgMode::FullLength),
            other => Err(EvalError::InvalidArgument(format!("unknown avg mode '{}'", other))),
        }
    }
}

/// Evaluation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("{0} can't be called on text results")]
    TypeMismatch(&'static str),

    #[error("There are no results to evaluate")]
    NoResults,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avg_mode_from_str() {
        assert_eq!("window".parse::<AvgMode>(), Ok(AvgMode::Window));
        assert_eq!("Full-Length".parse::<AvgMode>(), Ok(AvgMode::FullLength));
        assert!(matches!(
            "median".parse::<AvgMode>(),
            Err(EvalError::InvalidArgument(_))
        ));
    }
}
