//! Named metric functions for the expression engine
//!
//! The expression engine passes every argument as `f64`, so limits arrive as
//! floats and are validated here before they reach the window functions.

use std::fmt;
use std::str::FromStr;

use super::{AvgMode, EvalError};
use crate::models::ResultSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricFunction {
    Min,
    Max,
    Avg,
    Diff,
    Last,
}

impl MetricFunction {
    pub const ALL: [MetricFunction; 5] = [
        MetricFunction::Min,
        MetricFunction::Max,
        MetricFunction::Avg,
        MetricFunction::Diff,
        MetricFunction::Last,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetricFunction::Min => "min",
            MetricFunction::Max => "max",
            MetricFunction::Avg => "avg",
            MetricFunction::Diff => "diff",
            MetricFunction::Last => "last",
        }
    }

    /// Whether the function takes an optional window limit
    pub fn takes_limit(&self) -> bool {
        matches!(
            self,
            MetricFunction::Min | MetricFunction::Max | MetricFunction::Avg
        )
    }

    /// Evaluate against a result set.
    ///
    /// The set is type-checked before the arguments are.
    pub fn apply(&self, set: &ResultSet, args: &[f64], avg_mode: AvgMode) -> Result<f64, EvalError> {
        set.ensure_numeric(self.name())?;
        let limit = self.parse_args(args)?;

        match self {
            MetricFunction::Min => set.min(limit),
            MetricFunction::Max => set.max(limit),
            MetricFunction::Avg => set.avg_with_mode(limit, avg_mode),
            MetricFunction::Diff => set.diff(),
            MetricFunction::Last => set.last_numeric(),
        }
    }

    fn parse_args(&self, args: &[f64]) -> Result<usize, EvalError> {
        if !self.takes_limit() {
            if !args.is_empty() {
                return Err(EvalError::InvalidArgument(format!(
                    "{}() takes no arguments, got {}",
                    self.name(),
                    args.len()
                )));
            }
            return Ok(0);
        }

        match args {
            [] => Ok(0),
            [limit] => limit_from_f64(*limit),
            _ => Err(EvalError::InvalidArgument(format!(
                "{}() takes at most one argument, got {}",
                self.name(),
                args.len()
            ))),
        }
    }
}

fn limit_from_f64(limit: f64) -> Result<usize, EvalError> {
    if !limit.is_finite() || limit < 0.0 {
        return Err(EvalError::InvalidArgument(format!(
            "limit must be a non-negative number, got {}",
            limit
        )));
    }
    Ok(limit.trunc() as usize)
}

impl fmt::Display for MetricFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricFunction {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "min" => Ok(MetricFunction::Min),
            "max" => Ok(MetricFunction::Max),
            "avg" => Ok(MetricFunction::Avg),
            "diff" => Ok(MetricFunction::Diff),
            "last" | "lastnumeric" => Ok(MetricFunction::Last),
            _ => Err(EvalError::UnknownFunction(s.to_string())),
        }
    }
}
