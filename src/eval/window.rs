//! Windowed aggregates on `ResultSet`

use super::{AvgMode, EvalError};
use crate::models::{CheckResult, ResultSet, ReturnType};

/// Running extremum seeded by the first value it sees
#[derive(Debug, Clone, Copy)]
struct Extremum {
    current: Option<f64>,
    keep_lower: bool,
}

impl Extremum {
    fn min() -> Self {
        Self {
            current: None,
            keep_lower: true,
        }
    }

    fn max() -> Self {
        Self {
            current: None,
            keep_lower: false,
        }
    }

    fn accumulate(&mut self, value: f64) {
        match self.current {
            None => self.current = Some(value),
            Some(current) => {
                let replace = if self.keep_lower {
                    value < current
                } else {
                    value > current
                };
                if replace {
                    self.current = Some(value);
                }
            }
        }
    }

    fn result(&self) -> f64 {
        self.current.unwrap_or(0.0)
    }
}

impl ResultSet {
    /// Newest `limit` results; 0 or anything beyond the set length means all
    pub fn window(&self, limit: usize) -> &[CheckResult] {
        if limit == 0 || limit >= self.results.len() {
            &self.results
        } else {
            &self.results[..limit]
        }
    }

    pub(crate) fn ensure_numeric(&self, function: &'static str) -> Result<(), EvalError> {
        if self.kind() == ReturnType::Text {
            tracing::error!(function, "Numeric function called on text results");
            return Err(EvalError::TypeMismatch(function));
        }
        self.ensure_uniform(function)
    }

    fn ensure_uniform(&self, function: &'static str) -> Result<(), EvalError> {
        if !self.is_uniform() {
            tracing::error!(function, results = self.results.len(), "Result set mixes return kinds");
            return Err(EvalError::TypeMismatch(function));
        }
        Ok(())
    }

    /// Smallest value among the newest `limit` results (0.0 when empty)
    pub fn min(&self, limit: usize) -> Result<f64, EvalError> {
        self.ensure_numeric("min")?;

        let mut acc = Extremum::min();
        for result in self.window(limit) {
            acc.accumulate(result.value_numeric);
        }
        Ok(acc.result())
    }

    /// Largest value among the newest `limit` results (0.0 when empty)
    pub fn max(&self, limit: usize) -> Result<f64, EvalError> {
        self.ensure_numeric("max")?;

        let mut acc = Extremum::max();
        for result in self.window(limit) {
            acc.accumulate(result.value_numeric);
        }
        Ok(acc.result())
    }

    /// Mean of the newest `limit` results
    pub fn avg(&self, limit: usize) -> Result<f64, EvalError> {
        self.avg_with_mode(limit, AvgMode::Window)
    }

    /// Mean of the newest `limit` results with an explicit divisor policy.
    /// An empty set averages to 0.0 in either mode.
    pub fn avg_with_mode(&self, limit: usize, mode: AvgMode) -> Result<f64, EvalError> {
        self.ensure_numeric("avg")?;

        let window = self.window(limit);
        let divisor = match mode {
            AvgMode::Window => window.len(),
            AvgMode::FullLength => self.results.len(),
        };
        if divisor == 0 {
            return Ok(0.0);
        }

        let sum: f64 = window.iter().map(|r| r.value_numeric).sum();
        Ok(sum / divisor as f64)
    }

    /// `| |newest| - |previous| |`. A single result is diffed against itself.
    pub fn diff(&self) -> Result<f64, EvalError> {
        self.ensure_numeric("diff")?;

        let newest = self.results.first().ok_or(EvalError::NoResults)?;
        let previous = self.results.get(1).unwrap_or(newest);

        Ok((newest.value_numeric.abs() - previous.value_numeric.abs()).abs())
    }

    /// Most recent numeric value
    pub fn last_numeric(&self) -> Result<f64, EvalError> {
        self.ensure_numeric("last")?;

        self.results
            .first()
            .map(|r| r.value_numeric)
            .ok_or(EvalError::NoResults)
    }

    /// Most recent text value
    pub fn last_text(&self) -> Result<&str, EvalError> {
        let latest = self.results.first().ok_or(EvalError::NoResults)?;
        if latest.kind != ReturnType::Text {
            return Err(EvalError::TypeMismatch("last_text"));
        }
        self.ensure_uniform("last_text")?;
        Ok(&latest.value_string)
    }

    /// The `count` most recent results, oldest first.
    ///
    /// Asking for more than the set holds returns everything available.
    pub fn numeric_last(&self, count: usize) -> Result<Vec<CheckResult>, EvalError> {
        self.ensure_numeric("numeric_last")?;

        if count < 1 {
            return Err(EvalError::InvalidArgument(
                "count must be at least 1".to_string(),
            ));
        }

        let take = count.min(self.results.len());
        Ok(self.results[..take].iter().rev().cloned().collect())
    }
}
