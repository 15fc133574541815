//! Configured entry point for the expression engine

use tracing::Span;

use super::{AvgMode, EvalError, MetricFunction};
use crate::config::CoreConfig;
use crate::models::ResultSet;

/// Applies metric functions with the process-wide evaluation settings
#[derive(Debug, Clone)]
pub struct Evaluator {
    avg_mode: AvgMode,
    span: Span,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(AvgMode::default())
    }
}

impl Evaluator {
    pub fn new(avg_mode: AvgMode) -> Self {
        Self {
            avg_mode,
            span: tracing::info_span!("evaluator"),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.avg_mode)
    }

    /// Emit this component's logs inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn avg_mode(&self) -> AvgMode {
        self.avg_mode
    }

    pub fn apply(&self, function: MetricFunction, set: &ResultSet, args: &[f64]) -> Result<f64, EvalError> {
        let _enter = self.span.enter();
        function.apply(set, args, self.avg_mode)
    }

    /// Look up `name` and apply it, e.g. `evaluate("avg", &set, &[5.0])`
    pub fn evaluate(&self, name: &str, set: &ResultSet, args: &[f64]) -> Result<f64, EvalError> {
        let function = name.parse::<MetricFunction>().map_err(|e| {
            let _enter = self.span.enter();
            tracing::warn!(function = name, "Unknown metric function");
            e
        })?;
        self.apply(function, set, args)
    }
}
