//! Check results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ObjectId;
use super::item::ReturnType;
use super::nullable;

/// One observation of an item on a host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: ObjectId,
    pub item_id: ObjectId,
    pub host_id: ObjectId,
    pub kind: ReturnType,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub value_string: String,
    #[serde(default)]
    pub value_numeric: f64,
    /// Set instead of a value when the check itself failed
    #[serde(default)]
    pub error: Option<String>,
}

impl CheckResult {
    pub fn numeric(item_id: ObjectId, host_id: ObjectId, value: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            id: ObjectId::new(),
            item_id,
            host_id,
            kind: ReturnType::Numeric,
            captured_at,
            value_string: String::new(),
            value_numeric: value,
            error: None,
        }
    }

    pub fn text(
        item_id: ObjectId,
        host_id: ObjectId,
        value: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            item_id,
            host_id,
            kind: ReturnType::Text,
            captured_at,
            value_string: value.into(),
            value_numeric: 0.0,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Result history of one item, newest first (`results[0]` is the latest).
///
/// All results in a set share one return kind; the evaluators reject a set
/// that mixes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    #[serde(default, deserialize_with = "nullable::vec")]
    pub results: Vec<CheckResult>,
}

impl ResultSet {
    pub fn new(results: Vec<CheckResult>) -> Self {
        Self { results }
    }

    /// Return kind shared by the set. An empty set reports `Numeric` so
    /// arithmetic on "no data yet" stays well-typed.
    pub fn kind(&self) -> ReturnType {
        self.results
            .first()
            .map(|r| r.kind)
            .unwrap_or(ReturnType::Numeric)
    }

    /// Whether every result has the same return kind as the newest one
    pub fn is_uniform(&self) -> bool {
        let kind = self.kind();
        self.results.iter().all(|r| r.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn latest(&self) -> Option<&CheckResult> {
        self.results.first()
    }
}

impl From<Vec<CheckResult>> for ResultSet {
    fn from(results: Vec<CheckResult>) -> Self {
        Self::new(results)
    }
}
