//! Alerting rules and their per-agent assignments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ObjectId;
use super::nullable;
use crate::storage::{Collection, Document};

/// An alerting rule evaluated over item results.
///
/// `expression` and `depends_on` are interpreted by the expression engine,
/// not by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    pub severity: Severity,
    #[serde(default, deserialize_with = "nullable::vec")]
    pub depends_on: Vec<ObjectId>,
    pub expression: String,
}

impl Trigger {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            description: String::new(),
            enabled: true,
            severity: Severity::default(),
            depends_on: Vec::new(),
            expression: expression.into(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_dependency(mut self, trigger_id: ObjectId) -> Self {
        self.depends_on.push(trigger_id);
        self
    }
}

impl Document for Trigger {
    const COLLECTION: Collection = Collection::Triggers;

    fn id(&self) -> ObjectId {
        self.id
    }
}

/// How important a trigger is, lowest first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
}

/// Binding of one trigger to one agent, with its live state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerAssignment {
    pub trigger_id: ObjectId,
    pub enabled: bool,
    /// Resolved trigger; filled during reconciliation, never persisted
    #[serde(skip)]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub problematic: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "nullable::vec")]
    pub history: Vec<TriggerHistoryEntry>,
}

impl TriggerAssignment {
    /// A fresh, enabled, non-problematic assignment with empty history
    pub fn new(trigger_id: ObjectId) -> Self {
        Self {
            trigger_id,
            enabled: true,
            trigger: None,
            problematic: false,
            error: None,
            history: Vec::new(),
        }
    }

    /// Record the evaluated state. History only grows on a transition.
    ///
    /// Returns true if the state changed.
    pub fn record_state(&mut self, problematic: bool, at: DateTime<Utc>) -> bool {
        if self.problematic == problematic {
            return false;
        }

        self.problematic = problematic;
        self.history.push(TriggerHistoryEntry {
            time: at,
            problematic,
        });
        true
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Most recent transition, if any
    pub fn last_transition(&self) -> Option<&TriggerHistoryEntry> {
        self.history.last()
    }
}

/// One problematic-state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerHistoryEntry {
    pub time: DateTime<Utc>,
    pub problematic: bool,
}
