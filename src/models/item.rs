//! Check definitions

use serde::{Deserialize, Serialize};

use super::agent::AgentOs;
use super::ids::ObjectId;
use crate::storage::{Collection, Document};

/// A single check an agent runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Kind of value the check produces
    pub returns: ReturnType,
    #[serde(default)]
    pub unit: String,
    /// Sampling interval in seconds
    pub interval: u32,
    pub command: String,
    /// Only agents running this OS execute the check
    pub check_on: AgentOs,
}

impl Item {
    pub fn new(name: impl Into<String>, command: impl Into<String>, returns: ReturnType) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            description: String::new(),
            returns,
            unit: String::new(),
            interval: 60,
            command: command.into(),
            check_on: AgentOs::Linux,
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_check_on(mut self, os: AgentOs) -> Self {
        self.check_on = os;
        self
    }
}

impl Document for Item {
    const COLLECTION: Collection = Collection::Items;

    fn id(&self) -> ObjectId {
        self.id
    }
}

/// Kind of value a check returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    #[default]
    Numeric,
    Text,
}
