//! Monitored agents

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::ObjectId;
use super::item::Item;
use super::nullable;
use super::template::Template;
use super::trigger::{Trigger, TriggerAssignment};
use crate::storage::{Collection, Document};

/// A monitored host running checks.
///
/// `templates` is derived by the resolver and never persisted. The agent owns
/// its `trigger_mappings`; templates, items and triggers are shared records
/// referenced by ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Stable identity reported by the agent itself
    pub agent_uuid: Uuid,
    pub enabled: bool,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    pub os: AgentOs,
    #[serde(default)]
    pub state: AgentState,
    #[serde(default, deserialize_with = "nullable::vec")]
    pub template_ids: Vec<ObjectId>,
    #[serde(skip)]
    pub templates: Vec<Template>,
    #[serde(default, deserialize_with = "nullable::vec")]
    pub trigger_mappings: Vec<TriggerAssignment>,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Scrape interval in seconds
    #[serde(default)]
    pub scrape_interval: u32,
    #[serde(default)]
    pub scraper: ScraperLock,
}

impl Agent {
    pub fn new(name: impl Into<String>, os: AgentOs) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            description: String::new(),
            agent_uuid: Uuid::new_v4(),
            enabled: true,
            last_seen: None,
            os,
            state: AgentState::default(),
            template_ids: Vec::new(),
            templates: Vec::new(),
            trigger_mappings: Vec::new(),
            endpoint: None,
            scrape_interval: 30,
            scraper: ScraperLock::default(),
        }
    }

    pub fn with_templates(mut self, ids: impl IntoIterator<Item = ObjectId>) -> Self {
        self.template_ids.extend(ids);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Assignments currently in a problematic state
    pub fn problematic_triggers(&self) -> Vec<&TriggerAssignment> {
        self.trigger_mappings
            .iter()
            .filter(|m| m.problematic)
            .collect()
    }

    /// Trigger reachable through the resolved templates
    pub fn trigger(&self, id: ObjectId) -> Option<&Trigger> {
        self.templates
            .iter()
            .flat_map(|t| t.triggers.iter())
            .find(|t| t.id == id)
    }

    /// Item reachable through the resolved templates
    pub fn item(&self, id: ObjectId) -> Option<&Item> {
        self.templates
            .iter()
            .flat_map(|t| t.items.iter())
            .find(|i| i.id == id)
    }

    pub fn trigger_mapping(&self, trigger_id: ObjectId) -> Option<&TriggerAssignment> {
        self.trigger_mappings
            .iter()
            .find(|m| m.trigger_id == trigger_id)
    }

    pub fn trigger_mapping_mut(&mut self, trigger_id: ObjectId) -> Option<&mut TriggerAssignment> {
        self.trigger_mappings
            .iter_mut()
            .find(|m| m.trigger_id == trigger_id)
    }

    /// Every item reachable through the templates, each once, in first-seen order
    pub fn all_items(&self) -> Vec<&Item> {
        let mut seen = HashSet::new();
        self.templates
            .iter()
            .flat_map(|t| t.items.iter())
            .filter(|i| seen.insert(i.id))
            .collect()
    }

    /// Every trigger reachable through the templates, each once, in first-seen order
    pub fn all_triggers(&self) -> Vec<&Trigger> {
        let mut seen = HashSet::new();
        self.templates
            .iter()
            .flat_map(|t| t.triggers.iter())
            .filter(|t| seen.insert(t.id))
            .collect()
    }
}

impl Document for Agent {
    const COLLECTION: Collection = Collection::Agents;

    fn id(&self) -> ObjectId {
        self.id
    }
}

/// Operating system an agent runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentOs {
    Windows,
    Linux,
    /// Registered or loaded with an OS we have no checks for
    Unsupported,
}

impl AgentOs {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentOs::Windows => "windows",
            AgentOs::Linux => "linux",
            AgentOs::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for AgentOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentOs {
    type Err = UnsupportedOs;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(AgentOs::Linux),
            "windows" => Ok(AgentOs::Windows),
            _ => Err(UnsupportedOs(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported OS: {0}")]
pub struct UnsupportedOs(pub String);

impl UnsupportedOs {
    /// The OS value to record for an agent reporting this string
    pub fn fallback(&self) -> AgentOs {
        AgentOs::Unsupported
    }
}

/// Whether the leader currently sees the agent.
///
/// Records stored without a state decode as `Online`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    #[default]
    Online,
    Offline,
}

/// Which scraper instance currently owns the agent, and since when
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScraperLock {
    pub uuid: Option<Uuid>,
    pub lock: Option<DateTime<Utc>>,
}
