//! Templates group items and triggers for reuse across agents

use serde::{Deserialize, Serialize};

use super::ids::ObjectId;
use super::item::Item;
use super::nullable;
use super::trigger::Trigger;
use crate::storage::{Collection, Document};

/// A named bundle of items and triggers.
///
/// Only the ID lists are persisted; `items` and `triggers` are filled by the
/// resolver and never written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "nullable::vec")]
    pub item_ids: Vec<ObjectId>,
    #[serde(skip)]
    pub items: Vec<Item>,
    #[serde(default, deserialize_with = "nullable::vec")]
    pub trigger_ids: Vec<ObjectId>,
    #[serde(skip)]
    pub triggers: Vec<Trigger>,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ObjectId::new(),
            name: name.into(),
            description: String::new(),
            item_ids: Vec::new(),
            items: Vec::new(),
            trigger_ids: Vec::new(),
            triggers: Vec::new(),
        }
    }

    pub fn with_items(mut self, ids: impl IntoIterator<Item = ObjectId>) -> Self {
        self.item_ids.extend(ids);
        self
    }

    pub fn with_triggers(mut self, ids: impl IntoIterator<Item = ObjectId>) -> Self {
        self.trigger_ids.extend(ids);
        self
    }
}

impl Document for Template {
    const COLLECTION: Collection = Collection::Templates;

    fn id(&self) -> ObjectId {
        self.id
    }
}
