//! Seed documents for the in-memory store

use serde::Deserialize;
use std::path::Path;

use super::document::{Collection, JsonDocument, StoreError};
use super::engine::MemoryStore;
use crate::models::nullable;

/// On-disk layout of a seed file
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default, deserialize_with = "nullable::vec")]
    pub agents: Vec<JsonDocument>,
    #[serde(default, deserialize_with = "nullable::vec")]
    pub templates: Vec<JsonDocument>,
    #[serde(default, deserialize_with = "nullable::vec")]
    pub items: Vec<JsonDocument>,
    #[serde(default, deserialize_with = "nullable::vec")]
    pub triggers: Vec<JsonDocument>,
}

impl SeedFile {
    fn into_collections(self) -> [(Collection, Vec<JsonDocument>); 4] {
        [
            (Collection::Items, self.items),
            (Collection::Triggers, self.triggers),
            (Collection::Templates, self.templates),
            (Collection::Agents, self.agents),
        ]
    }
}

impl MemoryStore {
    /// Build a store from seed JSON
    pub fn from_seed_str(json: &str) -> Result<Self, StoreError> {
        let seed: SeedFile = serde_json::from_str(json)?;
        let store = Self::new();
        store.load(seed)?;
        Ok(store)
    }

    /// Build a store from a seed file on disk
    pub fn load_seed(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let store = Self::from_seed_str(&json)?;

        tracing::info!(
            path = %path.display(),
            agents = store.len(Collection::Agents),
            templates = store.len(Collection::Templates),
            items = store.len(Collection::Items),
            triggers = store.len(Collection::Triggers),
            "Loaded seed documents"
        );
        Ok(store)
    }

    /// Insert every document of a seed
    pub fn load(&self, seed: SeedFile) -> Result<usize, StoreError> {
        let mut loaded = 0;
        for (collection, docs) in seed.into_collections() {
            for doc in docs {
                self.insert_raw(collection, doc)?;
                loaded += 1;
            }
        }
        Ok(loaded)
    }
}
