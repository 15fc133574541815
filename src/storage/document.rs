//! Document store boundary
//!
//! Records cross this boundary as JSON documents; typed decoding happens in
//! the catalog. Lookups are expressed with enumerated keys and fields rather
//! than free-form field names.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::models::ObjectId;

/// Raw stored record
pub type JsonDocument = serde_json::Value;

/// Collections consumed by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Agents,
    Templates,
    Items,
    Triggers,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Agents => "agents",
            Collection::Templates => "templates",
            Collection::Items => "items",
            Collection::Triggers => "triggers",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed record living in one collection
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> ObjectId;
}

/// Secondary unique keys a record can be fetched by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SecondaryKey {
    /// Stable identity an agent reports about itself
    AgentUuid(Uuid),
    /// Unique name of an item or trigger
    Name(String),
}

impl SecondaryKey {
    /// Document field holding the key
    pub fn field(&self) -> &'static str {
        match self {
            SecondaryKey::AgentUuid(_) => "agent_uuid",
            SecondaryKey::Name(_) => "name",
        }
    }

    pub fn value(&self) -> JsonDocument {
        match self {
            SecondaryKey::AgentUuid(uuid) => JsonDocument::String(uuid.to_string()),
            SecondaryKey::Name(name) => JsonDocument::String(name.clone()),
        }
    }
}

impl fmt::Display for SecondaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecondaryKey::AgentUuid(uuid) => write!(f, "agent_uuid={}", uuid),
            SecondaryKey::Name(name) => write!(f, "name={}", name),
        }
    }
}

/// Array fields that support append/remove updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayField {
    /// `Agent::trigger_mappings`, unique by trigger id
    TriggerMappings,
}

impl ArrayField {
    pub fn name(&self) -> &'static str {
        match self {
            ArrayField::TriggerMappings => "trigger_mappings",
        }
    }

    /// Element field that must be unique within the array
    pub fn unique_key(&self) -> &'static str {
        match self {
            ArrayField::TriggerMappings => "trigger_id",
        }
    }
}

/// Minimal document store contract.
///
/// Implementations enforce their own read/write timeouts and report them as
/// `StoreError::Timeout`.
pub trait DocumentStore: Send + Sync {
    fn get_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
    ) -> Result<Option<JsonDocument>, StoreError>;

    fn get_by_key(
        &self,
        collection: Collection,
        key: &SecondaryKey,
    ) -> Result<Option<JsonDocument>, StoreError>;

    /// Fetch every listed record that exists. Missing IDs are omitted, never an error.
    fn get_many_by_ids(
        &self,
        collection: Collection,
        ids: &[ObjectId],
    ) -> Result<Vec<JsonDocument>, StoreError>;

    fn get_all(&self, collection: Collection) -> Result<Vec<JsonDocument>, StoreError>;

    /// Append elements to an array field of one record.
    ///
    /// Elements whose unique key is already present in the array are skipped,
    /// atomically with respect to concurrent appends. Returns the elements
    /// actually appended.
    fn append_to_array(
        &self,
        collection: Collection,
        id: ObjectId,
        field: ArrayField,
        elements: Vec<JsonDocument>,
    ) -> Result<Vec<JsonDocument>, StoreError>;

    /// Remove array elements whose unique key is listed. Returns how many were removed.
    fn remove_from_array(
        &self,
        collection: Collection,
        id: ObjectId,
        field: ArrayField,
        keys: &[ObjectId],
    ) -> Result<usize, StoreError>;

    /// Drop every element whose unique key already appeared earlier in the
    /// array, keeping the first. Returns how many were dropped.
    fn dedup_array(
        &self,
        collection: Collection,
        id: ObjectId,
        field: ArrayField,
    ) -> Result<usize, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Document '{id}' not found in {collection}")]
    DocumentNotFound { collection: Collection, id: ObjectId },

    #[error("Document '{id}' already exists in {collection}")]
    DuplicateId { collection: Collection, id: ObjectId },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secondary_key_fields() {
        let uuid = Uuid::new_v4();
        let key = SecondaryKey::AgentUuid(uuid);
        assert_eq!(key.field(), "agent_uuid");
        assert_eq!(key.value(), JsonDocument::String(uuid.to_string()));

        let key = SecondaryKey::Name("cpu".to_string());
        assert_eq!(key.field(), "name");
        assert_eq!(key.to_string(), "name=cpu");
    }
}
