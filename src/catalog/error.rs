use crate::storage::{Collection, StoreError};

/// Catalog errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Single-record lookup miss
    #[error("No {collection} record matches {key}")]
    NotFound { collection: Collection, key: String },

    /// Store unreachable, timed out or rejected the operation
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Stored payload does not match the expected shape
    #[error("Couldn't decode {collection} document: {source}")]
    Decode {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },
}

impl CatalogError {
    pub fn not_found(collection: Collection, key: impl ToString) -> Self {
        Self::NotFound {
            collection,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound { .. })
    }

    /// Transport or decode failure; the current cycle for the agent is lost
    pub fn is_transport(&self) -> bool {
        matches!(self, CatalogError::Store(_) | CatalogError::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
