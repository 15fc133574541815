pub mod document;
pub mod engine;
pub mod seed;
#[cfg(test)]
pub(crate) mod testing;

pub use document::{ArrayField, Collection, Document, DocumentStore, JsonDocument, SecondaryKey, StoreError};
pub use engine::MemoryStore;
pub use seed::SeedFile;
