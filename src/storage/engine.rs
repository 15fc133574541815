use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::document::{
    ArrayField, Collection, Document, DocumentStore, JsonDocument, SecondaryKey, StoreError,
};
use crate::models::ObjectId;

/// Documents of one collection in insertion order, indexed by id
#[derive(Debug, Default)]
struct CollectionData {
    docs: Vec<JsonDocument>,
    index: HashMap<ObjectId, usize>,
}

impl CollectionData {
    fn get(&self, id: ObjectId) -> Option<&JsonDocument> {
        self.index.get(&id).map(|&pos| &self.docs[pos])
    }

    fn get_mut(&mut self, id: ObjectId) -> Option<&mut JsonDocument> {
        match self.index.get(&id) {
            Some(&pos) => self.docs.get_mut(pos),
            None => None,
        }
    }

    fn remove(&mut self, id: ObjectId) -> Option<JsonDocument> {
        let pos = self.index.remove(&id)?;
        let doc = self.docs.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(doc)
    }
}

/// In-process document store
pub struct MemoryStore {
    /// Collections indexed by kind
    collections: DashMap<Collection, Arc<RwLock<CollectionData>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
        }
    }

    fn collection(&self, collection: Collection) -> Arc<RwLock<CollectionData>> {
        if let Some(data) = self.collections.get(&collection) {
            return Arc::clone(&data);
        }

        Arc::clone(
            self.collections
                .entry(collection)
                .or_insert_with(|| Arc::new(RwLock::new(CollectionData::default())))
                .value(),
        )
    }

    /// Insert a raw document; it must carry an `id` field
    pub fn insert_raw(&self, collection: Collection, doc: JsonDocument) -> Result<ObjectId, StoreError> {
        let id = document_id(&doc)?;
        let data = self.collection(collection);
        let mut data = data.write();

        if data.index.contains_key(&id) {
            return Err(StoreError::DuplicateId { collection, id });
        }

        let pos = data.docs.len();
        data.index.insert(id, pos);
        data.docs.push(doc);
        Ok(id)
    }

    /// Insert a typed document
    pub fn insert<T: Document>(&self, doc: &T) -> Result<ObjectId, StoreError> {
        self.insert_raw(T::COLLECTION, serde_json::to_value(doc)?)
    }

    /// Insert or replace a typed document
    pub fn upsert<T: Document>(&self, doc: &T) -> Result<(), StoreError> {
        let id = doc.id();
        let value = serde_json::to_value(doc)?;
        let data = self.collection(T::COLLECTION);
        let mut data = data.write();

        match data.get_mut(id) {
            Some(existing) => *existing = value,
            None => {
                let pos = data.docs.len();
                data.index.insert(id, pos);
                data.docs.push(value);
            }
        }
        Ok(())
    }

    /// Delete a document
    pub fn delete(&self, collection: Collection, id: ObjectId) -> Result<(), StoreError> {
        let data = self.collection(collection);
        let mut data = data.write();
        data.remove(id)
            .map(|_| ())
            .ok_or(StoreError::DocumentNotFound { collection, id })
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: Collection) -> usize {
        self.collections
            .get(&collection)
            .map(|data| data.read().docs.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.collections.iter().all(|e| e.value().read().docs.is_empty())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn get_by_id(
        &self,
        collection: Collection,
        id: ObjectId,
    ) -> Result<Option<JsonDocument>, StoreError> {
        let data = self.collection(collection);
        let data = data.read();
        Ok(data.get(id).cloned())
    }

    fn get_by_key(
        &self,
        collection: Collection,
        key: &SecondaryKey,
    ) -> Result<Option<JsonDocument>, StoreError> {
        let field = key.field();
        let value = key.value();
        let data = self.collection(collection);
        let data = data.read();

        Ok(data
            .docs
            .iter()
            .find(|doc| doc.get(field) == Some(&value))
            .cloned())
    }

    fn get_many_by_ids(
        &self,
        collection: Collection,
        ids: &[ObjectId],
    ) -> Result<Vec<JsonDocument>, StoreError> {
        let data = self.collection(collection);
        let data = data.read();
        let mut seen = HashSet::new();

        Ok(ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| data.get(*id).cloned())
            .collect())
    }

    fn get_all(&self, collection: Collection) -> Result<Vec<JsonDocument>, StoreError> {
        let data = self.collection(collection);
        let data = data.read();
        Ok(data.docs.clone())
    }

    fn append_to_array(
        &self,
        collection: Collection,
        id: ObjectId,
        field: ArrayField,
        elements: Vec<JsonDocument>,
    ) -> Result<Vec<JsonDocument>, StoreError> {
        let data = self.collection(collection);
        let mut data = data.write();
        let doc = data
            .get_mut(id)
            .ok_or(StoreError::DocumentNotFound { collection, id })?;
        let array = array_field_mut(doc, field)?;

        let key = field.unique_key();
        let mut present: HashSet<String> = array
            .iter()
            .filter_map(|e| e.get(key).map(|k| k.to_string()))
            .collect();

        let mut appended = Vec::new();
        for element in elements {
            let element_key = element.get(key).map(|k| k.to_string()).ok_or_else(|| {
                StoreError::InvalidDocument(format!("{} element without '{}'", field.name(), key))
            })?;
            if present.insert(element_key) {
                array.push(element.clone());
                appended.push(element);
            }
        }

        Ok(appended)
    }

    fn remove_from_array(
        &self,
        collection: Collection,
        id: ObjectId,
        field: ArrayField,
        keys: &[ObjectId],
    ) -> Result<usize, StoreError> {
        let data = self.collection(collection);
        let mut data = data.write();
        let doc = data
            .get_mut(id)
            .ok_or(StoreError::DocumentNotFound { collection, id })?;
        let array = array_field_mut(doc, field)?;

        let key = field.unique_key();
        let doomed: HashSet<String> = keys
            .iter()
            .map(|k| serde_json::to_value(k).map(|v| v.to_string()))
            .collect::<Result<_, _>>()?;

        let before = array.len();
        array.retain(|e| e.get(key).map_or(true, |k| !doomed.contains(&k.to_string())));
        Ok(before - array.len())
    }

    fn dedup_array(
        &self,
        collection: Collection,
        id: ObjectId,
        field: ArrayField,
    ) -> Result<usize, StoreError> {
        let data = self.collection(collection);
        let mut data = data.write();
        let doc = data
            .get_mut(id)
            .ok_or(StoreError::DocumentNotFound { collection, id })?;
        let array = array_field_mut(doc, field)?;

        let key = field.unique_key();
        let mut seen = HashSet::new();
        let before = array.len();
        // elements without the key are left alone
        array.retain(|e| e.get(key).map_or(true, |k| seen.insert(k.to_string())));
        Ok(before - array.len())
    }
}

fn document_id(doc: &JsonDocument) -> Result<ObjectId, StoreError> {
    let raw = doc
        .get("id")
        .cloned()
        .ok_or_else(|| StoreError::InvalidDocument("document without 'id'".to_string()))?;
    serde_json::from_value(raw)
        .map_err(|e| StoreError::InvalidDocument(format!("malformed document id: {}", e)))
}

/// Array field of a document, created when absent or null
fn array_field_mut(
    doc: &mut JsonDocument,
    field: ArrayField,
) -> Result<&mut Vec<JsonDocument>, StoreError> {
    let object = doc
        .as_object_mut()
        .ok_or_else(|| StoreError::InvalidDocument("document is not an object".to_string()))?;

    let slot = object
        .entry(field.name())
        .or_insert_with(|| JsonDocument::Array(Vec::new()));
    if slot.is_null() {
        *slot = JsonDocument::Array(Vec::new());
    }

    slot.as_array_mut().ok_or_else(|| {
        StoreError::InvalidDocument(format!("'{}' is not an array", field.name()))
    })
}
