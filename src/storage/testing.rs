//! Store wrappers for tests: write counting and fault injection

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::document::{
    ArrayField, Collection, DocumentStore, JsonDocument, SecondaryKey, StoreError,
};
use crate::models::ObjectId;

/// Counts round trips and writes made through it
pub struct CountingStore {
    inner: Arc<dyn DocumentStore>,
    reads: Mutex<Vec<Collection>>,
    writes: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            reads: Mutex::new(Vec::new()),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads_of(&self, collection: Collection) -> usize {
        self.reads.lock().iter().filter(|c| **c == collection).count()
    }

    pub fn reset(&self) {
        self.reads.lock().clear();
        self.writes.store(0, Ordering::SeqCst);
    }

    fn read(&self, collection: Collection) {
        self.reads.lock().push(collection);
    }
}

impl DocumentStore for CountingStore {
    fn get_by_id(&self, collection: Collection, id: ObjectId) -> Result<Option<JsonDocument>, StoreError> {
        self.read(collection);
        self.inner.get_by_id(collection, id)
    }

    fn get_by_key(
        &self,
        collection: Collection,
        key: &SecondaryKey,
    ) -> Result<Option<JsonDocument>, StoreError> {
        self.read(collection);
        self.inner.get_by_key(collection, key)
    }

    fn get_many_by_ids(
        &self,
        collection: Collection,
        ids: &[ObjectId],
    ) -> Result<Vec<JsonDocument>, StoreError> {
        self.read(collection);
        self.inner.get_many_by_ids(collection, ids)
    }

    fn get_all(&self, collection: Collection) -> Result<Vec<JsonDocument>, StoreError> {
        self.read(collection);
        self.inner.get_all(collection)
    }

    fn append_to_array(
        &self,
        collection: Collection,
        id: ObjectId,
        field: ArrayField,
        elements: Vec<JsonDocument>,
    ) -> Result<Vec<JsonDocument>, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.append_to_array(collection, id, field, elements)
    }

    fn remove_from_array(
        &self,
        collection: Collection,
        id: ObjectId,
        field: ArrayField,
        keys: &[ObjectId],
    ) -> Result<usize, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_from_array(collection, id, field, keys)
    }

    fn dedup_array(
        &self,
        collection: Collection,
        id: ObjectId,
        field: ArrayField,
    ) -> Result<usize, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.dedup_array(collection, id, field)
    }
}

/// Fails every operation touching one collection
pub struct FailingStore {
    inner: Arc<dyn DocumentStore>,
    failing: Collection,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn DocumentStore>, failing: Collection) -> Self {
        Self { inner, failing }
    }

    fn check(&self, collection: Collection) -> Result<(), StoreError> {
        if collection == self.failing {
            return Err(StoreError::Unavailable(format!("{} is down", collection)));
        }
        Ok(())
    }
}

impl DocumentStore for FailingStore {
    fn get_by_id(&self, collection: Collection, id: ObjectId) -> Result<Option<JsonDocument>, StoreError> {
        self.check(collection)?;
        self.inner.get_by_id(collection, id)
    }

    fn get_by_key(
        &self,
        collection: Collection,
        key: &SecondaryKey,
    ) -> Result<Option<JsonDocument>, StoreError> {
        self.check(collection)?;
        self.inner.get_by_key(collection, key)
    }

    fn get_many_by_ids(
        &self,
        collection: Collection,
        ids: &[ObjectId],
    ) -> Result<Vec<JsonDocument>, StoreError> {
        self.check(collection)?;
        self.inner.get_many_by_ids(collection, ids)
    }

    fn get_all(&self, collection: Collection) -> Result<Vec<JsonDocument>, StoreError> {
        self.check(collection)?;
        self.inner.get_all(collection)
    }

    fn append_to_array(
        &self,
        collection: Collection,
        id: ObjectId,
        field: ArrayField,
        elements: Vec<JsonDocument>,
    ) -> Result<Vec<JsonDocument>, StoreError> {
        self.check(collection)?;
        self.inner.append_to_array(collection, id, field, elements)
    }

    fn remove_from_array(
        &self,
        collection: Collection,
        id: ObjectId,
        field: ArrayField,
        keys: &[ObjectId],
    ) -> Result<usize, StoreError> {
        self.check(collection)?;
        self.inner.remove_from_array(collection, id, field, keys)
    }

    fn dedup_array(
        &self,
        collection: Collection,
        id: ObjectId,
        field: ArrayField,
    ) -> Result<usize, StoreError> {
        self.check(collection)?;
        self.inner.dedup_array(collection, id, field)
    }
}
