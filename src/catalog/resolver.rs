//! Composition resolver
//!
//! Expands an agent's template references into templates with their items
//! and triggers inlined. Missing references are dropped silently; only store
//! transport and decode failures are errors. Resolution never writes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::Span;

use super::error::{CatalogError, Result};
use crate::models::{Agent, Item, ObjectId, Template, Trigger};
use crate::storage::{Document, DocumentStore, JsonDocument};

/// Decode a stored document. Absent or null array fields come back empty,
/// so every resolved record exposes empty, never missing, collections.
pub(crate) fn decode<T: Document>(doc: JsonDocument) -> Result<T> {
    let collection = T::COLLECTION;
    serde_json::from_value(doc).map_err(|source| {
        tracing::error!(%collection, error = %source, "Couldn't decode document");
        CatalogError::Decode { collection, source }
    })
}

/// IDs in first-seen order without repeats
fn unique_ids<'a>(ids: impl IntoIterator<Item = &'a ObjectId>) -> Vec<ObjectId> {
    let mut seen = HashSet::new();
    ids.into_iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Pick records for `ids` in the order listed, each at most once
fn ordered<T: Document + Clone>(ids: &[ObjectId], found: &HashMap<ObjectId, T>) -> Vec<T> {
    unique_ids(ids)
        .into_iter()
        .filter_map(|id| found.get(&id).cloned())
        .collect()
}

pub struct Resolver {
    store: Arc<dyn DocumentStore>,
    span: Span,
}

impl Resolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            span: tracing::info_span!("resolver"),
        }
    }

    /// Emit this component's logs inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Populate `agent.templates` (and their items and triggers)
    pub fn resolve(&self, mut agent: Agent) -> Result<Agent> {
        let _enter = self.span.enter();

        agent.templates = self.resolve_templates(&agent.template_ids)?;

        tracing::trace!(
            agent_id = %agent.id,
            templates = agent.templates.len(),
            "Resolved agent composition"
        );
        Ok(agent)
    }

    /// Fetch templates by ID, in the order referenced, and resolve their contents
    pub fn resolve_templates(&self, ids: &[ObjectId]) -> Result<Vec<Template>> {
        let _enter = self.span.enter();

        let found: HashMap<ObjectId, Template> = self
            .fetch_many::<Template>(ids)?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();
        let mut templates = ordered(ids, &found);

        self.populate(&mut templates)?;
        Ok(templates)
    }

    /// Fill `items` and `triggers` of already-fetched templates.
    ///
    /// All items and all triggers referenced by the batch are fetched in one
    /// round trip each, however many templates there are.
    pub fn populate(&self, templates: &mut [Template]) -> Result<()> {
        let _enter = self.span.enter();

        let item_ids = unique_ids(templates.iter().flat_map(|t| t.item_ids.iter()));
        let trigger_ids = unique_ids(templates.iter().flat_map(|t| t.trigger_ids.iter()));

        let items: HashMap<ObjectId, Item> = self
            .fetch_many::<Item>(&item_ids)?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();
        let triggers: HashMap<ObjectId, Trigger> = self
            .fetch_many::<Trigger>(&trigger_ids)?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        for template in templates.iter_mut() {
            template.items = ordered(&template.item_ids, &items);
            template.triggers = ordered(&template.trigger_ids, &triggers);

            let referenced =
                unique_ids(&template.item_ids).len() + unique_ids(&template.trigger_ids).len();
            let dropped = referenced - template.items.len() - template.triggers.len();
            if dropped > 0 {
                tracing::debug!(
                    template_id = %template.id,
                    dropped,
                    "Template references records that no longer exist"
                );
            }
        }

        Ok(())
    }

    /// Batched fetch; no round trip for an empty ID list
    pub(crate) fn fetch_many<T: Document>(&self, ids: &[ObjectId]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let collection = T::COLLECTION;
        let docs = self
            .store
            .get_many_by_ids(collection, ids)
            .map_err(|e| {
                tracing::error!(%collection, error = %e, "Couldn't read documents");
                e
            })?;

        docs.into_iter().map(decode::<T>).collect()
    }
}
