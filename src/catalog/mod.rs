//! Typed access to agents, templates, items and triggers
//!
//! Loading an agent resolves its template composition and then reconciles its
//! trigger assignments, so every agent handed out by the catalog carries
//! inlined templates and a complete assignment list.

pub mod error;
pub mod reconciler;
pub mod resolver;

use std::sync::Arc;

use tracing::Span;
use uuid::Uuid;

pub use error::{CatalogError, Result};
pub use reconciler::{ReconcileReport, Reconciler, StalePolicy};
pub use resolver::Resolver;

use crate::config::CoreConfig;
use crate::eval::Evaluator;
use crate::models::{Agent, Item, ObjectId, Template, Trigger};
use crate::storage::{Collection, Document, DocumentStore, SecondaryKey};
use resolver::decode;

/// How to find a single agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentLookup {
    Id(ObjectId),
    Uuid(Uuid),
}

pub struct Catalog {
    store: Arc<dyn DocumentStore>,
    resolver: Resolver,
    reconciler: Reconciler,
    evaluator: Evaluator,
    span: Span,
}

impl Catalog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            resolver: Resolver::new(Arc::clone(&store)),
            reconciler: Reconciler::new(Arc::clone(&store)),
            evaluator: Evaluator::default(),
            store,
            span: tracing::info_span!("catalog"),
        }
    }

    /// Catalog with the stale policy and evaluation settings of `config`
    pub fn from_config(store: Arc<dyn DocumentStore>, config: &CoreConfig) -> Self {
        Self::new(store)
            .with_stale_policy(config.stale_policy)
            .with_evaluator(Evaluator::from_config(config))
    }

    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.reconciler = self.reconciler.with_policy(policy);
        self
    }

    /// Emit logs of the catalog and its components inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.resolver = self
            .resolver
            .with_span(tracing::info_span!(parent: &span, "resolver"));
        self.reconciler = self
            .reconciler
            .with_span(tracing::info_span!(parent: &span, "reconciler"));
        self.evaluator = self
            .evaluator
            .with_span(tracing::info_span!(parent: &span, "evaluator"));
        self.span = span;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Metric evaluator for trigger expressions
    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    // ========================================================================
    // Agents
    // ========================================================================

    pub fn get_agent(&self, id: ObjectId) -> Result<Agent> {
        self.find_agent(AgentLookup::Id(id))
    }

    pub fn get_agent_by_uuid(&self, uuid: Uuid) -> Result<Agent> {
        self.find_agent(AgentLookup::Uuid(uuid))
    }

    /// Fetch one agent, resolve it and reconcile its assignments
    pub fn find_agent(&self, lookup: AgentLookup) -> Result<Agent> {
        let _enter = self.span.enter();

        let doc = match lookup {
            AgentLookup::Id(id) => self.store.get_by_id(Collection::Agents, id),
            AgentLookup::Uuid(uuid) => self
                .store
                .get_by_key(Collection::Agents, &SecondaryKey::AgentUuid(uuid)),
        }
        .map_err(|e| {
            tracing::error!(?lookup, error = %e, "Couldn't fetch agent");
            e
        })?;

        let doc = doc.ok_or_else(|| {
            tracing::debug!(?lookup, "Agent not found");
            match lookup {
                AgentLookup::Id(id) => CatalogError::not_found(Collection::Agents, id),
                AgentLookup::Uuid(uuid) => {
                    CatalogError::not_found(Collection::Agents, SecondaryKey::AgentUuid(uuid))
                }
            }
        })?;

        let (agent, _) = self.load(decode(doc)?)?;
        Ok(agent)
    }

    /// Every agent, resolved and reconciled.
    ///
    /// Fail-fast: the first agent that can't be resolved or reconciled aborts
    /// the whole listing.
    pub fn get_all_agents(&self) -> Result<Vec<Agent>> {
        Ok(self
            .load_all_agents()?
            .into_iter()
            .map(|(agent, _)| agent)
            .collect())
    }

    /// Like `get_all_agents`, keeping each agent's reconcile report
    pub fn load_all_agents(&self) -> Result<Vec<(Agent, ReconcileReport)>> {
        let _enter = self.span.enter();

        let docs = self.store.get_all(Collection::Agents).map_err(|e| {
            tracing::error!(error = %e, "Couldn't fetch agents");
            e
        })?;

        docs.into_iter()
            .map(|doc| self.load(decode(doc)?))
            .collect()
    }

    /// Resolve then reconcile an already-decoded agent
    pub fn load(&self, agent: Agent) -> Result<(Agent, ReconcileReport)> {
        let mut agent = self.resolver.resolve(agent)?;
        let report = self.reconciler.reconcile(&mut agent)?;
        Ok((agent, report))
    }

    pub fn add_trigger_assignment(&self, agent_id: ObjectId, trigger_id: ObjectId) -> Result<usize> {
        self.add_trigger_assignments(agent_id, &[trigger_id])
    }

    /// Persist assignments between an agent and one or more triggers
    pub fn add_trigger_assignments(&self, agent_id: ObjectId, trigger_ids: &[ObjectId]) -> Result<usize> {
        let _enter = self.span.enter();
        self.reconciler
            .add_assignments(agent_id, trigger_ids)
            .map(|added| added.len())
    }

    // ========================================================================
    // Templates
    // ========================================================================

    pub fn get_template(&self, id: ObjectId) -> Result<Template> {
        self.get_templates(&[id])?
            .pop()
            .ok_or_else(|| CatalogError::not_found(Collection::Templates, id))
    }

    /// Resolved templates; IDs that don't exist are omitted
    pub fn get_templates(&self, ids: &[ObjectId]) -> Result<Vec<Template>> {
        let _enter = self.span.enter();
        self.resolver.resolve_templates(ids)
    }

    pub fn get_all_templates(&self) -> Result<Vec<Template>> {
        let _enter = self.span.enter();

        let mut templates: Vec<Template> = self.fetch_all()?;
        self.resolver.populate(&mut templates)?;
        Ok(templates)
    }

    // ========================================================================
    // Items
    // ========================================================================

    /// Items by ID; IDs that don't exist are omitted
    pub fn get_items(&self, ids: &[ObjectId]) -> Result<Vec<Item>> {
        let _enter = self.span.enter();
        self.resolver.fetch_many(ids)
    }

    pub fn get_item_by_name(&self, name: &str) -> Result<Item> {
        self.fetch_by_key(SecondaryKey::Name(name.to_string()))
    }

    // ========================================================================
    // Triggers
    // ========================================================================

    pub fn get_trigger(&self, id: ObjectId) -> Result<Trigger> {
        self.get_triggers(&[id])?
            .pop()
            .ok_or_else(|| CatalogError::not_found(Collection::Triggers, id))
    }

    /// Triggers by ID; IDs that don't exist are omitted
    pub fn get_triggers(&self, ids: &[ObjectId]) -> Result<Vec<Trigger>> {
        let _enter = self.span.enter();
        self.resolver.fetch_many(ids)
    }

    pub fn get_trigger_by_name(&self, name: &str) -> Result<Trigger> {
        self.fetch_by_key(SecondaryKey::Name(name.to_string()))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn fetch_by_key<T: Document>(&self, key: SecondaryKey) -> Result<T> {
        let _enter = self.span.enter();
        let collection = T::COLLECTION;

        let doc = self.store.get_by_key(collection, &key).map_err(|e| {
            tracing::error!(%collection, %key, error = %e, "Couldn't read document");
            e
        })?;

        match doc {
            Some(doc) => decode(doc),
            None => Err(CatalogError::not_found(collection, key)),
        }
    }

    fn fetch_all<T: Document>(&self) -> Result<Vec<T>> {
        let collection = T::COLLECTION;
        let docs = self.store.get_all(collection).map_err(|e| {
            tracing::error!(%collection, error = %e, "Couldn't read documents");
            e
        })?;
        docs.into_iter().map(decode).collect()
    }
}
