//! Trigger assignment reconciliation
//!
//! Keeps an agent's persisted trigger assignments in step with the triggers
//! its resolved templates make reachable:
//!
//! - reachable trigger without an assignment: a fresh assignment is appended
//! - assignment whose trigger is no longer reachable: reported as stale, and
//!   removed only under `StalePolicy::Remove`
//! - reachable trigger with several assignments: reported, and collapsed to
//!   the first copy only under `StalePolicy::Remove`
//!
//! Reconciliation of one agent is serialized in-process, and the store skips
//! assignments whose trigger id is already present, so overlapping runs
//! (in-process or across processes) never duplicate an assignment.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::Span;

use super::error::{CatalogError, Result};
use super::resolver::decode;
use crate::models::{Agent, ObjectId, Trigger, TriggerAssignment};
use crate::storage::{ArrayField, Collection, DocumentStore, StoreError};

/// What to do with assignments whose trigger is no longer reachable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Log only; the assignment and its alert history are kept
    #[default]
    Report,
    /// Delete the assignment from the agent
    Remove,
}

/// Outcome of reconciling one agent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Triggers that received a new assignment
    pub added: Vec<ObjectId>,
    /// Assigned triggers no longer reachable through the templates
    pub stale: Vec<ObjectId>,
    /// Stale assignments deleted under `StalePolicy::Remove`
    pub removed: Vec<ObjectId>,
    /// Reachable triggers holding more than one assignment
    pub duplicates: Vec<ObjectId>,
    /// Extra copies dropped under `StalePolicy::Remove`; the first copy and
    /// its history are kept
    pub deduplicated: usize,
}

impl ReconcileReport {
    /// True when nothing was written
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.deduplicated == 0
    }
}

/// IDs in first-seen order without repeats
fn first_seen(ids: impl IntoIterator<Item = ObjectId>) -> Vec<ObjectId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

pub struct Reconciler {
    store: Arc<dyn DocumentStore>,
    policy: StalePolicy,
    /// Per-agent guards; one reconciliation per agent at a time
    in_flight: DashMap<ObjectId, Arc<Mutex<()>>>,
    span: Span,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            policy: StalePolicy::default(),
            in_flight: DashMap::new(),
            span: tracing::info_span!("reconciler"),
        }
    }

    pub fn with_policy(mut self, policy: StalePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Emit this component's logs inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn policy(&self) -> StalePolicy {
        self.policy
    }

    fn guard_for(&self, agent_id: ObjectId) -> Arc<Mutex<()>> {
        Arc::clone(
            self.in_flight
                .entry(agent_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Drop the agent's guard once no other caller holds or waits on it.
    /// The map and the caller's clone account for two references.
    fn release(&self, agent_id: ObjectId, guard: Arc<Mutex<()>>) {
        self.in_flight
            .remove_if(&agent_id, |_, g| Arc::strong_count(g) == 2);
        drop(guard);
    }

    /// Synchronize `agent.trigger_mappings` with `agent.all_triggers()`.
    ///
    /// The agent must already be resolved. Running it again with an unchanged
    /// composition writes nothing.
    pub fn reconcile(&self, agent: &mut Agent) -> Result<ReconcileReport> {
        let guard = self.guard_for(agent.id);
        let result = {
            let _serialized = guard.lock();
            let _enter = self.span.enter();
            self.reconcile_locked(agent)
        };
        self.release(agent.id, guard);
        result
    }

    fn reconcile_locked(&self, agent: &mut Agent) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let reachable: HashMap<ObjectId, Trigger> = agent
            .all_triggers()
            .into_iter()
            .map(|t| (t.id, t.clone()))
            .collect();

        let mut copies: HashMap<ObjectId, usize> = HashMap::new();
        for mapping in &agent.trigger_mappings {
            *copies.entry(mapping.trigger_id).or_default() += 1;
        }
        let assigned = first_seen(agent.trigger_mappings.iter().map(|m| m.trigger_id));

        report.stale = assigned
            .iter()
            .copied()
            .filter(|id| !reachable.contains_key(id))
            .collect();
        for trigger_id in &report.stale {
            tracing::debug!(
                agent_id = %agent.id,
                agent = %agent.name,
                %trigger_id,
                "Found outdated trigger assignment"
            );
        }

        report.duplicates = assigned
            .iter()
            .copied()
            .filter(|id| reachable.contains_key(id) && copies[id] > 1)
            .collect();
        for trigger_id in &report.duplicates {
            tracing::warn!(
                agent_id = %agent.id,
                agent = %agent.name,
                %trigger_id,
                copies = copies[trigger_id],
                "Found duplicate trigger assignments"
            );
        }

        if self.policy == StalePolicy::Remove {
            if !report.stale.is_empty() {
                let removed = self.remove_assignments(agent.id, &report.stale)?;
                let doomed: HashSet<ObjectId> = report.stale.iter().copied().collect();
                agent
                    .trigger_mappings
                    .retain(|m| !doomed.contains(&m.trigger_id));
                tracing::info!(agent_id = %agent.id, removed, "Removed outdated trigger assignments");
                report.removed = report.stale.clone();
            }

            if !report.duplicates.is_empty() {
                report.deduplicated = self.collapse_duplicates(agent.id)?;
                let mut seen = HashSet::new();
                agent.trigger_mappings.retain(|m| seen.insert(m.trigger_id));
                tracing::info!(
                    agent_id = %agent.id,
                    dropped = report.deduplicated,
                    "Collapsed duplicate trigger assignments"
                );
            }
        }

        let assigned: HashSet<ObjectId> = assigned.into_iter().collect();
        let missing: Vec<ObjectId> = agent
            .all_triggers()
            .into_iter()
            .map(|t| t.id)
            .filter(|id| !assigned.contains(id))
            .collect();

        if !missing.is_empty() {
            tracing::debug!(
                agent_id = %agent.id,
                agent = %agent.name,
                missing = missing.len(),
                "Found triggers without trigger assignment"
            );
            report.added = self.add_assignments(agent.id, &missing)?;

            if report.added.len() < missing.len() {
                // another writer got there first; the stored list is authoritative
                agent.trigger_mappings = self.stored_mappings(agent.id)?;
            } else {
                agent
                    .trigger_mappings
                    .extend(report.added.iter().copied().map(TriggerAssignment::new));
            }
        }

        for mapping in agent.trigger_mappings.iter_mut() {
            mapping.trigger = reachable.get(&mapping.trigger_id).cloned();
        }

        Ok(report)
    }

    /// Persist fresh assignments for `trigger_ids` on an agent.
    ///
    /// Triggers that already have an assignment are skipped by the store.
    /// Returns the triggers that actually received one.
    pub fn add_assignments(&self, agent_id: ObjectId, trigger_ids: &[ObjectId]) -> Result<Vec<ObjectId>> {
        let elements = trigger_ids
            .iter()
            .map(|id| serde_json::to_value(TriggerAssignment::new(*id)))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)?;

        let appended = self
            .store
            .append_to_array(Collection::Agents, agent_id, ArrayField::TriggerMappings, elements)
            .map_err(|e| {
                tracing::error!(%agent_id, error = %e, "Couldn't add trigger mappings to agent");
                e
            })?;

        let appended = appended
            .into_iter()
            .map(|doc| {
                serde_json::from_value::<TriggerAssignment>(doc)
                    .map(|m| m.trigger_id)
                    .map_err(|source| CatalogError::Decode {
                        collection: Collection::Agents,
                        source,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        if appended.len() < trigger_ids.len() {
            tracing::debug!(
                %agent_id,
                requested = trigger_ids.len(),
                appended = appended.len(),
                "Some trigger assignments already existed"
            );
        }
        Ok(appended)
    }

    fn remove_assignments(&self, agent_id: ObjectId, trigger_ids: &[ObjectId]) -> Result<usize> {
        self.store
            .remove_from_array(Collection::Agents, agent_id, ArrayField::TriggerMappings, trigger_ids)
            .map_err(|e| {
                tracing::error!(%agent_id, error = %e, "Couldn't remove trigger mappings from agent");
                e.into()
            })
    }

    fn collapse_duplicates(&self, agent_id: ObjectId) -> Result<usize> {
        self.store
            .dedup_array(Collection::Agents, agent_id, ArrayField::TriggerMappings)
            .map_err(|e| {
                tracing::error!(%agent_id, error = %e, "Couldn't collapse duplicate trigger mappings");
                e.into()
            })
    }

    /// Trigger assignments as currently persisted
    fn stored_mappings(&self, agent_id: ObjectId) -> Result<Vec<TriggerAssignment>> {
        let doc = self
            .store
            .get_by_id(Collection::Agents, agent_id)?
            .ok_or_else(|| CatalogError::not_found(Collection::Agents, agent_id))?;
        let stored: Agent = decode(doc)?;
        Ok(stored.trigger_mappings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::resolver::Resolver;
    use crate::models::{AgentOs, Template};
    use crate::storage::testing::{CountingStore, FailingStore};
    use crate::storage::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        triggers: Vec<Trigger>,
        base: Template,
        extra: Template,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let triggers: Vec<Trigger> = (0..3)
            .map(|i| Trigger::new(format!("trigger-{}", i), "last() > 0"))
            .collect();
        for t in &triggers {
            store.insert(t).unwrap();
        }

        let base = Template::new("base").with_triggers([triggers[0].id, triggers[1].id]);
        let extra = Template::new("extra").with_triggers([triggers[1].id, triggers[2].id]);
        store.insert(&base).unwrap();
        store.insert(&extra).unwrap();

        Fixture {
            store,
            triggers,
            base,
            extra,
        }
    }

    fn stored_agent(store: &MemoryStore, id: ObjectId) -> Agent {
        let doc = store.get_by_id(Collection::Agents, id).unwrap().unwrap();
        decode(doc).unwrap()
    }

    fn resolved(store: Arc<dyn DocumentStore>, agent: Agent) -> Agent {
        Resolver::new(store).resolve(agent).unwrap()
    }

    fn assigned_ids(agent: &Agent) -> HashSet<ObjectId> {
        agent.trigger_mappings.iter().map(|m| m.trigger_id).collect()
    }

    #[test]
    fn test_adds_missing_assignments() {
        let f = fixture();
        let agent = Agent::new("web-1", AgentOs::Linux).with_templates([f.base.id, f.extra.id]);
        f.store.insert(&agent).unwrap();

        let mut agent = resolved(f.store.clone(), agent);
        let report = Reconciler::new(f.store.clone()).reconcile(&mut agent).unwrap();

        let expected: Vec<_> = f.triggers.iter().map(|t| t.id).collect();
        assert_eq!(report.added, expected);
        assert!(report.stale.is_empty());

        let persisted = stored_agent(&f.store, agent.id);
        assert_eq!(persisted.trigger_mappings.len(), 3);
        for mapping in &persisted.trigger_mappings {
            assert!(mapping.enabled);
            assert!(!mapping.problematic);
            assert!(mapping.history.is_empty());
        }

        // derived trigger attached in memory
        assert!(agent.trigger_mappings.iter().all(|m| m.trigger.is_some()));
    }

    #[test]
    fn test_completeness() {
        let f = fixture();
        let mut agent = Agent::new("web-1", AgentOs::Linux).with_templates([f.extra.id]);
        agent.trigger_mappings.push(TriggerAssignment::new(f.triggers[1].id));
        f.store.insert(&agent).unwrap();

        let mut agent = resolved(f.store.clone(), agent);
        Reconciler::new(f.store.clone()).reconcile(&mut agent).unwrap();

        let reachable: HashSet<_> = agent.all_triggers().iter().map(|t| t.id).collect();
        assert!(reachable.is_subset(&assigned_ids(&agent)));
        assert!(reachable.is_subset(&assigned_ids(&stored_agent(&f.store, agent.id))));
        assert_eq!(agent.trigger_mappings.len(), 2);
    }

    #[test]
    fn test_second_run_writes_nothing() {
        let f = fixture();
        let agent = Agent::new("web-1", AgentOs::Linux).with_templates([f.base.id, f.extra.id]);
        f.store.insert(&agent).unwrap();

        let counting = Arc::new(CountingStore::new(f.store.clone()));
        let reconciler = Reconciler::new(counting.clone());
        let mut agent = resolved(counting.clone(), agent);

        let first = reconciler.reconcile(&mut agent).unwrap();
        assert!(!first.is_noop());
        assert_eq!(counting.writes(), 1);
        let after_first = assigned_ids(&agent);

        counting.reset();
        let mut reloaded = resolved(counting.clone(), stored_agent(&f.store, agent.id));
        let second = reconciler.reconcile(&mut reloaded).unwrap();

        assert!(second.is_noop());
        assert_eq!(counting.writes(), 0);
        assert_eq!(assigned_ids(&reloaded), after_first);
    }

    #[test]
    fn test_stale_assignment_reported_not_removed() {
        let f = fixture();
        let orphan = ObjectId::new();
        let mut agent = Agent::new("web-1", AgentOs::Linux).with_templates([f.base.id]);
        agent.trigger_mappings.push(TriggerAssignment::new(orphan));
        f.store.insert(&agent).unwrap();

        let mut agent = resolved(f.store.clone(), agent);
        let report = Reconciler::new(f.store.clone()).reconcile(&mut agent).unwrap();

        assert_eq!(report.stale, vec![orphan]);
        assert!(report.removed.is_empty());
        assert!(agent.trigger_mapping(orphan).is_some());
        assert!(agent.trigger_mapping(orphan).unwrap().trigger.is_none());
        assert!(stored_agent(&f.store, agent.id).trigger_mapping(orphan).is_some());
    }

    #[test]
    fn test_stale_assignment_removed_when_configured() {
        let f = fixture();
        let orphan = ObjectId::new();
        let mut agent = Agent::new("web-1", AgentOs::Linux).with_templates([f.base.id]);
        agent.trigger_mappings.push(TriggerAssignment::new(orphan));
        f.store.insert(&agent).unwrap();

        let reconciler = Reconciler::new(f.store.clone()).with_policy(StalePolicy::Remove);
        let mut agent = resolved(f.store.clone(), agent);
        let report = reconciler.reconcile(&mut agent).unwrap();

        assert_eq!(report.removed, vec![orphan]);
        assert!(agent.trigger_mapping(orphan).is_none());
        assert!(stored_agent(&f.store, agent.id).trigger_mapping(orphan).is_none());
    }

    #[test]
    fn test_duplicate_assignments_reported() {
        let f = fixture();
        let t = f.triggers[0].id;
        let mut agent = Agent::new("web-1", AgentOs::Linux).with_templates([f.base.id]);
        agent.trigger_mappings.push(TriggerAssignment::new(t));
        agent.trigger_mappings.push(TriggerAssignment::new(t));
        f.store.insert(&agent).unwrap();

        let mut agent = resolved(f.store.clone(), agent);
        let report = Reconciler::new(f.store.clone()).reconcile(&mut agent).unwrap();

        assert_eq!(report.duplicates, vec![t]);
        assert_eq!(report.deduplicated, 0);
        assert_eq!(report.added, vec![f.triggers[1].id]);
        let copies = |a: &Agent| a.trigger_mappings.iter().filter(|m| m.trigger_id == t).count();
        assert_eq!(copies(&agent), 2);
        assert_eq!(copies(&stored_agent(&f.store, agent.id)), 2);
    }

    #[test]
    fn test_duplicate_assignments_collapsed_when_configured() {
        let f = fixture();
        let t = f.triggers[0].id;
        let mut agent = Agent::new("web-1", AgentOs::Linux).with_templates([f.base.id]);
        let mut first = TriggerAssignment::new(t);
        first.problematic = true;
        agent.trigger_mappings.push(first);
        agent.trigger_mappings.push(TriggerAssignment::new(t));
        f.store.insert(&agent).unwrap();

        let reconciler = Reconciler::new(f.store.clone()).with_policy(StalePolicy::Remove);
        let mut agent = resolved(f.store.clone(), agent);
        let report = reconciler.reconcile(&mut agent).unwrap();

        assert_eq!(report.duplicates, vec![t]);
        assert_eq!(report.deduplicated, 1);
        assert!(!report.is_noop());

        let persisted = stored_agent(&f.store, agent.id);
        let kept: Vec<_> = persisted.trigger_mappings.iter().filter(|m| m.trigger_id == t).collect();
        assert_eq!(kept.len(), 1);
        assert!(kept[0].problematic);
        assert_eq!(agent.trigger_mappings.len(), persisted.trigger_mappings.len());

        let mut reloaded = resolved(f.store.clone(), persisted);
        assert!(reconciler.reconcile(&mut reloaded).unwrap().is_noop());
    }

    #[test]
    fn test_outdated_snapshot_adopts_stored_assignments() {
        let f = fixture();
        let agent = Agent::new("web-1", AgentOs::Linux).with_templates([f.base.id, f.extra.id]);
        f.store.insert(&agent).unwrap();

        let reconciler = Reconciler::new(f.store.clone());
        let mut early = resolved(f.store.clone(), agent.clone());
        let mut late = resolved(f.store.clone(), agent);

        assert_eq!(reconciler.reconcile(&mut early).unwrap().added.len(), 3);
        let report = reconciler.reconcile(&mut late).unwrap();

        assert!(report.added.is_empty());
        let persisted = stored_agent(&f.store, late.id);
        assert_eq!(assigned_ids(&late), assigned_ids(&persisted));
        assert_eq!(late.trigger_mappings.len(), persisted.trigger_mappings.len());
        assert!(late.trigger_mappings.iter().all(|m| m.trigger.is_some()));
    }

    #[test]
    fn test_guard_released_after_reconcile() {
        let f = fixture();
        let agent = Agent::new("web-1", AgentOs::Linux).with_templates([f.base.id]);
        f.store.insert(&agent).unwrap();

        let reconciler = Reconciler::new(f.store.clone());
        let mut agent = resolved(f.store.clone(), agent);
        reconciler.reconcile(&mut agent).unwrap();

        assert!(reconciler.in_flight.is_empty());
    }

    #[test]
    fn test_concurrent_reconcile_does_not_duplicate() {
        let f = fixture();
        let agent = Agent::new("web-1", AgentOs::Linux).with_templates([f.base.id, f.extra.id]);
        f.store.insert(&agent).unwrap();

        let reconciler = Arc::new(Reconciler::new(f.store.clone()));
        // every caller loaded the agent before anyone reconciled it
        let snapshots: Vec<Agent> = (0..8)
            .map(|_| resolved(f.store.clone(), agent.clone()))
            .collect();

        let handles: Vec<_> = snapshots
            .into_iter()
            .map(|mut snapshot| {
                let reconciler = Arc::clone(&reconciler);
                std::thread::spawn(move || reconciler.reconcile(&mut snapshot).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let persisted = stored_agent(&f.store, agent.id);
        assert_eq!(persisted.trigger_mappings.len(), 3);
        assert_eq!(assigned_ids(&persisted).len(), 3);
        assert!(reconciler.in_flight.is_empty());
    }

    #[test]
    fn test_write_failure_propagates() {
        let f = fixture();
        let agent = Agent::new("web-1", AgentOs::Linux).with_templates([f.base.id]);
        f.store.insert(&agent).unwrap();

        let mut agent = resolved(f.store.clone(), agent);
        let failing = Arc::new(FailingStore::new(f.store.clone(), Collection::Agents));
        let err = Reconciler::new(failing).reconcile(&mut agent).unwrap_err();

        assert!(err.is_transport());
        assert!(agent.trigger_mappings.is_empty());
    }

    #[test]
    fn test_add_assignments_skips_existing() {
        let f = fixture();
        let agent = Agent::new("web-1", AgentOs::Linux);
        f.store.insert(&agent).unwrap();
        let reconciler = Reconciler::new(f.store.clone());

        let t = f.triggers[0].id;
        assert_eq!(reconciler.add_assignments(agent.id, &[t]).unwrap(), vec![t]);
        assert_eq!(
            reconciler.add_assignments(agent.id, &[t, f.triggers[1].id]).unwrap(),
            vec![f.triggers[1].id]
        );
    }

    #[test]
    fn test_add_assignments_unknown_agent() {
        let f = fixture();
        let err = Reconciler::new(f.store.clone())
            .add_assignments(ObjectId::new(), &[f.triggers[0].id])
            .unwrap_err();
        assert!(err.is_transport());
    }
}
