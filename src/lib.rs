//! Flowkeeper: monitoring data and alerting core
//!
//! Agents run checks ("items") grouped into reusable templates; alerting rules
//! ("triggers") read aggregates over item results to decide whether an agent
//! is in a problematic state.
//!
//! # Features
//!
//! - **Composition Resolution**: Inline an agent's templates, items and triggers
//!   with batched store lookups and first-seen deduplication
//! - **Assignment Reconciliation**: Keep per-agent trigger assignments complete,
//!   idempotently and without duplicates under concurrent runs
//! - **Metric Evaluation**: MIN, MAX, AVG, DIFF and LAST over newest-first result history
//! - **Pluggable Store**: Any document store implementing `DocumentStore`; an
//!   in-memory implementation is included
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use flowkeeper::catalog::Catalog;
//! use flowkeeper::models::{Agent, AgentOs, Template, Trigger};
//! use flowkeeper::storage::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new());
//! let trigger = Trigger::new("high load", "avg(5) > 4");
//! let template = Template::new("linux base").with_triggers([trigger.id]);
//! let agent = Agent::new("web-1", AgentOs::Linux).with_templates([template.id]);
//! store.insert(&trigger).unwrap();
//! store.insert(&template).unwrap();
//! store.insert(&agent).unwrap();
//!
//! let catalog = Catalog::new(store);
//! let agent = catalog.get_agent(agent.id).unwrap();
//! assert!(agent.trigger_mapping(trigger.id).is_some());
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod eval;
pub mod models;
pub mod storage;
pub mod worker;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogError, ReconcileReport, StalePolicy};
pub use config::CoreConfig;
pub use error::{Error, Result};
pub use eval::{AvgMode, EvalError, Evaluator, MetricFunction};
pub use models::{Agent, CheckResult, Item, ObjectId, ResultSet, Template, Trigger, TriggerAssignment};
pub use storage::{DocumentStore, MemoryStore, StoreError};

/// Crate version as reported to peers and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub comment: &'static str,
}

pub fn version() -> Version {
    Version {
        major: env!("CARGO_PKG_VERSION_MAJOR").parse().unwrap_or(0),
        minor: env!("CARGO_PKG_VERSION_MINOR").parse().unwrap_or(0),
        patch: env!("CARGO_PKG_VERSION_PATCH").parse().unwrap_or(0),
        comment: "alpha",
    }
}
