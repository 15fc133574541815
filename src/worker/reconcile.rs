use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{Instrument, Span};

use crate::catalog::{Catalog, Result};

/// Totals for one reconcile cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub agents: usize,
    pub assignments_added: usize,
    pub stale_assignments: usize,
    pub assignments_removed: usize,
    pub duplicate_assignments: usize,
}

/// Reconcile worker that periodically loads every agent
pub struct ReconcileWorker {
    catalog: Arc<Catalog>,
    interval: Duration,
    running: Arc<AtomicBool>,
    span: Span,
}

impl ReconcileWorker {
    pub fn new(catalog: Arc<Catalog>, interval: Duration) -> Self {
        Self {
            catalog,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            span: tracing::info_span!("reconcile_worker"),
        }
    }

    /// Emit this worker's logs inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Start the background worker.
    ///
    /// A failed cycle is logged and retried on the next tick, never sooner.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        let span = self.span.clone();

        tokio::spawn(async move {
            tracing::info!("Reconcile worker started with interval {:?}", self.interval);

            let mut interval = time::interval(self.interval);

            while self.running.load(Ordering::SeqCst) {
                interval.tick().await;
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }

                match run_reconcile_cycle(&self.catalog) {
                    Ok(stats) => {
                        if stats.assignments_added > 0 || stats.assignments_removed > 0 {
                            tracing::info!(
                                agents = stats.agents,
                                added = stats.assignments_added,
                                removed = stats.assignments_removed,
                                "Reconcile cycle changed trigger assignments"
                            );
                        }
                        if stats.duplicate_assignments > 0 {
                            tracing::warn!(
                                duplicates = stats.duplicate_assignments,
                                "Agents carry duplicate trigger assignments"
                            );
                        }
                        if stats.stale_assignments > 0 {
                            tracing::debug!(
                                stale = stats.stale_assignments,
                                "Agents still carry outdated trigger assignments"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Reconcile cycle failed");
                    }
                }
            }

            tracing::info!("Reconcile worker stopped");
        }
        .instrument(span))
    }

    /// Stop the worker
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if worker is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Run one reconcile cycle over all agents (for manual/testing use)
pub fn run_reconcile_cycle(catalog: &Catalog) -> Result<CycleStats> {
    let loaded = catalog.load_all_agents()?;

    let mut stats = CycleStats {
        agents: loaded.len(),
        ..Default::default()
    };
    for (_, report) in &loaded {
        stats.assignments_added += report.added.len();
        stats.stale_assignments += report.stale.len();
        stats.assignments_removed += report.removed.len();
        stats.duplicate_assignments += report.duplicates.len();
    }
    Ok(stats)
}
