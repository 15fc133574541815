pub mod reconcile;

pub use reconcile::{run_reconcile_cycle, CycleStats, ReconcileWorker};
