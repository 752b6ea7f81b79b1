//! Reconciliation: re-locating bookmarks after file drift

mod engine;

pub use engine::{apply_result, reconcile, reconcile_lines, ValidationResult};
