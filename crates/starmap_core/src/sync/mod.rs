//! Drift detection and reconciliation between the two stores.

pub mod diff;
pub mod reconcile;

pub use diff::{compare, DiffField, FieldDifference, SyncReport, DIFF_LIST_LIMIT};
pub use reconcile::{SyncDirection, SyncOutcome, Synchronizer};
