//! # xref-sync
//!
//! Reconciliation of stored cross-reference identifiers against a freshly
//! derived incoming set, and the run protocol that applies the difference.
//!
//! [`reconcile::reconcile`] computes the insert / delete / up-to-date split;
//! [`SyncOrchestrator`] fetches both sides, applies the split through the
//! repository traits and returns a [`SyncSummary`]. [`pipeline::run`] wires
//! everything from a [`xref_core::SyncConfig`].

pub mod audit;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod reconcile;
pub mod summary;

pub use audit::{AuditEvent, AuditKind, AuditSink, FileAuditSink, LogAuditSink};
pub use error::SyncError;
pub use orchestrator::{RunScope, SyncOrchestrator, SyncPlan, SyncStep};
pub use reconcile::{reconcile, InvariantViolation, Reconciliation};
pub use summary::SyncSummary;
