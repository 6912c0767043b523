//! Error types for xref-sync.

use std::path::PathBuf;

use thiserror::Error;

use xref_core::{ConfigError, StoreError};

use crate::orchestrator::{RunScope, SyncStep};
use crate::reconcile::InvariantViolation;

/// All errors that can end a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reading stored or incoming records failed; nothing was applied.
    #[error("{scope}: fetch failed during {step}: {source}")]
    Fetch {
        scope: RunScope,
        step: SyncStep,
        #[source]
        source: StoreError,
    },

    /// An insert / delete / touch batch failed. Earlier batches stay applied
    /// and later ones are skipped.
    #[error("{scope}: apply failed during {step}: {source}")]
    Apply {
        scope: RunScope,
        step: SyncStep,
        #[source]
        source: StoreError,
    },

    /// The reconciler produced an inconsistent partition. This is a defect in
    /// record equality, not a runtime condition; the run stops before applying.
    #[error("{scope}: reconciliation invariant violated: {violation}")]
    InvariantViolation {
        scope: RunScope,
        #[source]
        violation: InvariantViolation,
    },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Opening the store before any run started.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("summary JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// The step a run failed in, for fetch and apply failures.
    pub fn step(&self) -> Option<SyncStep> {
        match self {
            SyncError::Fetch { step, .. } | SyncError::Apply { step, .. } => Some(*step),
            SyncError::InvariantViolation { .. } => Some(SyncStep::Reconcile),
            _ => None,
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
