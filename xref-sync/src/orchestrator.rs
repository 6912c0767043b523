//! Per-species synchronization run.
//!
//! ## Run protocol
//!
//! ```text
//! Start → FetchExisting → FetchIncoming → Reconcile
//!       → ApplyInsert → ApplyDelete → ApplyTouch → Report → Done
//! ```
//!
//! Any error moves the run to `Failed` and skips every remaining step.
//! Applied batches are not rolled back: the next run re-diffs and converges.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use xref_core::{
    config::ImportSettings, GeneRepository, IdentifierRecord, IdentifierRepository, NamespaceKey,
    RecordKey, SourcePipeline, Species, StoreError,
};

use crate::audit::{AuditEvent, AuditKind, AuditSink};
use crate::error::SyncError;
use crate::reconcile::{self, Reconciliation};
use crate::summary::{format_elapsed, format_thousands, SyncSummary};

// ---------------------------------------------------------------------------
// Scope and steps
// ---------------------------------------------------------------------------

/// The slice of the store one run owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunScope {
    pub species: Species,
    pub namespace_key: NamespaceKey,
    pub source_pipeline: SourcePipeline,
}

impl fmt::Display for RunScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [namespace {}, pipeline {}]",
            self.species, self.namespace_key, self.source_pipeline
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncStep {
    Start,
    FetchExisting,
    FetchIncoming,
    Reconcile,
    ApplyInsert,
    ApplyDelete,
    ApplyTouch,
    Report,
    Done,
    Failed,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStep::Start => "start",
            SyncStep::FetchExisting => "fetch-existing",
            SyncStep::FetchIncoming => "fetch-incoming",
            SyncStep::Reconcile => "reconcile",
            SyncStep::ApplyInsert => "apply-insert",
            SyncStep::ApplyDelete => "apply-delete",
            SyncStep::ApplyTouch => "apply-touch",
            SyncStep::Report => "report",
            SyncStep::Done => "done",
            SyncStep::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Read-only outcome of steps 1–3, used for dry runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub scope: RunScope,
    pub total_before: usize,
    pub reconciliation: Reconciliation,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives reconciliation runs against an identifier store.
pub struct SyncOrchestrator<I, G, A> {
    settings: ImportSettings,
    identifiers: I,
    genes: G,
    audit: A,
    step: SyncStep,
}

impl<I, G, A> SyncOrchestrator<I, G, A>
where
    I: IdentifierRepository,
    G: GeneRepository,
    A: AuditSink,
{
    pub fn new(settings: ImportSettings, identifiers: I, genes: G, audit: A) -> Self {
        Self {
            settings,
            identifiers,
            genes,
            audit,
            step: SyncStep::Start,
        }
    }

    pub fn identifiers(&self) -> &I {
        &self.identifiers
    }

    pub fn into_identifiers(self) -> I {
        self.identifiers
    }

    /// State reached by the most recent [`run`](Self::run).
    pub fn last_step(&self) -> SyncStep {
        self.step
    }

    pub fn scope(&self, species: Species) -> RunScope {
        RunScope {
            species,
            namespace_key: self.settings.namespace_key,
            source_pipeline: self.settings.source_pipeline.clone(),
        }
    }

    /// Stored records owned by this scope.
    pub fn fetch_existing(&self, scope: &RunScope) -> Result<Vec<IdentifierRecord>, SyncError> {
        self.identifiers
            .fetch_existing(scope.namespace_key, &scope.source_pipeline, scope.species)
            .map_err(fetch_err(scope, SyncStep::FetchExisting))
    }

    /// Fresh records derived from the external accessions of every active
    /// gene, stamped with `now`. Duplicates are collapsed.
    pub fn fetch_incoming(
        &self,
        scope: &RunScope,
        now: DateTime<Utc>,
    ) -> Result<Vec<IdentifierRecord>, SyncError> {
        let on_err = || fetch_err(scope, SyncStep::FetchIncoming);
        let genes = self.genes.active_genes(scope.species).map_err(on_err())?;
        tracing::debug!("{}: {} active genes", scope, genes.len());

        let mut incoming = Vec::with_capacity(genes.len());
        for gene in &genes {
            let accessions = self
                .identifiers
                .fetch_external_accessions(gene.subject_id, self.settings.external_namespace_key)
                .map_err(on_err())?;
            incoming.extend(accessions.into_iter().map(|acc| {
                IdentifierRecord::new(
                    acc.subject_id,
                    scope.namespace_key,
                    acc.accession_id,
                    scope.source_pipeline.clone(),
                    now,
                )
            }));
        }
        Ok(reconcile::dedup(incoming))
    }

    /// Steps 1–3 without touching the store.
    pub fn plan(&self, species: Species) -> Result<SyncPlan, SyncError> {
        let scope = self.scope(species);
        let existing = self.fetch_existing(&scope)?;
        let incoming = self.fetch_incoming(&scope, Utc::now())?;
        let total_before = existing.len();
        let reconciliation = checked_reconcile(&scope, existing, incoming)?;
        Ok(SyncPlan {
            scope,
            total_before,
            reconciliation,
        })
    }

    /// Run the full protocol for `species`.
    pub fn run(&mut self, species: Species) -> Result<SyncSummary, SyncError> {
        let started = Instant::now();
        let scope = self.scope(species);
        self.step = SyncStep::Start;

        match self.run_steps(&scope, started) {
            Ok(summary) => {
                self.transition(&scope, SyncStep::Done);
                Ok(summary)
            }
            Err(err) => {
                tracing::warn!("{scope}: run failed during {}: {err}", self.step);
                self.step = SyncStep::Failed;
                Err(err)
            }
        }
    }

    fn run_steps(&mut self, scope: &RunScope, started: Instant) -> Result<SyncSummary, SyncError> {
        let species = scope.species;
        let pipeline = &scope.source_pipeline;

        self.transition(scope, SyncStep::FetchExisting);
        let existing = self.fetch_existing(scope)?;
        let total_before = existing.len();

        self.transition(scope, SyncStep::FetchIncoming);
        let now = Utc::now();
        let incoming = self.fetch_incoming(scope, now)?;

        self.transition(scope, SyncStep::Reconcile);
        let Reconciliation {
            to_insert,
            to_delete,
            matching,
        } = checked_reconcile(scope, existing, incoming)?;

        self.transition(scope, SyncStep::ApplyInsert);
        if !to_insert.is_empty() {
            tracing::info!("{species} {pipeline} ids inserted:   {}", format_thousands(to_insert.len()));
            let rows = self
                .identifiers
                .insert_records(&to_insert)
                .map_err(apply_err(scope, SyncStep::ApplyInsert))?;
            tracing::debug!("{scope}: store inserted {rows} rows");
            self.audit_all(AuditKind::Inserted, &to_insert);
        }

        self.transition(scope, SyncStep::ApplyDelete);
        if !to_delete.is_empty() {
            tracing::info!("{species} {pipeline} ids deleted:    {}", format_thousands(to_delete.len()));
            let rows = self
                .identifiers
                .delete_records(&to_delete)
                .map_err(apply_err(scope, SyncStep::ApplyDelete))?;
            tracing::debug!("{scope}: store deleted {rows} rows");
            self.audit_all(AuditKind::Deleted, &to_delete);
        }

        self.transition(scope, SyncStep::ApplyTouch);
        if !matching.is_empty() {
            tracing::info!("{species} {pipeline} ids up-to-date: {}", format_thousands(matching.len()));
            let keys: Vec<RecordKey> = matching.iter().filter_map(|r| r.record_key).collect();
            if keys.len() < matching.len() {
                tracing::warn!(
                    "{scope}: {} matching records carry no record key; not touched",
                    matching.len() - keys.len()
                );
            }
            if !keys.is_empty() {
                let rows = self
                    .identifiers
                    .touch_modified(&keys, now)
                    .map_err(apply_err(scope, SyncStep::ApplyTouch))?;
                tracing::debug!("{scope}: store touched {rows} rows");
            }
        }

        self.transition(scope, SyncStep::Report);
        let elapsed = started.elapsed();
        let summary = SyncSummary::new(
            scope,
            total_before,
            to_insert.len(),
            to_delete.len(),
            matching.len(),
            elapsed,
        );
        tracing::info!("{}", summary.total_line());
        tracing::info!("=== OK ===  elapsed {}", format_elapsed(elapsed));
        Ok(summary)
    }

    fn audit_all(&self, kind: AuditKind, records: &[IdentifierRecord]) {
        for record in records {
            self.audit.emit(AuditEvent { kind, record });
        }
        self.audit.flush();
    }

    fn transition(&mut self, scope: &RunScope, next: SyncStep) {
        tracing::debug!("{scope}: {} -> {next}", self.step);
        self.step = next;
    }
}

/// Reconcile and verify the partition before anything is applied.
fn checked_reconcile(
    scope: &RunScope,
    existing: Vec<IdentifierRecord>,
    incoming: Vec<IdentifierRecord>,
) -> Result<Reconciliation, SyncError> {
    let existing_len = existing.len();
    let incoming_unique = reconcile::unique_count(&incoming);
    let result = reconcile::reconcile(existing, incoming);
    result
        .check_invariants(existing_len, incoming_unique)
        .map_err(|violation| SyncError::InvariantViolation {
            scope: scope.clone(),
            violation,
        })?;
    Ok(result)
}

fn fetch_err(scope: &RunScope, step: SyncStep) -> impl FnOnce(StoreError) -> SyncError + '_ {
    move |source| SyncError::Fetch {
        scope: scope.clone(),
        step,
        source,
    }
}

fn apply_err(scope: &RunScope, step: SyncStep) -> impl FnOnce(StoreError) -> SyncError + '_ {
    move |source| SyncError::Apply {
        scope: scope.clone(),
        step,
        source,
    }
}

#[cfg(test)]
mod tests {
    use xref_core::{store::MemoryStore, Gene, GeneKind, SubjectId};

    use super::*;
    use crate::audit::LogAuditSink;

    fn settings() -> ImportSettings {
        ImportSettings {
            source_pipeline: SourcePipeline::from("RatGTEx"),
            namespace_key: NamespaceKey(150),
            external_namespace_key: NamespaceKey::ENSEMBL_GENES,
        }
    }

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.add_gene(Gene {
            subject_id: SubjectId(1),
            symbol: "A2m".into(),
            species: Species::Rat,
            kind: GeneKind::Gene,
            active: true,
        });
        store
            .insert_records(&[IdentifierRecord::new(
                SubjectId(1),
                NamespaceKey::ENSEMBL_GENES,
                "ENSRNOG001",
                SourcePipeline::from("Ensembl"),
                Utc::now(),
            )])
            .unwrap();
        store
    }

    #[test]
    fn run_ends_in_done() {
        let store = seeded();
        let genes = store.gene_table();
        let mut orch = SyncOrchestrator::new(settings(), store, genes, LogAuditSink);
        let summary = orch.run(Species::Rat).unwrap();
        assert_eq!(orch.last_step(), SyncStep::Done);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.total_after, 1);
    }

    #[test]
    fn plan_does_not_write() {
        let store = seeded();
        let genes = store.gene_table();
        let orch = SyncOrchestrator::new(settings(), store, genes, LogAuditSink);
        let plan = orch.plan(Species::Rat).unwrap();
        assert_eq!(plan.reconciliation.to_insert.len(), 1);
        assert_eq!(plan.total_before, 0);
        assert_eq!(orch.identifiers().records().len(), 1);
    }

    #[test]
    fn scope_display_names_species_and_pipeline() {
        let scope = RunScope {
            species: Species::Rat,
            namespace_key: NamespaceKey(150),
            source_pipeline: SourcePipeline::from("RatGTEx"),
        };
        assert_eq!(scope.to_string(), "Rat [namespace 150, pipeline RatGTEx]");
        assert_eq!(SyncStep::ApplyDelete.to_string(), "apply-delete");
    }
}
