//! Shared entrypoint used by `xrefsync run` and `xrefsync diff`.
//!
//! Opens the JSON store named in the config, wires the audit sink and runs
//! each requested species in order. The first failure stops the pipeline.

use std::time::Instant;

use chrono::Local;

use xref_core::{
    store::{GeneTable, JsonStore},
    IdentifierRepository, Species, SyncConfig,
};

use crate::audit::{AuditSink, FileAuditSink, LogAuditSink};
use crate::orchestrator::{SyncOrchestrator, SyncPlan};
use crate::summary::{append_summary_log, format_elapsed, SyncSummary};
use crate::SyncError;

/// Species to process: the explicit selection, else the configured list.
pub fn select_species(config: &SyncConfig, requested: &[Species]) -> Vec<Species> {
    if requested.is_empty() {
        config.species.clone()
    } else {
        requested.to_vec()
    }
}

/// Audit sink for `config`: audit files when `logging.audit_dir` is set,
/// otherwise the `inserted` / `deleted` log targets.
pub fn audit_sink(config: &SyncConfig) -> Box<dyn AuditSink> {
    match config.logging.audit_dir.as_deref() {
        Some(dir) => match FileAuditSink::open(dir, &config.logging.rotation) {
            Ok(sink) => Box::new(sink),
            Err(err) => {
                tracing::warn!("audit logs unavailable, falling back to log targets: {err}");
                Box::new(LogAuditSink)
            }
        },
        None => Box::new(LogAuditSink),
    }
}

fn orchestrator(
    config: &SyncConfig,
    audit: Box<dyn AuditSink>,
) -> Result<SyncOrchestrator<JsonStore, GeneTable, Box<dyn AuditSink>>, SyncError> {
    let store = JsonStore::open(&config.storage.data_dir)?;
    let genes = store.gene_table();
    Ok(SyncOrchestrator::new(config.import.clone(), store, genes, audit))
}

/// Synchronize every selected species and return one summary per species.
pub fn run(config: &SyncConfig, species: &[Species]) -> Result<Vec<SyncSummary>, SyncError> {
    let started = Instant::now();
    let mut orch = orchestrator(config, audit_sink(config))?;

    tracing::info!("{}", config.version);
    tracing::info!("  {}", orch.identifiers().describe());
    tracing::info!("   started at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));

    let mut summaries = Vec::new();
    for sp in select_species(config, species) {
        let summary = orch.run(sp)?;
        if let Some(path) = config.logging.summary_log.as_deref() {
            if let Err(err) = append_summary_log(path, &summary) {
                tracing::warn!("could not record summary for {sp}: {err}");
            }
        }
        summaries.push(summary);
    }

    tracing::info!("=== OK === elapsed {}", format_elapsed(started.elapsed()));
    Ok(summaries)
}

/// Dry run: reconcile every selected species without writing anything.
pub fn plan(config: &SyncConfig, species: &[Species]) -> Result<Vec<SyncPlan>, SyncError> {
    let orch = orchestrator(config, Box::new(LogAuditSink))?;
    select_species(config, species)
        .into_iter()
        .map(|sp| orch.plan(sp))
        .collect()
}
