//! `xrefsync diff`: show the insert / delete plan without applying it.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use xref_core::{config, Species};
use xref_sync::{pipeline, summary::format_thousands, SyncPlan};

/// Arguments for `xrefsync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Species to diff (name or species key); repeatable.
    #[arg(long, short = 's', value_name = "SPECIES")]
    pub species: Vec<Species>,
}

impl DiffArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = config::load_from(config_path).with_context(|| {
            format!("failed to load config at '{}'", config_path.display())
        })?;

        let plans = pipeline::plan(&config, &self.species).context("diff failed")?;
        for plan in &plans {
            print_plan(plan);
        }
        Ok(())
    }
}

fn print_plan(plan: &SyncPlan) {
    let r = &plan.reconciliation;
    if r.is_noop() {
        println!(
            "No differences for {} ({} up-to-date).",
            plan.scope,
            format_thousands(r.matching.len())
        );
        return;
    }

    println!(
        "{}: {} to insert, {} to delete, {} up-to-date",
        plan.scope,
        format_thousands(r.to_insert.len()),
        format_thousands(r.to_delete.len()),
        format_thousands(r.matching.len())
    );
    for record in &r.to_insert {
        let line = format!("+ {} {}", record.subject_id, record.accession_id);
        println!("{}", line.green());
    }
    for record in &r.to_delete {
        let line = format!("- {} {}", record.subject_id, record.accession_id);
        println!("{}", line.red());
    }
}
