//! `xrefsync run`: synchronize identifiers and print per-species summaries.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use xref_core::{config, Species};
use xref_sync::{
    pipeline,
    summary::{format_signed, format_thousands},
    SyncSummary,
};

/// Arguments for `xrefsync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Species to synchronize (name or species key); repeatable. Defaults to
    /// the `species` list of the config.
    #[arg(long, short = 's', value_name = "SPECIES")]
    pub species: Vec<Species>,

    /// Emit the summaries as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = config::load_from(config_path).with_context(|| {
            format!(
                "failed to load config at '{}'; run `xrefsync init` first",
                config_path.display()
            )
        })?;

        let summaries = pipeline::run(&config, &self.species).context("sync failed")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
            return Ok(());
        }
        print_table(&summaries);
        Ok(())
    }
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "species")]
    species: String,
    #[tabled(rename = "inserted")]
    inserted: String,
    #[tabled(rename = "deleted")]
    deleted: String,
    #[tabled(rename = "up-to-date")]
    unchanged: String,
    #[tabled(rename = "total")]
    total: String,
    #[tabled(rename = "difference")]
    difference: String,
}

fn print_table(summaries: &[SyncSummary]) {
    let rows: Vec<SummaryRow> = summaries
        .iter()
        .map(|s| SummaryRow {
            species: s.species.to_string(),
            inserted: format_thousands(s.inserted),
            deleted: format_thousands(s.deleted),
            unchanged: format_thousands(s.unchanged),
            total: format_thousands(s.total_after),
            difference: if s.delta == 0 {
                "no changes".to_string()
            } else {
                format_signed(s.delta).trim_start().to_string()
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let changed = summaries.iter().filter(|s| s.delta != 0 || s.inserted > 0).count();
    println!(
        "{} synced {} species ({} changed)",
        "✓".green(),
        summaries.len(),
        changed
    );
}
