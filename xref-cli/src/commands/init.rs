//! `xrefsync init [--force]`

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use xref_core::{config, store::JsonStore};

/// Write a default config and create an empty store next to it.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config with the defaults. The store is never
    /// overwritten.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let existed = config_path.exists();
        let config = config::init_config(config_path, self.force)
            .with_context(|| format!("failed to init config at '{}'", config_path.display()))?;
        let store = JsonStore::init(&config.storage.data_dir).with_context(|| {
            format!(
                "failed to create store under '{}'",
                config.storage.data_dir.display()
            )
        })?;

        let verb = if existed && !self.force { "Kept" } else { "Wrote" };
        println!("{} {verb} config: {}", "✓".green(), config_path.display());
        println!("  Store: {}", store.path().display());
        println!(
            "  Pipeline '{}' → namespace {} (source namespace {})",
            config.import.source_pipeline,
            config.import.namespace_key,
            config.import.external_namespace_key
        );
        Ok(())
    }
}
