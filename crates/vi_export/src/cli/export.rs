//! `vi-export export` - fetch, merge and write the CMSDB import files.
//!
//! # Usage
//!
//! ```bash
//! # Defaults from ~/.vi_export/config.toml
//! vi-export export
//!
//! # Other cutoff, into ./out
//! vi-export export --cutoff 2024-06-30 -o out
//!
//! # Show the pages without writing them
//! vi-export export --whatif
//! ```

use anyhow::{Context, Result};
use clap::Args;
use tracing::debug;
use vi_export::pipeline;
use vi_export::ExportSummary;

use super::error::HelpfulError;
use super::SettingsArgs;

/// Arguments for the `export` command
#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Dry run - fetch and plan the pages without writing files
    #[arg(long)]
    pub whatif: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ExportArgs) -> Result<()> {
    let config = args
        .settings
        .resolve()
        .map_err(|e| HelpfulError::from_config(&e))?;
    debug!(config = ?config.redacted(), "Resolved configuration");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let summary = runtime
        .block_on(pipeline::run(&config, args.whatif))
        .map_err(|e| HelpfulError::from_export(&e))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &ExportSummary) {
    println!(
        "Fetched {} inspection reports, {} export rows (max {} per file)",
        summary.fetched, summary.exported, summary.page_size
    );
    if summary.pages.is_empty() {
        println!("Nothing to export.");
        return;
    }

    let verb = if summary.dry_run { "Would write" } else { "Wrote" };
    for page in &summary.pages {
        println!("  {} {} ({} rows)", verb, page.path.display(), page.rows);
    }
}
