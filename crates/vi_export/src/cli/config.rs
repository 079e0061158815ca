//! `vi-export config` - show the resolved configuration.

use anyhow::{Context, Result};
use clap::Args;
use vi_export::config::default_config_path;

use super::error::HelpfulError;
use super::SettingsArgs;

/// Arguments for the config command
#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Show resolved configuration in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run the config command. The password is always redacted.
pub fn run(args: ConfigArgs) -> Result<()> {
    let source = args
        .settings
        .config
        .clone()
        .or_else(default_config_path);
    let config = args
        .settings
        .resolve()
        .map_err(|e| HelpfulError::from_config(&e))?
        .redacted();

    if args.json {
        let output = serde_json::json!({
            "config_file": source.as_ref().map(|p| p.to_string_lossy().into_owned()),
            "config_file_exists": source.as_ref().map(|p| p.exists()).unwrap_or(false),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match &source {
            Some(path) if path.exists() => println!("# Loaded from {}", path.display()),
            Some(path) => println!("# {} not found, using defaults", path.display()),
            None => println!("# No config location, using defaults"),
        }
        let rendered = toml::to_string(&config).context("Failed to render configuration")?;
        print!("{}", rendered);
    }
    Ok(())
}
