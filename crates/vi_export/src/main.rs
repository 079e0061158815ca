//! VI export launcher
//!
//! Run-to-completion batch job: one query, one merge, one set of CSV files.

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use vi_export_logging::{init_logging, LogConfig};

mod cli;

#[derive(Parser, Debug)]
#[command(
    name = "vi-export",
    version,
    about = "Export visual-inspection records as CMSDB import CSV files"
)]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export inspection records newer than the cutoff into paginated CSV files
    Export(cli::export::ExportArgs),

    /// Show the resolved configuration (password redacted)
    Config(cli::config::ConfigArgs),
}

impl Commands {
    fn wants_json(&self) -> bool {
        match self {
            Commands::Export(args) => args.json,
            Commands::Config(args) => args.json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = cli.command.wants_json();

    if let Err(err) = init_logging(LogConfig {
        app_name: "vi-export",
        verbose: cli.verbose,
        quiet: json_mode,
    }) {
        eprintln!("Warning: logging unavailable: {:#}", err);
    }

    let result = match cli.command {
        Commands::Export(args) => cli::export::run(args),
        Commands::Config(args) => cli::config::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{:#}", err);
            }
            ExitCode::from(1)
        }
    }
}
