//! strata binary
//!
//! Reads line-protocol messages on stdin, loads them into the configured
//! database and writes the final state as one JSON line to stdout.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};

use strata::{open_connection, persist_lines, TargetConfig};
use strata_logging::{init_logging, LogConfig};

#[derive(Parser, Debug)]
#[command(name = "strata", version, about = "Load line-protocol streams into a relational database")]
struct Cli {
    /// JSON configuration file
    #[arg(short = 'c', long, env = "STRATA_CONFIG")]
    config: PathBuf,

    /// Debug-level logging for strata crates
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "strata",
        verbose: cli.verbose,
        quiet: cli.quiet,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = TargetConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;
    let target = config
        .connection
        .target()
        .context("Invalid connection settings")?;
    let mut db = open_connection(&target).context("Failed to connect to target database")?;

    let stdin = io::stdin();
    let state = persist_lines(&config, stdin.lock(), &mut db).context("Failed to load input")?;

    if let Some(state) = state {
        let line = serde_json::to_string(&state).context("Failed to serialize state")?;
        debug!(state = %line, "Emitting state");
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", line).context("Failed to write state")?;
        stdout.flush().context("Failed to flush state")?;
    }
    debug!("Exiting normally");
    Ok(())
}
