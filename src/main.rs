// src/main.rs

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.default_log_level())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Assemble {
            config,
            output,
            report,
            no_progress,
        } => commands::cmd_assemble(&config, output.as_deref(), report.as_deref(), !no_progress, quiet),
        Commands::Plan { config, format } => commands::cmd_plan(&config, format),
        Commands::Inspect {
            jar,
            manifest,
            entries,
        } => commands::cmd_inspect(&jar, manifest, entries),
        Commands::Init { dir, name, force } => commands::cmd_init(&dir, name.as_deref(), force),
    }
}

/// Process exit status for a failed command
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<jarforge::Error>())
        .map(jarforge::Error::exit_code)
        .unwrap_or(1)
}
