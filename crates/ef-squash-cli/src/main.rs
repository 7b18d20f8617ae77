mod commands;
mod logging;
mod prompt;
mod reporter;

use std::env;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use colored::*;
use commands::Cli;
use dotenv::dotenv;
use ef_squash_core::config::resolve_migrations_dir;
use ef_squash_core::{
    IdGenerator, ProcessRunner, SquashConfig, SquashOrchestrator, SquashOutcome, SquashRequest,
};
use prompt::ConsoleConfirm;
use reporter::ConsoleReporter;
use tracing::info;

fn main() -> ExitCode {
    dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if cli.no_color {
        colored::control::set_override(false);
    }
    let _guard = logging::init_logger(cli.verbose, !cli.no_color);

    // Forwarded to dotnet-ef exactly as received.
    let passthrough = args.into_iter().skip(1).collect();

    match run(&cli, passthrough) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}", format!("{:#}", err).red());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, passthrough: Vec<String>) -> anyhow::Result<ExitCode> {
    let config = SquashConfig::load().context("Error loading configuration")?;
    let cwd = env::current_dir().context("Cannot determine the current directory")?;
    let migrations_dir = resolve_migrations_dir(
        cli.output_dir.as_deref(),
        cli.project.as_deref(),
        &cwd,
        &config.migrations_folder,
    );
    info!("Migrations directory: {}", migrations_dir.display());

    let ids = IdGenerator::new();
    let orchestrator = SquashOrchestrator::new(
        &config,
        &ids,
        ProcessRunner,
        &ConsoleConfirm,
        &ConsoleReporter,
    )?;

    let outcome = orchestrator.run(&SquashRequest {
        migrations_dir,
        passthrough,
    })?;

    match outcome {
        SquashOutcome::Completed(summary) => {
            println!(
                "Backups kept: {} and {}",
                summary.script_path.display(),
                summary.bundle_path.display()
            );
            println!("{}", "Squash operation completed successfully.".green());
            Ok(ExitCode::SUCCESS)
        }
        SquashOutcome::Declined(gate) => {
            info!("Declined at {:?}", gate);
            println!("Exiting.");
            Ok(ExitCode::SUCCESS)
        }
    }
}
