use colored::*;
use ef_squash_core::{SquashReporter, SquashState, ToolOutput, ToolStep};

/// Console reporter: relays dotnet-ef output verbatim and narrates each
/// pipeline step.
pub struct ConsoleReporter;

impl SquashReporter for ConsoleReporter {
    fn on_state(&self, state: SquashState) {
        let message = match state {
            SquashState::UserConfirmedBackup => "Creating backup scripts for existing migrations.",
            SquashState::BackupScripted => {
                "Creating bundle self contained file for existing migrations."
            }
            SquashState::UserConfirmedDestroy => "Cleaning up migration files.",
            SquashState::FilesCleaned => "Regenerating the initial migration.",
            SquashState::MigrationRegenerated => "Restoring the original migration identity.",
            _ => return,
        };
        println!("{}", message);
    }

    fn on_initial_migration(&self, primary: &str, companion: &str) {
        println!("Found initial migration file: {}", primary.cyan());
        println!("Companion file: {}", companion.cyan());
    }

    fn on_tool_output(&self, step: ToolStep, output: &ToolOutput) {
        if !output.stdout.is_empty() {
            println!("{}", output.stdout);
        }
        if !output.stderr.is_empty() {
            eprintln!("{}", output.stderr.red());
        }
        if !output.success() {
            eprintln!("{}", format!("dotnet-ef {} failed.", step).red());
        }
    }

    fn on_file_skipped(&self, name: &str) {
        println!("Skipping generated backup file {}", name);
    }

    fn on_file_removed(&self, name: &str) {
        println!("Deleting file {}", name);
    }

    fn on_file_staged(&self, name: &str, staged_as: &str) {
        println!("Setting aside file {} as {}", name, staged_as.dimmed());
    }

    fn on_staged_restored(&self, restored: usize) {
        println!(
            "{}",
            format!("Restored {} migration files that were set aside.", restored).yellow()
        );
    }

    fn on_staged_committed(&self, removed: usize) {
        println!("Removed {} old migration files.", removed);
    }

    fn on_identity_rewritten(&self, file: &str, identity: &str) {
        println!(
            "Replacing the Migration attribute argument in {} with {}.",
            file,
            identity.cyan()
        );
    }

    fn on_file_renamed(&self, from: &str, to: &str) {
        println!("Renaming {} to {}", from, to.cyan());
    }
}
