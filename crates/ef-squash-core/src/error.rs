use std::path::PathBuf;

use thiserror::Error;

use crate::tool::ToolStep;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid migration name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(
        "{program} is not available ({reason}). Please ensure that the .NET SDK and the dotnet-ef tool are installed."
    )]
    ToolUnavailable { program: String, reason: String },

    #[error("Failed to start '{program}' for {step}: {source}")]
    ToolSpawn {
        step: ToolStep,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Migrations directory {} does not exist", .dir.display())]
    MigrationsDirMissing { dir: PathBuf },

    #[error("No existing migrations found in {}", .dir.display())]
    NoInitialMigrationFound { dir: PathBuf },

    #[error("{step} failed with exit code {exit_code}")]
    ExternalCommandFailed { step: ToolStep, exit_code: i32 },

    #[error("'{name}' is not a migration file name of the form <id>_<Name>")]
    UnrecognizedMigrationName { name: String },

    #[error("Companion file '{name}' cannot be rewritten: only C# sources are supported")]
    UnsupportedCompanionSource { name: String },

    #[error("Failed to parse {}: {message}", .file.display())]
    SourceParse { file: PathBuf, message: String },

    #[error("No [{attribute}] attribute found in {}", .file.display())]
    IdentityAttributeNotFound { file: PathBuf, attribute: String },

    #[error("No regenerated migration files matching '{logical_name}' were found")]
    NoRegeneratedFiles { logical_name: String },

    #[error("Cannot rename onto existing file {}", .path.display())]
    RenameTargetExists { path: PathBuf },

    #[error(
        "{cause}. The original migrations were set aside and can be restored from: {}",
        display_paths(.staged)
    )]
    ReconcileFailed { cause: Box<Error>, staged: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
