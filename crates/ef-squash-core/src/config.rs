use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// How the cleanup step gets existing migration files out of the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupMode {
    /// Rename files aside with the backup id so they can be restored if
    /// regeneration fails; delete them once the squash has completed.
    Stage,
    /// Delete files immediately.
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SquashConfig {
    pub tool: String,
    pub migrations_folder: String,
    pub backup_label: String,
    pub bundle_extension: String,
    pub companion_marker: String,
    pub source_extensions: Vec<String>,
    pub identity_attribute: String,
    pub cleanup: CleanupMode,
}

impl Default for SquashConfig {
    fn default() -> Self {
        Self {
            tool: "dotnet-ef".to_string(),
            migrations_folder: "Migrations".to_string(),
            backup_label: "SquashedMigrationsBackup".to_string(),
            bundle_extension: "exe".to_string(),
            companion_marker: "Designer".to_string(),
            source_extensions: vec!["cs".to_string(), "vb".to_string()],
            identity_attribute: "Migration".to_string(),
            cleanup: CleanupMode::Stage,
        }
    }
}

impl SquashConfig {
    /// Defaults, overridden by an optional `Squash.toml` in the working
    /// directory, overridden by `EF_SQUASH_*` environment variables.
    pub fn load() -> Result<SquashConfig, ConfigError> {
        let builder = Config::builder()
            .add_source(ConfigFile::with_name("Squash").required(false))
            .add_source(Environment::with_prefix("EF_SQUASH").try_parsing(true))
            .build()?;
        builder.try_deserialize::<SquashConfig>()
    }
}

/// Resolve the migrations directory. An explicit output directory wins over
/// the project option; with neither, the current working directory is used.
pub fn resolve_migrations_dir(
    output_dir: Option<&Path>,
    project: Option<&Path>,
    cwd: &Path,
    migrations_folder: &str,
) -> PathBuf {
    output_dir
        .or(project)
        .unwrap_or(cwd)
        .join(migrations_folder)
}
