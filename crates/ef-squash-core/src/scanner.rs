use chrono::{DateTime, Utc};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::SquashConfig;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationKind {
    Primary,
    /// Generated designer metadata paired with a primary file.
    Companion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub name: String,
    pub path: PathBuf,
    pub kind: MigrationKind,
    pub created: Option<DateTime<Utc>>,
}

/// `<id_prefix>_<logical_name>[.ext]`. The prefix is opaque: it is compared
/// and substituted as a string, never parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationIdentity {
    pub id_prefix: String,
    pub logical_name: String,
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub primary: Option<MigrationFile>,
    pub companion: Option<MigrationFile>,
}

/// Classifies migration file names and extracts their identity.
#[derive(Debug, Clone)]
pub struct MigrationNaming {
    companion_marker: String,
    marker_lowercase: String,
    pattern: Regex,
}

impl MigrationNaming {
    pub fn new(companion_marker: &str, source_extensions: &[String]) -> Result<Self, Error> {
        let extensions = source_extensions
            .iter()
            .map(|ext| regex::escape(ext.trim_start_matches('.')))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = if extensions.is_empty() {
            Regex::new(r"^([^_]+)_(.+)$")?
        } else {
            Regex::new(&format!(r"^([^_]+)_(.+?)(?:\.(?:{}))?$", extensions))?
        };

        Ok(Self {
            companion_marker: companion_marker.to_string(),
            marker_lowercase: companion_marker.to_lowercase(),
            pattern,
        })
    }

    pub fn from_config(config: &SquashConfig) -> Result<Self, Error> {
        Self::new(&config.companion_marker, &config.source_extensions)
    }

    pub fn classify(&self, name: &str) -> MigrationKind {
        if name.to_lowercase().contains(&self.marker_lowercase) {
            MigrationKind::Companion
        } else {
            MigrationKind::Primary
        }
    }

    pub fn identity(&self, name: &str) -> Option<MigrationIdentity> {
        let caps = self.pattern.captures(name)?;
        Some(MigrationIdentity {
            id_prefix: caps[1].to_string(),
            logical_name: caps[2].to_string(),
        })
    }

    /// Logical name used to regenerate a migration from its primary file name.
    pub fn logical_name(&self, primary_name: &str) -> Result<String, Error> {
        self.identity(primary_name)
            .map(|identity| identity.logical_name)
            .ok_or_else(|| Error::UnrecognizedMigrationName {
                name: primary_name.to_string(),
            })
    }

    /// `20220101000000_Init.cs` -> `20220101000000_Init.Designer.cs`
    pub fn companion_name_for(&self, primary_name: &str) -> String {
        let marker = &self.companion_marker;
        let path = Path::new(primary_name);
        match (path.file_stem(), path.extension()) {
            (Some(stem), Some(ext)) => format!(
                "{}.{}.{}",
                stem.to_string_lossy(),
                marker,
                ext.to_string_lossy()
            ),
            _ => format!("{}.{}", primary_name, marker),
        }
    }
}

/// Non-recursive listing of the regular files in `dir`.
pub fn list_files(dir: &Path, naming: &MigrationNaming) -> Result<Vec<MigrationFile>, Error> {
    if !dir.is_dir() {
        return Err(Error::MigrationsDirMissing {
            dir: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!("Skipping non UTF-8 file name {:?}", raw);
                continue;
            }
        };

        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        files.push(MigrationFile {
            kind: naming.classify(&name),
            path: entry.path(),
            name,
            created,
        });
    }

    Ok(files)
}

/// Find the earliest primary and companion files. Ids are fixed-width
/// timestamps, so name order is chronological order.
pub fn scan(dir: &Path, naming: &MigrationNaming) -> Result<ScanResult, Error> {
    let files = list_files(dir, naming)?;
    debug!("{} files in {}", files.len(), dir.display());

    let earliest = |kind: MigrationKind| {
        files
            .iter()
            .filter(|f| f.kind == kind)
            .min_by(|a, b| a.name.cmp(&b.name))
            .cloned()
    };

    Ok(ScanResult {
        primary: earliest(MigrationKind::Primary),
        companion: earliest(MigrationKind::Companion),
    })
}
