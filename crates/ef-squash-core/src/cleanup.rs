use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::CleanupMode;
use crate::error::Error;
use crate::reporter::SquashReporter;
use crate::scanner::{self, MigrationNaming};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub original: PathBuf,
    pub staged: PathBuf,
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub skipped: Vec<String>,
    pub removed: Vec<String>,
    pub staged: Vec<StagedFile>,
}

/// Name a file is renamed to while staged, e.g.
/// `1_Init.cs` -> `1_Init.cs.20240601120000_SquashedMigrationsBackup.bak`.
pub fn staged_name(name: &str, backup_id: &str) -> String {
    format!("{}.{}.bak", name, backup_id)
}

/// Clear every file from `dir` except those whose name contains `backup_id`.
/// Files are processed oldest first. Staged files keep the backup id in their
/// new name, so either way only backup-tagged names remain afterwards.
pub fn clear_directory(
    dir: &Path,
    naming: &MigrationNaming,
    backup_id: &str,
    mode: CleanupMode,
    reporter: &dyn SquashReporter,
) -> Result<CleanupReport, Error> {
    let mut files = scanner::list_files(dir, naming)?;
    files.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)));

    let mut report = CleanupReport::default();
    for file in files {
        if file.name.contains(backup_id) {
            debug!("Skipping generated backup file {}", file.name);
            reporter.on_file_skipped(&file.name);
            report.skipped.push(file.name);
            continue;
        }

        match mode {
            CleanupMode::Delete => {
                debug!("Deleting file {}", file.name);
                fs::remove_file(&file.path)?;
                reporter.on_file_removed(&file.name);
                report.removed.push(file.name);
            }
            CleanupMode::Stage => {
                let staged_as = staged_name(&file.name, backup_id);
                let staged = dir.join(&staged_as);
                debug!("Staging file {} as {}", file.name, staged_as);
                fs::rename(&file.path, &staged)?;
                reporter.on_file_staged(&file.name, &staged_as);
                report.staged.push(StagedFile {
                    original: file.path,
                    staged,
                });
            }
        }
    }

    info!(
        "Cleanup: {} skipped, {} deleted, {} staged",
        report.skipped.len(),
        report.removed.len(),
        report.staged.len()
    );
    Ok(report)
}

/// Move staged files back to their original names. A staged file whose
/// original name has been taken again is left staged.
pub fn restore_staged(staged: &[StagedFile]) -> Result<usize, Error> {
    let mut restored = 0;
    for file in staged {
        if file.original.exists() {
            warn!(
                "Not restoring {}: {} already exists",
                file.staged.display(),
                file.original.display()
            );
            continue;
        }
        fs::rename(&file.staged, &file.original)?;
        restored += 1;
    }
    info!("Restored {} staged files", restored);
    Ok(restored)
}

/// Permanently delete staged files once the squash has succeeded.
pub fn commit_staged(staged: &[StagedFile]) -> Result<usize, Error> {
    let mut removed = 0;
    for file in staged {
        match fs::remove_file(&file.staged) {
            Ok(()) => removed += 1,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!("Staged file {} is already gone", file.staged.display());
            }
            Err(err) => return Err(err.into()),
        }
    }
    info!("Removed {} staged files", removed);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SquashConfig;
    use crate::reporter::SilentReporter;
    use tempfile::tempdir;

    const BACKUP_ID: &str = "20240601120000_SquashedMigrationsBackup";

    fn naming() -> MigrationNaming {
        MigrationNaming::from_config(&SquashConfig::default()).unwrap()
    }

    fn seed(dir: &Path) {
        for name in [
            "20220101000000_Init.cs",
            "20220101000000_Init.Designer.cs",
            "20220301000000_AddUsers.cs",
            "AppDbContextModelSnapshot.cs",
        ] {
            fs::write(dir.join(name), name).unwrap();
        }
        fs::write(dir.join(format!("{}.sql", BACKUP_ID)), "script").unwrap();
        fs::write(dir.join(format!("{}.exe", BACKUP_ID)), "bundle").unwrap();
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_delete_mode_keeps_only_backups() {
        let tmp = tempdir().unwrap();
        seed(tmp.path());

        let report = clear_directory(
            tmp.path(),
            &naming(),
            BACKUP_ID,
            CleanupMode::Delete,
            &SilentReporter,
        )
        .unwrap();

        assert_eq!(report.removed.len(), 4);
        assert_eq!(report.skipped.len(), 2);
        assert!(names(tmp.path()).iter().all(|n| n.contains(BACKUP_ID)));
        assert_eq!(names(tmp.path()).len(), 2);
    }

    #[test]
    fn test_stage_mode_keeps_only_backup_tagged_names() {
        let tmp = tempdir().unwrap();
        seed(tmp.path());

        let report = clear_directory(
            tmp.path(),
            &naming(),
            BACKUP_ID,
            CleanupMode::Stage,
            &SilentReporter,
        )
        .unwrap();

        assert_eq!(report.staged.len(), 4);
        let remaining = names(tmp.path());
        assert_eq!(remaining.len(), 6);
        assert!(remaining.iter().all(|n| n.contains(BACKUP_ID)));
        assert!(remaining.contains(&staged_name("20220101000000_Init.cs", BACKUP_ID)));
    }

    #[test]
    fn test_restore_staged_puts_files_back() {
        let tmp = tempdir().unwrap();
        seed(tmp.path());
        let before = names(tmp.path());

        let report = clear_directory(
            tmp.path(),
            &naming(),
            BACKUP_ID,
            CleanupMode::Stage,
            &SilentReporter,
        )
        .unwrap();
        let restored = restore_staged(&report.staged).unwrap();

        assert_eq!(restored, 4);
        assert_eq!(names(tmp.path()), before);
        assert_eq!(
            fs::read_to_string(tmp.path().join("20220101000000_Init.cs")).unwrap(),
            "20220101000000_Init.cs"
        );
    }

    #[test]
    fn test_restore_does_not_overwrite() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("1_A.cs"), "old").unwrap();

        let report = clear_directory(
            tmp.path(),
            &naming(),
            BACKUP_ID,
            CleanupMode::Stage,
            &SilentReporter,
        )
        .unwrap();
        fs::write(tmp.path().join("1_A.cs"), "new").unwrap();

        assert_eq!(restore_staged(&report.staged).unwrap(), 0);
        assert_eq!(fs::read_to_string(tmp.path().join("1_A.cs")).unwrap(), "new");
        assert!(tmp.path().join(staged_name("1_A.cs", BACKUP_ID)).exists());
    }

    #[test]
    fn test_commit_staged_removes_them() {
        let tmp = tempdir().unwrap();
        seed(tmp.path());

        let report = clear_directory(
            tmp.path(),
            &naming(),
            BACKUP_ID,
            CleanupMode::Stage,
            &SilentReporter,
        )
        .unwrap();
        assert_eq!(commit_staged(&report.staged).unwrap(), 4);
        assert_eq!(names(tmp.path()).len(), 2);
        assert_eq!(commit_staged(&report.staged).unwrap(), 0);
    }
}
