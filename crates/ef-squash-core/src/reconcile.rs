use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::Error;
use crate::reporter::SquashReporter;
use crate::rewrite::{AttributeRewriter, RewriteError};
use crate::scanner::{self, MigrationKind, MigrationNaming};

#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub renamed: Vec<(String, String)>,
    pub rewritten: Vec<String>,
}

/// Gives a freshly generated migration pair the names and embedded identity
/// of the migration it replaces.
pub struct IdentityReconciler<'a> {
    dir: &'a Path,
    naming: &'a MigrationNaming,
    rewriter: AttributeRewriter,
    /// Files whose names contain this are never touched.
    exclude: &'a str,
}

impl<'a> IdentityReconciler<'a> {
    pub fn new(
        dir: &'a Path,
        naming: &'a MigrationNaming,
        identity_attribute: &str,
        exclude: &'a str,
    ) -> Self {
        Self {
            dir,
            naming,
            rewriter: AttributeRewriter::new(identity_attribute),
            exclude,
        }
    }

    pub fn reconcile(
        &self,
        regenerated_logical_name: &str,
        original_primary_name: &str,
        original_companion_name: &str,
        reporter: &dyn SquashReporter,
    ) -> Result<ReconcileReport, Error> {
        let identity = Path::new(original_primary_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(original_primary_name);
        let needle = regenerated_logical_name.to_lowercase();

        let mut files = scanner::list_files(self.dir, self.naming)?;
        files.retain(|f| {
            if !f.name.to_lowercase().contains(&needle) || f.name.contains(self.exclude) {
                return false;
            }
            if self.naming.identity(&f.name).is_none() {
                debug!("Skipping {}: not an <id>_<Name> migration file", f.name);
                return false;
            }
            true
        });
        files.sort_by(|a, b| a.name.cmp(&b.name));

        if files.is_empty() {
            return Err(Error::NoRegeneratedFiles {
                logical_name: regenerated_logical_name.to_string(),
            });
        }

        let mut report = ReconcileReport::default();
        for file in files {
            let target_name = match file.kind {
                MigrationKind::Companion => {
                    self.rewrite_identity(&file.path, &file.name, identity)?;
                    reporter.on_identity_rewritten(&file.name, identity);
                    report.rewritten.push(file.name.clone());
                    original_companion_name
                }
                MigrationKind::Primary => original_primary_name,
            };

            let target = self.dir.join(target_name);
            if target != file.path {
                rename_new(&file.path, &target)?;
                reporter.on_file_renamed(&file.name, target_name);
            }
            report.renamed.push((file.name, target_name.to_string()));
        }

        info!(
            "Reconciled {} files ({} rewritten) to identity {}",
            report.renamed.len(),
            report.rewritten.len(),
            identity
        );
        Ok(report)
    }

    fn rewrite_identity(&self, path: &Path, name: &str, identity: &str) -> Result<(), Error> {
        if !AttributeRewriter::supports(name) {
            return Err(Error::UnsupportedCompanionSource {
                name: name.to_string(),
            });
        }

        let source = fs::read_to_string(path)?;
        let rewrite = self.rewriter.rewrite(&source, identity).map_err(|e| match e {
            RewriteError::NotFound => Error::IdentityAttributeNotFound {
                file: path.to_path_buf(),
                attribute: self.rewriter.attribute().to_string(),
            },
            other => Error::SourceParse {
                file: path.to_path_buf(),
                message: other.to_string(),
            },
        })?;

        debug!(
            "Replacing {} attribute argument(s) in {}",
            rewrite.occurrences, name
        );
        fs::write(path, rewrite.source)?;
        Ok(())
    }
}

fn rename_new(from: &Path, to: &Path) -> Result<(), Error> {
    if to.exists() {
        return Err(Error::RenameTargetExists {
            path: to.to_path_buf(),
        });
    }
    fs::rename(from, to)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SquashConfig;
    use crate::reporter::SilentReporter;
    use tempfile::tempdir;

    const BACKUP_ID: &str = "20240601115959_SquashedMigrationsBackup";

    const REGENERATED_DESIGNER: &str = r#"// <auto-generated />
using Microsoft.EntityFrameworkCore.Migrations;

namespace App.Migrations
{
    [DbContext(typeof(AppDbContext))]
    [Migration("20240601120000_Init")]
    partial class Init
    {
    }
}
"#;

    fn naming() -> MigrationNaming {
        MigrationNaming::from_config(&SquashConfig::default()).unwrap()
    }

    fn regenerate(dir: &Path) {
        fs::write(dir.join("20240601120000_Init.cs"), "partial class Init {}").unwrap();
        fs::write(dir.join("20240601120000_Init.Designer.cs"), REGENERATED_DESIGNER).unwrap();
        fs::write(dir.join("AppDbContextModelSnapshot.cs"), "snapshot").unwrap();
        fs::write(dir.join(format!("{}.sql", BACKUP_ID)), "Init script").unwrap();
    }

    #[test]
    fn test_reconcile_restores_names_and_identity() {
        let tmp = tempdir().unwrap();
        regenerate(tmp.path());
        let naming = naming();
        let reconciler = IdentityReconciler::new(tmp.path(), &naming, "Migration", BACKUP_ID);

        let report = reconciler
            .reconcile(
                "Init",
                "20220101000000_Init.cs",
                "20220101000000_Init.Designer.cs",
                &SilentReporter,
            )
            .unwrap();

        assert_eq!(report.renamed.len(), 2);
        assert_eq!(report.rewritten, vec!["20240601120000_Init.Designer.cs"]);
        assert_eq!(
            fs::read_to_string(tmp.path().join("20220101000000_Init.cs")).unwrap(),
            "partial class Init {}"
        );
        assert_eq!(
            fs::read_to_string(tmp.path().join("20220101000000_Init.Designer.cs")).unwrap(),
            REGENERATED_DESIGNER.replace("20240601120000_Init", "20220101000000_Init")
        );
        assert!(!tmp.path().join("20240601120000_Init.cs").exists());
        assert!(!tmp.path().join("20240601120000_Init.Designer.cs").exists());
        // untouched
        assert!(tmp.path().join("AppDbContextModelSnapshot.cs").exists());
        assert!(tmp.path().join(format!("{}.sql", BACKUP_ID)).exists());
    }

    #[test]
    fn test_reconcile_without_matches_fails() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("AppDbContextModelSnapshot.cs"), "snapshot").unwrap();
        let naming = naming();
        let reconciler = IdentityReconciler::new(tmp.path(), &naming, "Migration", BACKUP_ID);

        let err = reconciler
            .reconcile("Init", "1_Init.cs", "1_Init.Designer.cs", &SilentReporter)
            .unwrap_err();
        assert!(matches!(err, Error::NoRegeneratedFiles { .. }));
    }

    #[test]
    fn test_missing_attribute_is_reported() {
        let tmp = tempdir().unwrap();
        fs::write(
            tmp.path().join("2_Init.Designer.cs"),
            "partial class Init {}\n",
        )
        .unwrap();
        let naming = naming();
        let reconciler = IdentityReconciler::new(tmp.path(), &naming, "Migration", BACKUP_ID);

        let err = reconciler
            .reconcile("Init", "1_Init.cs", "1_Init.Designer.cs", &SilentReporter)
            .unwrap_err();
        assert!(matches!(err, Error::IdentityAttributeNotFound { .. }));
        assert!(tmp.path().join("2_Init.Designer.cs").exists());
    }

    #[test]
    fn test_snapshot_containing_logical_name_is_left_alone() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("20240601120000_Model.cs"), "partial class Model {}").unwrap();
        fs::write(
            tmp.path().join("20240601120000_Model.Designer.cs"),
            REGENERATED_DESIGNER.replace("20240601120000_Init", "20240601120000_Model"),
        )
        .unwrap();
        fs::write(tmp.path().join("AppDbContextModelSnapshot.cs"), "snapshot").unwrap();
        let naming = naming();
        let reconciler = IdentityReconciler::new(tmp.path(), &naming, "Migration", BACKUP_ID);

        let report = reconciler
            .reconcile(
                "Model",
                "20220101000000_Model.cs",
                "20220101000000_Model.Designer.cs",
                &SilentReporter,
            )
            .unwrap();

        assert_eq!(report.renamed.len(), 2);
        assert_eq!(
            fs::read_to_string(tmp.path().join("AppDbContextModelSnapshot.cs")).unwrap(),
            "snapshot"
        );
        assert!(tmp.path().join("20220101000000_Model.cs").exists());
        assert!(tmp.path().join("20220101000000_Model.Designer.cs").exists());
    }

    #[test]
    fn test_rename_never_overwrites() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("2_Init.cs"), "new").unwrap();
        fs::write(tmp.path().join("1_Keep.cs"), "keep").unwrap();
        let naming = naming();
        let reconciler = IdentityReconciler::new(tmp.path(), &naming, "Migration", BACKUP_ID);

        let err = reconciler
            .reconcile("Init", "1_Keep.cs", "1_Keep.Designer.cs", &SilentReporter)
            .unwrap_err();
        assert!(matches!(err, Error::RenameTargetExists { .. }));
        assert_eq!(fs::read_to_string(tmp.path().join("1_Keep.cs")).unwrap(), "keep");
    }
}
