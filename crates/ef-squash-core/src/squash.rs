use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::cleanup::{self, CleanupReport};
use crate::config::SquashConfig;
use crate::error::Error;
use crate::id::IdGenerator;
use crate::reconcile::IdentityReconciler;
use crate::reporter::{Confirm, Gate, SquashReporter};
use crate::rewrite::AttributeRewriter;
use crate::scanner::{self, MigrationNaming};
use crate::tool::{CommandRunner, EfTool, ToolOutput, ToolStep};

/// Pipeline states. Transitions are strictly linear; any failure ends in
/// `Failed` without rolling back completed steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SquashState {
    Start,
    ToolVerified,
    InitialFileIdentified,
    UserConfirmedBackup,
    BackupScripted,
    BundleBuilt,
    UserConfirmedDestroy,
    FilesCleaned,
    MigrationRegenerated,
    IdentityReconciled,
    Done,
    Failed,
}

impl SquashState {
    pub fn next(self) -> Option<SquashState> {
        use SquashState::*;
        match self {
            Start => Some(ToolVerified),
            ToolVerified => Some(InitialFileIdentified),
            InitialFileIdentified => Some(UserConfirmedBackup),
            UserConfirmedBackup => Some(BackupScripted),
            BackupScripted => Some(BundleBuilt),
            BundleBuilt => Some(UserConfirmedDestroy),
            UserConfirmedDestroy => Some(FilesCleaned),
            FilesCleaned => Some(MigrationRegenerated),
            MigrationRegenerated => Some(IdentityReconciled),
            IdentityReconciled => Some(Done),
            Done | Failed => None,
        }
    }

    /// Whether the migrations directory may already have been modified
    /// beyond the backup artifacts.
    pub fn is_destructive(self) -> bool {
        matches!(
            self,
            SquashState::UserConfirmedDestroy
                | SquashState::FilesCleaned
                | SquashState::MigrationRegenerated
                | SquashState::IdentityReconciled
        )
    }
}

impl fmt::Display for SquashState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a squash run operates on.
#[derive(Debug, Clone)]
pub struct SquashRequest {
    pub migrations_dir: PathBuf,
    /// Arguments forwarded verbatim to every tool invocation that takes them.
    pub passthrough: Vec<String>,
}

/// In-memory state of a single run; nothing is persisted.
#[derive(Debug, Clone)]
pub struct SquashSession {
    pub working_directory: PathBuf,
    pub state: SquashState,
    pub backup_id: Option<String>,
    pub original_primary: Option<String>,
    pub original_companion: Option<String>,
}

impl SquashSession {
    fn new(working_directory: &Path) -> Self {
        Self {
            working_directory: working_directory.to_path_buf(),
            state: SquashState::Start,
            backup_id: None,
            original_primary: None,
            original_companion: None,
        }
    }

    fn advance(&mut self, next: SquashState, reporter: &dyn SquashReporter) {
        debug_assert_eq!(self.state.next(), Some(next), "non-linear transition");
        info!("{} -> {}", self.state, next);
        self.state = next;
        reporter.on_state(next);
    }
}

#[derive(Debug)]
pub struct SquashSummary {
    pub backup_id: String,
    pub script_path: PathBuf,
    pub bundle_path: PathBuf,
    pub primary_name: String,
    pub companion_name: String,
    pub files_cleaned: usize,
}

#[derive(Debug)]
pub enum SquashOutcome {
    Completed(SquashSummary),
    /// The operator answered anything but yes at the given gate.
    Declined(Gate),
}

pub struct SquashOrchestrator<'a, R: CommandRunner> {
    config: &'a SquashConfig,
    naming: MigrationNaming,
    ids: &'a IdGenerator,
    tool: EfTool<R>,
    confirm: &'a dyn Confirm,
    reporter: &'a dyn SquashReporter,
}

impl<'a, R: CommandRunner> SquashOrchestrator<'a, R> {
    pub fn new(
        config: &'a SquashConfig,
        ids: &'a IdGenerator,
        runner: R,
        confirm: &'a dyn Confirm,
        reporter: &'a dyn SquashReporter,
    ) -> Result<Self, Error> {
        Ok(Self {
            naming: MigrationNaming::from_config(config)?,
            tool: EfTool::new(runner, &config.tool),
            config,
            ids,
            confirm,
            reporter,
        })
    }

    /// Run the full squash:
    /// 1. Verify the tool, find the initial migration, confirm it
    /// 2. Back up as SQL script and self-contained bundle
    /// 3. Confirm, clear the directory, regenerate the initial migration
    /// 4. Restore the original names and embedded identity
    pub fn run(&self, request: &SquashRequest) -> Result<SquashOutcome, Error> {
        let mut session = SquashSession::new(&request.migrations_dir);
        let result = self.drive(&mut session, request);

        if let Err(err) = &result {
            error!("Squash failed after {}: {}", session.state, err);
            if session.state.is_destructive() {
                if let Some(backup_id) = &session.backup_id {
                    warn!(
                        "Backups tagged {} in {} are the recovery path",
                        backup_id,
                        session.working_directory.display()
                    );
                }
            }
            session.state = SquashState::Failed;
            self.reporter.on_state(SquashState::Failed);
        }

        result
    }

    fn drive(
        &self,
        session: &mut SquashSession,
        request: &SquashRequest,
    ) -> Result<SquashOutcome, Error> {
        let dir = request.migrations_dir.as_path();
        let passthrough = request.passthrough.as_slice();

        // Tool probe
        let version = self.tool.check_version().map_err(|err| match err {
            Error::ToolSpawn { program, source, .. } => Error::ToolUnavailable {
                program,
                reason: source.to_string(),
            },
            other => other,
        })?;
        self.reporter.on_tool_output(ToolStep::Version, &version);
        if !version.success() {
            return Err(Error::ToolUnavailable {
                program: self.tool.program().to_string(),
                reason: format!("exit code {}", version.exit_code),
            });
        }
        session.advance(SquashState::ToolVerified, self.reporter);

        // Initial migration
        let scan = scanner::scan(dir, &self.naming)?;
        let primary = scan.primary.ok_or_else(|| Error::NoInitialMigrationFound {
            dir: dir.to_path_buf(),
        })?;
        let companion_name = match scan.companion {
            Some(companion) => companion.name,
            None => {
                let derived = self.naming.companion_name_for(&primary.name);
                warn!("No companion file found, assuming {}", derived);
                derived
            }
        };
        if !AttributeRewriter::supports(&companion_name) {
            return Err(Error::UnsupportedCompanionSource {
                name: companion_name,
            });
        }
        let logical_name = self.naming.logical_name(&primary.name)?;
        session.original_primary = Some(primary.name.clone());
        session.original_companion = Some(companion_name.clone());
        self.reporter
            .on_initial_migration(&primary.name, &companion_name);
        session.advance(SquashState::InitialFileIdentified, self.reporter);

        let prompt = "Please confirm that this is correct before proceeding.";
        if !self.confirm.confirm(Gate::InitialMigration, prompt)? {
            info!("Declined at initial migration confirmation");
            return Ok(SquashOutcome::Declined(Gate::InitialMigration));
        }
        session.advance(SquashState::UserConfirmedBackup, self.reporter);

        // Backups
        let backup_id = self.ids.generate(&self.config.backup_label);
        session.backup_id = Some(backup_id.clone());

        let script_path = dir.join(format!("{}.sql", backup_id));
        let output = self.tool.dump_script(passthrough, &script_path)?;
        self.check(ToolStep::Script, &output)?;
        session.advance(SquashState::BackupScripted, self.reporter);

        let bundle_path = dir.join(bundle_file_name(&backup_id, &self.config.bundle_extension));
        let output = self.tool.build_bundle(passthrough, &bundle_path)?;
        self.check(ToolStep::Bundle, &output)?;
        session.advance(SquashState::BundleBuilt, self.reporter);

        let prompt = "The following actions will remove all existing migrations and will recreate the initial migration.\nAre you sure you want to continue?";
        if !self.confirm.confirm(Gate::DestroyMigrations, prompt)? {
            info!("Declined at destroy confirmation");
            return Ok(SquashOutcome::Declined(Gate::DestroyMigrations));
        }
        session.advance(SquashState::UserConfirmedDestroy, self.reporter);

        // Destructive part
        let cleaned = cleanup::clear_directory(
            dir,
            &self.naming,
            &backup_id,
            self.config.cleanup,
            self.reporter,
        )?;
        session.advance(SquashState::FilesCleaned, self.reporter);

        if let Err(err) = self.regenerate(&logical_name, passthrough) {
            self.restore(&cleaned);
            return Err(err);
        }
        session.advance(SquashState::MigrationRegenerated, self.reporter);

        let reconciler = IdentityReconciler::new(
            dir,
            &self.naming,
            &self.config.identity_attribute,
            &backup_id,
        );
        reconciler
            .reconcile(&logical_name, &primary.name, &companion_name, self.reporter)
            .map_err(|err| {
                if cleaned.staged.is_empty() {
                    err
                } else {
                    Error::ReconcileFailed {
                        cause: Box::new(err),
                        staged: cleaned.staged.iter().map(|f| f.staged.clone()).collect(),
                    }
                }
            })?;
        session.advance(SquashState::IdentityReconciled, self.reporter);

        if !cleaned.staged.is_empty() {
            let removed = cleanup::commit_staged(&cleaned.staged)?;
            self.reporter.on_staged_committed(removed);
        }
        session.advance(SquashState::Done, self.reporter);

        Ok(SquashOutcome::Completed(SquashSummary {
            backup_id,
            script_path,
            bundle_path,
            primary_name: primary.name,
            companion_name,
            files_cleaned: cleaned.removed.len() + cleaned.staged.len(),
        }))
    }

    fn regenerate(&self, logical_name: &str, passthrough: &[String]) -> Result<(), Error> {
        let output = self.tool.add_migration(logical_name, passthrough)?;
        self.check(ToolStep::AddMigration, &output)
    }

    fn restore(&self, cleaned: &CleanupReport) {
        if cleaned.staged.is_empty() {
            return;
        }
        match cleanup::restore_staged(&cleaned.staged) {
            Ok(restored) => self.reporter.on_staged_restored(restored),
            Err(err) => error!("Failed to restore staged migrations: {}", err),
        }
    }

    fn check(&self, step: ToolStep, output: &ToolOutput) -> Result<(), Error> {
        self.reporter.on_tool_output(step, output);
        if output.success() {
            Ok(())
        } else {
            Err(Error::ExternalCommandFailed {
                step,
                exit_code: output.exit_code,
            })
        }
    }
}

fn bundle_file_name(backup_id: &str, extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        backup_id.to_string()
    } else {
        format!("{}.{}", backup_id, extension)
    }
}
