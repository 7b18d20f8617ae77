use crate::squash::SquashState;
use crate::tool::{ToolOutput, ToolStep};

/// Trait for reporting squash progress.
///
/// The CLI implements it with colored console output; tests use
/// [`SilentReporter`]. All methods have default no-op implementations.
pub trait SquashReporter {
    fn on_state(&self, _state: SquashState) {}
    fn on_initial_migration(&self, _primary: &str, _companion: &str) {}
    fn on_tool_output(&self, _step: ToolStep, _output: &ToolOutput) {}
    fn on_file_skipped(&self, _name: &str) {}
    fn on_file_removed(&self, _name: &str) {}
    fn on_file_staged(&self, _name: &str, _staged_as: &str) {}
    fn on_staged_restored(&self, _restored: usize) {}
    fn on_staged_committed(&self, _removed: usize) {}
    fn on_identity_rewritten(&self, _file: &str, _identity: &str) {}
    fn on_file_renamed(&self, _from: &str, _to: &str) {}
}

/// No-op reporter for silent operation.
pub struct SilentReporter;

impl SquashReporter for SilentReporter {}

/// Interactive yes/no gate. Anything other than an explicit yes declines.
pub trait Confirm {
    fn confirm(&self, gate: Gate, prompt: &str) -> std::io::Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// The identified initial migration is the right one.
    InitialMigration,
    /// Existing migrations may be removed and regenerated.
    DestroyMigrations,
}
