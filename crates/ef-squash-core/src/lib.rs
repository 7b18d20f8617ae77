pub mod cleanup;
pub mod config;
pub mod error;
pub mod id;
pub mod reconcile;
pub mod reporter;
pub mod rewrite;
pub mod scanner;
pub mod squash;
pub mod tool;

pub use config::{CleanupMode, SquashConfig};
pub use error::Error;
pub use id::IdGenerator;
pub use reporter::{Confirm, Gate, SilentReporter, SquashReporter};
pub use squash::{SquashOrchestrator, SquashOutcome, SquashRequest, SquashState, SquashSummary};
pub use tool::{CommandRunner, ProcessRunner, ToolOutput, ToolStep};
