use std::fmt;
use std::io;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStep {
    Version,
    Script,
    Bundle,
    AddMigration,
}

impl fmt::Display for ToolStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ToolStep::Version => "version check",
            ToolStep::Script => "dbcontext script",
            ToolStep::Bundle => "migrations bundle",
            ToolStep::AddMigration => "migrations add",
        };
        f.write_str(label)
    }
}

/// Captured result of one external invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `-1` when the process was terminated without an exit code.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs a program to completion and captures its output.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ToolOutput>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ToolOutput> {
        (**self).run(program, args)
    }
}

/// Spawns real processes, resolving `program` through `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<ToolOutput> {
        let output = Command::new(program).args(args).output()?;
        Ok(ToolOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// The four `dotnet-ef` operations the squash needs. Each call blocks until
/// the tool exits. Exit status is the only failure signal; output is returned
/// verbatim and never inspected.
pub struct EfTool<R: CommandRunner> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> EfTool<R> {
    pub fn new(runner: R, program: &str) -> Self {
        Self {
            runner,
            program: program.to_string(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn check_version(&self) -> Result<ToolOutput, Error> {
        self.invoke(ToolStep::Version, vec!["--version".to_string()])
    }

    pub fn dump_script(&self, passthrough: &[String], output: &Path) -> Result<ToolOutput, Error> {
        let mut args = vec!["dbcontext".to_string(), "script".to_string()];
        args.extend(passthrough.iter().cloned());
        args.push("--output".to_string());
        args.push(output.to_string_lossy().into_owned());
        self.invoke(ToolStep::Script, args)
    }

    pub fn build_bundle(&self, passthrough: &[String], output: &Path) -> Result<ToolOutput, Error> {
        let mut args = vec!["migrations".to_string(), "bundle".to_string()];
        args.extend(passthrough.iter().cloned());
        args.push("--output".to_string());
        args.push(output.to_string_lossy().into_owned());
        args.push("--self-contained".to_string());
        args.push("-v".to_string());
        self.invoke(ToolStep::Bundle, args)
    }

    pub fn add_migration(&self, name: &str, passthrough: &[String]) -> Result<ToolOutput, Error> {
        let mut args = vec!["migrations".to_string(), "add".to_string(), name.to_string()];
        args.extend(passthrough.iter().cloned());
        self.invoke(ToolStep::AddMigration, args)
    }

    fn invoke(&self, step: ToolStep, args: Vec<String>) -> Result<ToolOutput, Error> {
        info!("Running {}", step);
        debug!("{} {:?}", self.program, args);

        let output = self
            .runner
            .run(&self.program, &args)
            .map_err(|source| Error::ToolSpawn {
                step,
                program: self.program.clone(),
                source,
            })?;

        debug!("{} exited with code {}", step, output.exit_code);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;

    struct RecordingRunner {
        calls: RefCell<Vec<(String, Vec<String>)>>,
        exit_code: i32,
    }

    impl RecordingRunner {
        fn new(exit_code: i32) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                exit_code,
            }
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, program: &str, args: &[String]) -> io::Result<ToolOutput> {
            self.calls
                .borrow_mut()
                .push((program.to_string(), args.to_vec()));
            Ok(ToolOutput {
                exit_code: self.exit_code,
                stdout: "out".to_string(),
                stderr: String::new(),
            })
        }
    }

    fn passthrough() -> Vec<String> {
        vec!["-p".to_string(), "src/App".to_string(), "--context".to_string(), "AppDb".to_string()]
    }

    #[test]
    fn test_check_version_args() {
        let runner = RecordingRunner::new(0);
        let tool = EfTool::new(&runner, "dotnet-ef");
        let output = tool.check_version().unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "out");

        let calls = runner.calls.borrow();
        assert_eq!(calls[0].0, "dotnet-ef");
        assert_eq!(calls[0].1, vec!["--version"]);
    }

    #[test]
    fn test_dump_script_args() {
        let runner = RecordingRunner::new(0);
        let tool = EfTool::new(&runner, "dotnet-ef");
        let out = PathBuf::from("Migrations").join("1_Backup.sql");
        tool.dump_script(&passthrough(), &out).unwrap();

        let calls = runner.calls.borrow();
        let expected_out = out.to_string_lossy().into_owned();
        assert_eq!(
            calls[0].1,
            vec!["dbcontext", "script", "-p", "src/App", "--context", "AppDb", "--output", expected_out.as_str()]
        );
    }

    #[test]
    fn test_build_bundle_args() {
        let runner = RecordingRunner::new(0);
        let tool = EfTool::new(&runner, "dotnet-ef");
        let out = PathBuf::from("1_Backup.exe");
        tool.build_bundle(&passthrough(), &out).unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(
            calls[0].1,
            vec![
                "migrations", "bundle", "-p", "src/App", "--context", "AppDb", "--output",
                "1_Backup.exe", "--self-contained", "-v"
            ]
        );
    }

    #[test]
    fn test_add_migration_args() {
        let runner = RecordingRunner::new(0);
        let tool = EfTool::new(&runner, "dotnet-ef");
        tool.add_migration("Init", &passthrough()).unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(
            calls[0].1,
            vec!["migrations", "add", "Init", "-p", "src/App", "--context", "AppDb"]
        );
    }

    #[test]
    fn test_non_zero_exit_is_returned_not_raised() {
        let runner = RecordingRunner::new(3);
        let tool = EfTool::new(&runner, "dotnet-ef");
        let output = tool.check_version().unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, 3);
    }

    #[test]
    fn test_spawn_failure_is_tool_spawn_error() {
        let tool = EfTool::new(ProcessRunner, "ef-squash-test-program-that-does-not-exist");
        let err = tool.check_version().unwrap_err();
        assert!(matches!(
            err,
            Error::ToolSpawn {
                step: ToolStep::Version,
                ..
            }
        ));
    }
}
