use clap::Parser;
use std::path::PathBuf;

/// Accepts the same options as `dotnet ef migrations add`. Everything given
/// here is forwarded unchanged to each dotnet-ef invocation; only the project
/// and output directory are read locally to locate the migrations folder.
#[derive(Debug, Parser)]
#[command(name = "ef-squash", version)]
#[command(
    about = "Squash all Entity Framework Core migrations into the initial migration",
    long_about = None
)]
pub struct Cli {
    /// Show JSON output. Use with --prefix-output to parse programmatically.
    #[arg(long)]
    pub json: bool,

    /// The project to use. Defaults to the current working directory.
    #[arg(short = 'p', long)]
    pub project: Option<PathBuf>,

    /// The directory to put files in. Paths are relative to the project directory.
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// The namespace to use. Matches the directory by default.
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,

    /// The DbContext to use.
    #[arg(short = 'c', long)]
    pub context: Option<String>,

    /// The startup project to use. Defaults to the current working directory.
    #[arg(short = 's', long = "startup-project")]
    pub startup_project: Option<String>,

    /// The target framework. Defaults to the first one in the project.
    #[arg(long)]
    pub framework: Option<String>,

    /// The configuration to use.
    #[arg(long)]
    pub configuration: Option<String>,

    /// The runtime to use.
    #[arg(long)]
    pub runtime: Option<String>,

    /// The MSBuild project extensions path. Defaults to "obj".
    #[arg(long = "msbuildprojectextensionspath")]
    pub msbuild_project_extensions_path: Option<String>,

    /// Don't build the project. Intended to be used when the build is up-to-date.
    #[arg(long = "no-build")]
    pub no_build: bool,

    /// Show verbose output.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Don't colorize output.
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Prefix output with level.
    #[arg(long = "prefix-output")]
    pub prefix_output: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_forwarded_options() {
        let cli = Cli::try_parse_from([
            "ef-squash",
            "-p",
            "src/App",
            "--context",
            "AppDbContext",
            "--no-build",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.project, Some(PathBuf::from("src/App")));
        assert_eq!(cli.context.as_deref(), Some("AppDbContext"));
        assert!(cli.no_build);
        assert!(cli.verbose);
        assert!(cli.output_dir.is_none());
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        assert!(Cli::try_parse_from(["ef-squash", "--bogus"]).is_err());
    }
}
