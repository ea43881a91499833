// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;
use crate::types::RunMode;

/// Command-line arguments for `buildrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "buildrun",
    version,
    about = "Build and run a source file, checking its output against inline expectations.",
    long_about = None
)]
pub struct CliArgs {
    /// Source file to build and run.
    #[arg(value_name = "FILE", required_unless_present = "cleanup_temp")]
    pub file: Option<PathBuf>,

    /// Path to the config file (TOML).
    ///
    /// Default: `buildrun.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Language section to use. Defaults to the one whose `ext` matches the
    /// file extension.
    #[arg(long, value_name = "NAME")]
    pub language: Option<String>,

    /// What to execute.
    #[arg(long, value_enum, default_value_t = RunMode::Run)]
    pub mode: RunMode,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUILDRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve commands and input blocks and print them, but don't execute
    /// anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Remove the temporary directory holding overflow files and exit.
    #[arg(long)]
    pub cleanup_temp: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_file_and_mode() {
        let args = CliArgs::try_parse_from(["buildrun", "main.cpp", "--mode", "debug"]).unwrap();
        assert_eq!(args.file, Some(PathBuf::from("main.cpp")));
        assert_eq!(args.mode, RunMode::Debug);
        assert_eq!(args.config, "buildrun.toml");
    }

    #[test]
    fn file_is_optional_only_for_cleanup() {
        assert!(CliArgs::try_parse_from(["buildrun"]).is_err());
        let args = CliArgs::try_parse_from(["buildrun", "--cleanup-temp"]).unwrap();
        assert!(args.cleanup_temp);
        assert!(args.file.is_none());
    }
}
