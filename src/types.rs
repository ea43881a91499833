use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Deserialize;

/// Which command pair to execute for a source file.
///
/// - `Build`: only the build command.
/// - `Run`: the build command (if any), then the run command once per input
///   block (default).
/// - `Debug`: like `Run`, but using `debug_build` / `debug` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Build,
    Run,
    Debug,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Run
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "build" => Ok(RunMode::Build),
            "run" => Ok(RunMode::Run),
            "debug" => Ok(RunMode::Debug),
            other => Err(format!(
                "invalid run mode: {other} (expected \"build\", \"run\" or \"debug\")"
            )),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunMode::Build => "build",
            RunMode::Run => "run",
            RunMode::Debug => "debug",
        };
        f.write_str(s)
    }
}

/// Line ending convention of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }

    /// Guess the convention of `text`: CRLF if any `\r\n` occurs, LF otherwise.
    pub fn detect(text: &str) -> Self {
        if text.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }
}
