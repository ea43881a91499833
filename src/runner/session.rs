// src/runner/session.rs

//! Build-then-run session for one source file.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::LanguageConfig;
use crate::errors::{BuildRunError, Result};
use crate::exec::{
    CancelToken, CommandToSpawn, ProgressOptions, ProgressReporter, RunResult, RunSettings,
};
use crate::input::InputBlock;
use crate::runner::report::TestReport;
use crate::runner::sequential::SequentialRunner;
use crate::sink::RevealSurface;
use crate::types::RunMode;

/// Commands resolved for one file and mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    pub build: Option<CommandToSpawn>,
    pub run: Option<CommandToSpawn>,
}

impl CommandPlan {
    /// Resolve the commands of `lang` for `source` in `mode`.
    ///
    /// Commands run in the source file's directory with the file's location
    /// exported as `BUILDRUN_FILE_PATH`, `BUILDRUN_FILE` and
    /// `BUILDRUN_FILE_BASE_NAME`.
    pub fn resolve(lang_name: &str, lang: &LanguageConfig, mode: RunMode, source: &Path) -> Result<Self> {
        let build = lang.build_command(mode);
        let run = lang.run_command(mode);

        match mode {
            RunMode::Build if build.is_none() => {
                return Err(BuildRunError::MissingCommand(format!("{lang_name}.build")));
            }
            RunMode::Run if run.is_none() => {
                return Err(BuildRunError::MissingCommand(format!("{lang_name}.run")));
            }
            RunMode::Debug if run.is_none() => {
                return Err(BuildRunError::MissingCommand(format!("{lang_name}.debug")));
            }
            _ => {}
        }

        let to_spawn = |cmd: &str| source_command(cmd, source);
        Ok(Self {
            build: build.map(to_spawn),
            run: run.map(to_spawn),
        })
    }
}

fn source_command(command: &str, source: &Path) -> CommandToSpawn {
    let dir = match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base_name = source
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    CommandToSpawn::new(command)
        .with_cwd(dir)
        .with_env("BUILDRUN_FILE_PATH", source.to_string_lossy())
        .with_env("BUILDRUN_FILE", file_name)
        .with_env("BUILDRUN_FILE_BASE_NAME", base_name)
}

/// What a session produced.
#[derive(Debug)]
pub struct SessionOutcome {
    pub build: Option<RunResult>,
    pub runs: Vec<RunResult>,
    pub report: Option<TestReport>,
}

/// Build once (if there is a build command), then run every input block.
///
/// A failed build is returned as `Err(ExecutionFailed)` before any block
/// runs.
pub async fn execute(
    plan: &CommandPlan,
    blocks: &[InputBlock],
    settings: RunSettings,
    surface: &mut dyn RevealSurface,
    progress: &mut dyn ProgressReporter,
    cancel: CancelToken,
) -> Result<SessionOutcome> {
    let mut runner = SequentialRunner::new(settings, surface, progress, cancel);

    let build = match &plan.build {
        Some(command) => {
            let result = runner
                .run_one(command, &ProgressOptions::building(), None)
                .await;
            result.check_execution()?;
            Some(result)
        }
        None => None,
    };

    let Some(command) = &plan.run else {
        return Ok(SessionOutcome {
            build,
            runs: Vec::new(),
            report: None,
        });
    };

    let mut report = TestReport::new(blocks);
    let runs = runner.run_all(command, blocks, &mut report).await;
    report.end();
    info!(
        blocks = blocks.len(),
        ran = runs.len(),
        all_passed = report.all_passed(),
        "session finished"
    );

    Ok(SessionOutcome {
        build,
        runs,
        report: Some(report),
    })
}
