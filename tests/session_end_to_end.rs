#![cfg(unix)]

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use buildrun::cli::CliArgs;
use buildrun::config::ConfigFile;
use buildrun::errors::BuildRunError;
use buildrun::exec::CancelToken;
use buildrun::input::extract_blocks;
use buildrun::runner::{CommandPlan, Verdict, execute};
use buildrun::sink::MemorySurface;
use buildrun::types::RunMode;
use buildrun_test_utils::builders::{ConfigFileBuilder, LanguageConfigBuilder};
use buildrun_test_utils::recorders::RecordingProgress;
use buildrun_test_utils::{init_tracing, with_timeout};
use clap::Parser;

const ADDER: &str = "\
read a b
echo $((a + b))
exit 0
#<input>
1 2
#</input>
#<output>
3
#</output>
#<input>
20 22
#</input>
#<output>
41
#</output>
#<input>
5 5
#</input>
";

fn config(build: &str, temp: &Path) -> ConfigFile {
    ConfigFileBuilder::new()
        .with_language(
            "sh",
            LanguageConfigBuilder::run("sh \"$BUILDRUN_FILE\"")
                .build_cmd(build)
                .input_markers("#<input>\n", "#</input>")
                .output_markers("#<output>\n", "#</output>")
                .build(),
        )
        .flush_period_ms(20)
        .progress_interval_ms(20)
        .temp_dir(temp)
        .build()
}

fn write_source(dir: &Path) -> PathBuf {
    let path = dir.join("adder.sh");
    std::fs::write(&path, ADDER).unwrap();
    path
}

#[tokio::test]
async fn builds_then_runs_every_block() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());
    let cfg = config("test -f \"$BUILDRUN_FILE\"", &dir.path().join("tmp"));

    let (name, lang) = cfg.language_for(&source, None).unwrap();
    let blocks = extract_blocks(ADDER, &lang.markers().unwrap());
    assert_eq!(blocks.len(), 3);
    let plan = CommandPlan::resolve(name, lang, RunMode::Run, &source).unwrap();

    let mut surface = MemorySurface::new();
    let mut progress = RecordingProgress::new();
    let outcome = with_timeout(execute(
        &plan,
        &blocks,
        cfg.run_settings(),
        &mut surface,
        &mut progress,
        CancelToken::never(),
    ))
    .await
    .unwrap();

    assert!(outcome.build.as_ref().unwrap().execution_ok());
    assert_eq!(outcome.runs.len(), 3);

    let report = outcome.report.unwrap();
    let verdicts: Vec<_> = report.entries().iter().map(|e| e.verdict.clone()).collect();
    assert_eq!(verdicts[0], Verdict::Passed);
    assert!(matches!(&verdicts[1], Verdict::Failed { diff: Some(d), .. } if d.expected.trim() == "41"));
    assert_eq!(verdicts[2], Verdict::Passed);
    assert_eq!(report.entries()[0].label, "Input on line 4");

    let text = surface.text();
    assert!(text.contains("[Built in "));
    assert_eq!(text.matches("\nOutput matched").count(), 1);
    assert_eq!(text.matches("!!!OUTPUT DID NOT MATCH!!!").count(), 1);
    assert_eq!(text.matches("[Finished in ").count(), 3);
    assert!(progress.messages().iter().any(|m| m.starts_with("Building ")));
}

#[tokio::test]
async fn failed_build_runs_nothing() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());
    let cfg = config("echo compile error >&2; exit 3", &dir.path().join("tmp"));

    let (name, lang) = cfg.language_for(&source, None).unwrap();
    let blocks = extract_blocks(ADDER, &lang.markers().unwrap());
    let plan = CommandPlan::resolve(name, lang, RunMode::Run, &source).unwrap();

    let mut surface = MemorySurface::new();
    let mut progress = RecordingProgress::new();
    let err = with_timeout(execute(
        &plan,
        &blocks,
        cfg.run_settings(),
        &mut surface,
        &mut progress,
        CancelToken::never(),
    ))
    .await
    .unwrap_err();

    match err {
        BuildRunError::ExecutionFailed { job, failure } => {
            assert_eq!(job, "Building");
            assert_eq!(failure, "3");
        }
        other => panic!("Expected ExecutionFailed, got: {other:?}"),
    }
    let text = surface.text();
    assert!(text.contains("compile error"));
    assert!(text.contains("[Build failed in "));
    assert!(!text.contains("[Finished in "));
    assert!(progress.messages().iter().all(|m| m.starts_with("Building ")));
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path());
    let marker = dir.path().join("built");
    let config_path = dir.path().join("buildrun.toml");
    std::fs::write(
        &config_path,
        format!(
            "[language.sh]\nbuild = \"touch {}\"\nrun = \"sh adder.sh\"\ninput_begin = \"#<input>\"\ninput_end = \"#</input>\"\n",
            marker.display()
        ),
    )
    .unwrap();

    let args = CliArgs::try_parse_from([
        OsString::from("buildrun"),
        source.into_os_string(),
        OsString::from("--config"),
        config_path.into_os_string(),
        OsString::from("--dry-run"),
    ])
    .unwrap();

    buildrun::run(args).await.unwrap();
    assert!(!marker.exists());
}
