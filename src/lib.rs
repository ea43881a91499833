// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod input;
pub mod logging;
pub mod runner;
pub mod sink;
pub mod text;
pub mod types;
pub mod verify;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::{ConfigFile, LanguageConfig};
use crate::exec::LogProgress;
use crate::fs::TempDir;
use crate::input::{InputBlock, extract_blocks};
use crate::runner::{CommandPlan, RunRegistry};
use crate::sink::ConsoleSurface;

/// Source path meaning "read the program from stdin".
pub const STDIN_SOURCE: &str = "-";

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and language selection
/// - input block extraction
/// - the build/run session
/// - Ctrl-C handling through the run registry
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);

    if args.cleanup_temp {
        let dir = if config_path.exists() {
            load_and_validate(&config_path)?.config().temp_dir()
        } else {
            TempDir::default()
        };
        dir.cleanup()?;
        println!("removed {}", dir.root().display());
        return Ok(());
    }

    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let file = args
        .file
        .clone()
        .ok_or_else(|| anyhow!("no source file given"))?;

    let (file, lang_name, lang) = resolve_source(&cfg, &file, args.language.as_deref())?;
    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("reading source file {}", file.display()))?;

    let blocks = lang
        .markers()
        .map(|markers| extract_blocks(&text, &markers))
        .unwrap_or_default();
    let plan = CommandPlan::resolve(lang_name, lang, args.mode, &file)?;
    info!(
        file = %file.display(),
        language = %lang_name,
        mode = %args.mode,
        blocks = blocks.len(),
        "resolved source"
    );

    if args.dry_run {
        print_dry_run(&file, lang_name, &plan, &blocks);
        return Ok(());
    }

    let registry = Arc::new(RunRegistry::new());
    spawn_ctrl_c_handler(Arc::clone(&registry));

    println!("=== {} ===", file.display());
    let (slot, cancel) = registry.begin(file.display().to_string());
    let mut surface = ConsoleSurface;
    let mut progress = LogProgress;
    let outcome = runner::execute(
        &plan,
        &blocks,
        cfg.run_settings(),
        &mut surface,
        &mut progress,
        cancel,
    )
    .await;
    registry.finish(&slot);
    let outcome = outcome?;

    let Some(report) = outcome.report else {
        return Ok(());
    };
    if !blocks.is_empty() {
        println!("\n{}", report.summary());
    }

    let (passed, total) = if blocks.is_empty() {
        let passed = outcome.runs.iter().filter(|r| r.passed()).count();
        (passed, outcome.runs.len())
    } else {
        (report.count(|v| *v == runner::Verdict::Passed), blocks.len())
    };
    if passed < total {
        bail!("{} of {} run(s) did not pass", total - passed, total);
    }
    Ok(())
}

/// Resolve the language for `file`, saving stdin to a temp file first when
/// `file` is [`STDIN_SOURCE`].
fn resolve_source<'c>(
    cfg: &'c ConfigFile,
    file: &Path,
    language: Option<&str>,
) -> Result<(PathBuf, &'c str, &'c LanguageConfig)> {
    if file != Path::new(STDIN_SOURCE) {
        let (name, lang) = cfg.language_for(file, language)?;
        return Ok((file.to_path_buf(), name, lang));
    }

    let name = language.ok_or_else(|| anyhow!("reading the source from stdin requires --language"))?;
    let (name, lang) = cfg.language_for(file, Some(name))?;
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("reading source from stdin")?;
    let saved = cfg.config().temp_dir().save(&text, lang.extension(name))?;
    debug!(path = %saved.display(), "saved stdin source to temp file");
    Ok((saved, name, lang))
}

fn spawn_ctrl_c_handler(registry: Arc<RunRegistry>) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            if registry.cancel_all() {
                info!("Ctrl+C: killing running process");
            } else {
                info!("Ctrl+C: nothing is running");
            }
        }
    });
}

/// Print the resolved commands and input blocks without executing anything.
fn print_dry_run(file: &Path, lang_name: &str, plan: &CommandPlan, blocks: &[InputBlock]) {
    println!("buildrun dry-run");
    println!("  file = {}", file.display());
    println!("  language = {lang_name}");
    if let Some(build) = &plan.build {
        println!("  build: {}", build.command);
    }
    if let Some(run) = &plan.run {
        println!("  run: {}", run.command);
    }
    if let Some(cwd) = plan.build.as_ref().or(plan.run.as_ref()).and_then(|c| c.cwd.as_ref()) {
        println!("  cwd: {}", cwd.display());
    }
    println!();

    println!("input blocks ({}):", blocks.len());
    for block in blocks {
        println!("  - {block}");
        println!("      input: {:?}", block.input);
        if let Some(expected) = block.expected.as_str() {
            println!("      expected: {expected:?}");
        }
    }

    debug!("dry-run complete (no execution)");
}
