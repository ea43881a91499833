// src/exec/process_run.rs

//! One supervised process run.
//!
//! A [`ProcessRun`] spawns a single command, feeds it an input block on stdin
//! and drives everything else from one `select!` loop on the current task:
//! stdout/stderr reads, the sink's flush timer, the progress ticker and the
//! cancellation signal. Because every handler runs to completion inside that
//! loop, the sink and the matcher are plain owned values without locks.
//!
//! The run ends through a single terminal transition ([`ProcessRun::close`])
//! that consumes the run, so the sink is closed and the matcher finalised
//! exactly once, after the last output byte has been handled.

use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::exec::cancel::CancelToken;
use crate::exec::command::{CommandToSpawn, exit_failure, kill_tree, spawn_command};
use crate::exec::progress::{ProgressOptions, ProgressReporter};
use crate::exec::result::RunResult;
use crate::fs::{TempDir, TempFileProvider};
use crate::input::InputBlock;
use crate::sink::{BoundedSink, RevealSurface, SinkOptions};
use crate::text::Utf8Decoder;
use crate::verify::{OutputCheck, TokenMatcher};

const READ_CHUNK: usize = 64 * 1024;

/// Default interval for progress reports and liveness probes.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Tuning shared by every run of a session.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub sink: SinkOptions,
    pub progress_interval: Duration,
    pub files: Arc<dyn TempFileProvider>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            sink: SinkOptions::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            files: Arc::new(TempDir::default()),
        }
    }
}

/// Collaborators lent to a run for its duration.
pub struct RunIo<'a> {
    pub surface: &'a mut dyn RevealSurface,
    pub progress: &'a mut dyn ProgressReporter,
    pub cancel: CancelToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Running,
    Closed,
}

/// How supervision ended.
enum Exit {
    Status(ExitStatus),
    /// Spawning or waiting failed; there is no exit status.
    Lost,
}

/// What woke the supervision loop.
enum Wake {
    Stdout(io::Result<usize>),
    Stderr(io::Result<usize>),
    Exited(io::Result<ExitStatus>),
    Flush,
    Tick,
    Cancel,
}

pub struct ProcessRun<'a> {
    command: &'a CommandToSpawn,
    options: &'a ProgressOptions,
    input: Option<&'a InputBlock>,
    progress: &'a mut dyn ProgressReporter,
    cancel: CancelToken,
    sink: BoundedSink<&'a mut dyn RevealSurface>,
    matcher: Option<TokenMatcher>,
    stdout_text: Utf8Decoder,
    progress_interval: Duration,
    was_killed: bool,
    phase: Phase,
}

impl<'a> ProcessRun<'a> {
    pub fn new(
        command: &'a CommandToSpawn,
        options: &'a ProgressOptions,
        input: Option<&'a InputBlock>,
        settings: &RunSettings,
        io: RunIo<'a>,
    ) -> Self {
        let matcher = input.and_then(|block| block.expected.matcher());
        Self {
            command,
            options,
            input,
            progress: io.progress,
            cancel: io.cancel,
            sink: BoundedSink::new(settings.sink, io.surface, Arc::clone(&settings.files)),
            matcher,
            stdout_text: Utf8Decoder::new(),
            progress_interval: settings.progress_interval,
            was_killed: false,
            phase: Phase::Created,
        }
    }

    /// Run the process to completion (or cancellation) and build its result.
    pub async fn run(mut self) -> RunResult {
        let started = Instant::now();
        self.progress.report(&self.options.report_message(Duration::ZERO));

        let exit = match spawn_command(self.command) {
            Ok(child) => {
                self.transition(Phase::Running);
                self.supervise(child, started).await
            }
            Err(err) => {
                warn!(cmd = %self.command.command, error = %err, "failed to start process");
                self.sink.surface_mut().append(&format!("\n{err:#}"));
                Exit::Lost
            }
        };

        self.close(exit, started.elapsed())
    }

    async fn supervise(&mut self, mut child: Child, started: Instant) -> Exit {
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let input = self.input.map(|block| block.input.clone()).unwrap_or_default();
        feed_stdin(child.stdin.take(), input);

        let mut out_buf = vec![0u8; READ_CHUNK];
        let mut err_buf = vec![0u8; READ_CHUNK];

        let period = self.progress_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.sink.start();

        loop {
            let streams_open = stdout.is_some() || stderr.is_some();
            let wake = tokio::select! {
                res = read_pipe(&mut stdout, &mut out_buf) => Wake::Stdout(res),
                res = read_pipe(&mut stderr, &mut err_buf) => Wake::Stderr(res),
                status = child.wait(), if !streams_open => Wake::Exited(status),
                _ = self.sink.next_flush() => Wake::Flush,
                _ = ticker.tick() => Wake::Tick,
                _ = self.cancel.cancelled(), if !self.was_killed => Wake::Cancel,
            };

            match wake {
                Wake::Stdout(Ok(0)) => stdout = None,
                Wake::Stdout(Ok(n)) => self.on_stdout(&out_buf[..n]),
                Wake::Stdout(Err(e)) => {
                    debug!(error = %e, "stdout read failed; treating as closed");
                    stdout = None;
                }
                Wake::Stderr(Ok(0)) => stderr = None,
                Wake::Stderr(Ok(n)) => self.on_stderr(&err_buf[..n]),
                Wake::Stderr(Err(e)) => {
                    debug!(error = %e, "stderr read failed; treating as closed");
                    stderr = None;
                }
                Wake::Exited(Ok(status)) => return Exit::Status(status),
                Wake::Exited(Err(e)) => {
                    warn!(error = %e, "waiting for process failed");
                    return Exit::Lost;
                }
                Wake::Flush => {
                    if let Err(e) = self.sink.flush() {
                        warn!(error = %e, "timed output flush failed");
                    }
                }
                Wake::Tick => {
                    self.progress
                        .report(&self.options.report_message(started.elapsed()));
                    probe_liveness(&mut child);
                }
                Wake::Cancel => {
                    self.kill(&mut child);
                    // No drain window: whatever is still in the pipes is dropped.
                    stdout = None;
                    stderr = None;
                }
            }
        }
    }

    fn on_stdout(&mut self, bytes: &[u8]) {
        if self.was_killed {
            return;
        }
        if let Some(matcher) = self.matcher.as_mut() {
            let text = self.stdout_text.decode(bytes);
            if !text.is_empty() {
                matcher.feed(&text);
            }
        }
        if let Err(e) = self.sink.append(bytes) {
            warn!(error = %e, "failed to record stdout");
        }
    }

    fn on_stderr(&mut self, bytes: &[u8]) {
        if self.was_killed {
            return;
        }
        if let Err(e) = self.sink.append(bytes) {
            warn!(error = %e, "failed to record stderr");
        }
    }

    fn kill(&mut self, child: &mut Child) {
        info!(
            pid = child.id(),
            cmd = %self.command.command,
            "cancellation requested; killing process"
        );
        self.was_killed = true;
        if let Err(e) = kill_tree(child) {
            warn!(error = %e, "failed to kill child process on cancellation");
        }
    }

    /// Terminal transition: finalise sink and matcher, report, build result.
    fn close(mut self, exit: Exit, elapsed: Duration) -> RunResult {
        self.transition(Phase::Closed);

        if let Err(e) = self.sink.close() {
            warn!(error = %e, "closing output sink failed");
        }

        let output = match self.matcher.as_mut() {
            None => OutputCheck::Unchecked,
            Some(matcher) => {
                let tail = self.stdout_text.finish();
                if !tail.is_empty() {
                    matcher.feed(&tail);
                }
                OutputCheck::from_verdict(matcher.finish())
            }
        };

        let failure = match exit {
            Exit::Status(status) => exit_failure(status)
                .or_else(|| self.was_killed.then(|| "killed".to_string())),
            Exit::Lost => Some("-1".to_string()),
        };

        let surface = self.sink.surface_mut();
        match output {
            OutputCheck::Matched => surface.append("\nOutput matched"),
            OutputCheck::Mismatched => surface.append("\n!!!OUTPUT DID NOT MATCH!!!"),
            OutputCheck::Unchecked => {}
        }
        match &failure {
            Some(code) => surface.append(&self.options.failure_message(elapsed, code)),
            None => surface.append(&self.options.success_message(elapsed)),
        }

        let label = self.input.map(InputBlock::label).unwrap_or_default();
        info!(
            job = %self.options.job_name,
            input = %label,
            failure = failure.as_deref().unwrap_or("none"),
            output = ?output,
            killed = self.was_killed,
            elapsed_ms = elapsed.as_millis() as u64,
            "process run finished"
        );

        RunResult::new(
            self.input.cloned(),
            self.options.job_name.clone(),
            failure,
            output,
            self.sink.overflow_summary(),
            elapsed,
        )
    }

    fn transition(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, cmd = %self.command.command, "process run state");
        self.phase = next;
    }
}

/// Spawn, supervise and close one run.
pub async fn run_process<'a>(
    command: &'a CommandToSpawn,
    options: &'a ProgressOptions,
    input: Option<&'a InputBlock>,
    settings: &RunSettings,
    io: RunIo<'a>,
) -> RunResult {
    ProcessRun::new(command, options, input, settings, io)
        .run()
        .await
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize> {
    match pipe.as_mut() {
        Some(p) => p.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Write `input` to the child's stdin and close it. Dropping the handle
/// closes the pipe, so an empty input closes it right away.
fn feed_stdin(stdin: Option<ChildStdin>, input: String) {
    let Some(mut stdin) = stdin else {
        return;
    };
    if input.is_empty() {
        return;
    }
    tokio::spawn(async move {
        if let Err(e) = stdin.write_all(input.as_bytes()).await {
            debug!(error = %e, "stdin closed before all input was written");
        }
    });
}

/// Best-effort check that the child still exists. Errors are ignored.
fn probe_liveness(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(status)) => debug!(?status, "process exited; waiting for output streams to close"),
        Ok(None) => {}
        Err(e) => debug!(error = %e, "liveness probe failed"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::exec::cancel::cancel_pair;
    use crate::fs::mock::MemoryTempFiles;
    use crate::sink::{MAX_OUTPUT_VIEW_SIZE, MemorySurface};
    use crate::verify::ExpectedOutput;

    #[derive(Default)]
    struct Recorded(Vec<String>);

    impl ProgressReporter for Recorded {
        fn report(&mut self, message: &str) {
            self.0.push(message.to_string());
        }
    }

    fn settings(files: Arc<dyn TempFileProvider>, capacity: usize) -> RunSettings {
        RunSettings {
            sink: SinkOptions {
                flush_period: Duration::from_millis(20),
                capacity,
            },
            progress_interval: Duration::from_millis(20),
            files,
        }
    }

    fn block(input: &str, expected: Option<&str>) -> InputBlock {
        InputBlock::new(None, input, ExpectedOutput::from_option(expected))
    }

    async fn run(cmd: &str, input: Option<&InputBlock>, surface: &mut MemorySurface) -> RunResult {
        let files: Arc<dyn TempFileProvider> = Arc::new(MemoryTempFiles::new());
        let mut progress = Recorded::default();
        let io = RunIo {
            surface,
            progress: &mut progress,
            cancel: CancelToken::never(),
        };
        run_process(
            &CommandToSpawn::new(cmd),
            &ProgressOptions::running(),
            input,
            &settings(files, MAX_OUTPUT_VIEW_SIZE),
            io,
        )
        .await
    }


    #[tokio::test]
    async fn matching_output_passes() {
        let mut surface = MemorySurface::new();
        let b = block("", Some("1 2 3"));
        let result = run("printf '1\\n2 3\\n'", Some(&b), &mut surface).await;

        assert!(result.execution_ok());
        assert_eq!(result.output_ok(), Some(true));
        assert!(result.passed());
        assert!(surface.text().starts_with("1\n2 3\n"));
        assert!(surface.text().contains("\nOutput matched"));
        assert!(surface.text().contains("[Finished in "));
        assert_eq!(result.captured_output(), "1\n2 3\n");
    }

    #[tokio::test]
    async fn mismatch_is_reported_but_execution_succeeds() {
        let mut surface = MemorySurface::new();
        let b = block("", Some("1 2 4"));
        let result = run("echo 1 2 3", Some(&b), &mut surface).await;

        assert!(result.execution_ok());
        assert_eq!(result.output_ok(), Some(false));
        assert!(surface.text().contains("!!!OUTPUT DID NOT MATCH!!!"));
    }

    #[tokio::test]
    async fn multibyte_token_split_across_writes_matches() {
        // U+017E is 0xC5 0xBE; the two bytes arrive in separate reads.
        let mut surface = MemorySurface::new();
        let b = block("", Some("ž"));
        let result = run("printf '\\305'; sleep 0.1; printf '\\276\\n'", Some(&b), &mut surface).await;

        assert!(result.execution_ok());
        assert_eq!(result.output_ok(), Some(true));
        assert!(surface.text().starts_with("ž\n"));
        assert_eq!(result.captured_output(), "ž\n");
    }

    #[tokio::test]
    async fn multibyte_token_with_wrong_second_byte_mismatches() {
        let mut surface = MemorySurface::new();
        let b = block("", Some("ž"));
        let result = run("printf '\\305'; sleep 0.1; printf '\\272\\n'", Some(&b), &mut surface).await;

        assert!(result.execution_ok());
        assert_eq!(result.output_ok(), Some(false));
        assert!(surface.text().starts_with("ź\n"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_execution_failure() {
        let mut surface = MemorySurface::new();
        let result = run("echo oops >&2; exit 2", None, &mut surface).await;

        assert!(!result.execution_ok());
        assert_eq!(result.failure(), Some("2"));
        assert_eq!(result.output_ok(), None);
        assert!(surface.text().contains("oops"));
        assert!(surface.text().contains("[Failed in "));
        assert!(surface.text().contains("with code 2]"));
        assert!(result.check_execution().is_err());
    }

    #[tokio::test]
    async fn input_block_is_piped_to_stdin() {
        let mut surface = MemorySurface::new();
        let b = block("3 4\n", Some("3 4"));
        let result = run("cat", Some(&b), &mut surface).await;

        assert!(result.execution_ok());
        assert_eq!(result.output_ok(), Some(true));
        assert!(surface.text().starts_with("3 4\n"));
    }

    #[tokio::test]
    async fn missing_program_fails_execution() {
        let mut surface = MemorySurface::new();
        let result = run("exec /nonexistent/program", None, &mut surface).await;
        assert!(!result.execution_ok());
    }

    #[tokio::test]
    async fn cancel_kills_the_process() {
        let (handle, token) = cancel_pair();
        let mut surface = MemorySurface::new();
        let mut progress = Recorded::default();
        let files: Arc<dyn TempFileProvider> = Arc::new(MemoryTempFiles::new());
        let settings = settings(files, MAX_OUTPUT_VIEW_SIZE);
        let command = CommandToSpawn::new("echo started; exec sleep 30");
        let options = ProgressOptions::running();

        let io = RunIo {
            surface: &mut surface,
            progress: &mut progress,
            cancel: token,
        };
        let run = run_process(&command, &options, None, &settings, io);
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            handle.cancel();
        };
        let (result, ()) = tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(run, cancel)
        })
        .await
        .expect("cancelled run should finish promptly");

        assert!(!result.execution_ok());
        assert_eq!(result.failure(), Some("SIGKILL"));
        assert!(result.duration() < Duration::from_secs(10));

        let text = surface.text();
        assert_eq!(text.matches("[Failed in ").count(), 1);
        assert!(!text.contains("[Finished in "));
        assert!(progress.0.first().is_some_and(|m| m.starts_with("Running ")));
    }

    #[tokio::test]
    async fn large_output_spills_to_file() {
        let fs = MemoryTempFiles::new();
        let files: Arc<dyn TempFileProvider> = Arc::new(fs.clone());
        let mut surface = MemorySurface::new();
        let mut progress = Recorded::default();
        let io = RunIo {
            surface: &mut surface,
            progress: &mut progress,
            cancel: CancelToken::never(),
        };

        let result = run_process(
            &CommandToSpawn::new("i=0; while [ $i -lt 50 ]; do echo 0123456789; i=$((i+1)); done"),
            &ProgressOptions::running(),
            None,
            &settings(files, 100),
            io,
        )
        .await;

        assert!(result.execution_ok());
        let paths = fs.paths();
        assert_eq!(paths.len(), 1);
        let stored = fs.contents(&paths[0]).unwrap();
        assert_eq!(stored, "0123456789\n".repeat(50).into_bytes());

        assert_eq!(surface.text().matches("FULL OUTPUT IN").count(), 1);
        assert!(result.captured_output().starts_with("...TRUNCATED"));
    }
}
