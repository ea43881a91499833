// src/exec/command.rs

//! Shell command construction and spawning.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tracing::debug;

/// A command line to run through the platform shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandToSpawn {
    pub command: String,
    pub cwd: Option<PathBuf>,
    /// Extra environment variables for the child.
    pub env: Vec<(String, String)>,
}

impl CommandToSpawn {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Build a shell command appropriate for the platform.
#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut c = Command::new("cmd");
    c.arg("/S").arg("/C").raw_arg(format!("\"{command}\""));
    c
}

#[cfg(not(windows))]
fn shell(command: &str) -> Command {
    let mut c = Command::new("sh");
    c.arg("-c").arg(command);
    c
}

/// Kill the child and, on Windows, everything it started.
#[cfg(windows)]
pub fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    if let Some(pid) = child.id() {
        let status = std::process::Command::new("taskkill")
            .args(["/pid", &pid.to_string(), "/f", "/t"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => return Ok(()),
            Ok(s) => debug!(pid, status = %s, "taskkill failed; killing direct child"),
            Err(e) => debug!(pid, error = %e, "taskkill unavailable; killing direct child"),
        }
    }
    child.start_kill()
}

/// Kill the child. Grandchildren keep running but lose their pipes once the
/// run drops its ends.
#[cfg(not(windows))]
pub fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

/// Spawn the command with all three standard streams piped.
///
/// The child is killed if its handle is dropped.
pub fn spawn_command(to_spawn: &CommandToSpawn) -> Result<Child> {
    let mut cmd = shell(&to_spawn.command);
    if let Some(cwd) = &to_spawn.cwd {
        cmd.current_dir(cwd);
    }
    cmd.envs(to_spawn.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .with_context(|| format!("spawning process for command '{}'", to_spawn.command))?;
    debug!(pid = child.id(), cmd = %to_spawn.command, "spawned child process");
    Ok(child)
}

/// Human-readable name for a terminating signal.
pub fn signal_name(signal: i32) -> String {
    let name = match signal {
        1 => "SIGHUP",
        2 => "SIGINT",
        3 => "SIGQUIT",
        4 => "SIGILL",
        6 => "SIGABRT",
        8 => "SIGFPE",
        9 => "SIGKILL",
        11 => "SIGSEGV",
        13 => "SIGPIPE",
        14 => "SIGALRM",
        15 => "SIGTERM",
        _ => return format!("signal {signal}"),
    };
    name.to_string()
}

/// `None` for a clean exit, otherwise the exit code or signal that ended the
/// process.
pub fn exit_failure(status: std::process::ExitStatus) -> Option<String> {
    if status.success() {
        return None;
    }
    if let Some(code) = status.code() {
        return Some(code.to_string());
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(signal_name(signal));
        }
    }
    Some("-1".to_string())
}
