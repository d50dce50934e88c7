//! Command execution for widget actions and state probes.
//!
//! Every child runs in its own session so long-running targets never tie up
//! the deck. Failures are logged and surface as an empty result.

use std::fmt;
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

use tracing::{debug, warn};

use crate::config::DEFAULT_PROBE_TIMEOUT_MS;
use crate::util;

const POLL_INTERVAL_MS: u64 = 10;

/// A command given either as a shell string or as an argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Run through `sh -c`, so pipes and `&&` work.
    Shell(String),
    Args(Vec<String>),
}

impl CommandLine {
    pub fn shell(cmd: impl Into<String>) -> Self {
        CommandLine::Shell(cmd.into())
    }

    pub fn args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandLine::Args(args.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CommandLine::Shell(cmd) => cmd.trim().is_empty(),
            CommandLine::Args(args) => args.first().map(|p| p.is_empty()).unwrap_or(true),
        }
    }

    /// Process for this command line, stdin closed and in a new session.
    /// An empty argument vector yields a command that fails to spawn.
    pub fn to_command(&self) -> Command {
        let mut command = match self {
            CommandLine::Shell(cmd) => {
                let mut command = Command::new("sh");
                command.arg("-c").arg(cmd);
                command
            }
            CommandLine::Args(args) => {
                let (program, rest) = args.split_first().map_or(("", &[][..]), |(program, rest)| {
                    (program.as_str(), rest)
                });
                let mut command = Command::new(program);
                command.args(rest);
                command
            }
        };
        configure_command(&mut command);
        command
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Shell(cmd) => f.write_str(cmd),
            CommandLine::Args(args) => f.write_str(&args.join(" ")),
        }
    }
}

/// Seam between widgets and the operating system.
pub trait CommandRunner: Send + Sync {
    /// Start a detached command and return immediately; output is discarded.
    fn spawn(&self, command: &CommandLine);

    /// Run a command to completion and return its stdout with trailing
    /// whitespace removed, or `""` on any failure.
    fn probe(&self, command: &CommandLine) -> String;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    probe_timeout: Option<Duration>,
}

impl CommandExecutor {
    /// `None` lets probes block until the command finishes.
    pub fn new(probe_timeout: Option<Duration>) -> Self {
        Self { probe_timeout }
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(Some(Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS)))
    }
}

impl CommandRunner for CommandExecutor {
    fn spawn(&self, command: &CommandLine) {
        if command.is_empty() {
            warn!("command was empty");
            return;
        }
        let snippet = util::log_snippet(&command.to_string());
        debug!(command = %snippet, "spawn detached command");
        let mut child = command.to_command();
        child
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        match child.spawn() {
            Ok(child) => reap_in_background(child, snippet),
            Err(err) => warn!(command = %snippet, ?err, "command failed to start"),
        }
    }

    fn probe(&self, command: &CommandLine) -> String {
        if command.is_empty() {
            warn!("probe command was empty");
            return String::new();
        }
        let snippet = util::log_snippet(&command.to_string());
        let started = Instant::now();
        match run_probe(command, self.probe_timeout) {
            Ok(ProbeOutput { stdout, stderr, status }) => {
                let elapsed_ms = started.elapsed().as_millis();
                if !status.success() {
                    debug!(
                        command = %snippet,
                        code = ?status.code(),
                        stderr = %util::log_snippet(&stderr),
                        "probe returned non-zero status"
                    );
                } else {
                    debug!(command = %snippet, elapsed_ms, "probe ok");
                }
                stdout.trim_end().to_string()
            }
            Err(err) => {
                warn!(command = %snippet, ?err, "probe failed");
                String::new()
            }
        }
    }
}

struct ProbeOutput {
    stdout: String,
    stderr: String,
    status: ExitStatus,
}

fn run_probe(command: &CommandLine, timeout: Option<Duration>) -> io::Result<ProbeOutput> {
    let mut child = command.to_command();
    child.stdout(Stdio::piped()).stderr(Stdio::piped());
    let mut child = child.spawn()?;

    let stdout_handle = spawn_reader(child.stdout.take());
    let stderr_handle = spawn_reader(child.stderr.take());
    let pid = child.id() as i32;

    let status = match wait_with_timeout(&mut child, timeout) {
        Ok(status) => status,
        Err(err) => {
            kill_process_group(pid);
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Err(err);
        }
    };

    // Anything the command left behind in its session is done as well; this
    // also closes pipes held open by backgrounded grandchildren.
    kill_process_group(pid);

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    Ok(ProbeOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        status,
    })
}

fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> io::Result<ExitStatus> {
    let Some(timeout) = timeout else {
        return child.wait();
    };
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if started.elapsed() >= timeout {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "command timed out"));
        }
        std::thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
    }
}

fn spawn_reader<R: Read + Send + 'static>(reader: Option<R>) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buf);
        }
        buf
    })
}

fn reap_in_background(mut child: Child, snippet: String) {
    let spawned = std::thread::Builder::new()
        .name("controldeck-reaper".to_string())
        .spawn(move || match child.wait() {
            Ok(status) if !status.success() => {
                debug!(command = %snippet, code = ?status.code(), "detached command exited with error");
            }
            Ok(_) => {}
            Err(err) => warn!(command = %snippet, ?err, "failed to reap detached command"),
        });
    if let Err(err) = spawned {
        warn!(?err, "failed to spawn reaper thread");
    }
}

fn configure_command(command: &mut Command) {
    command.stdin(Stdio::null());
    #[cfg(unix)]
    unsafe {
        // New session: the child survives independently of the deck's process group.
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Kill every process in the group led by `pid`.
pub fn kill_process_group(pid: i32) {
    if pid <= 0 {
        return;
    }
    #[cfg(unix)]
    unsafe {
        libc::kill(-pid, libc::SIGKILL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_commands_are_detected() {
        assert!(CommandLine::shell("   ").is_empty());
        assert!(CommandLine::Args(Vec::new()).is_empty());
        assert!(!CommandLine::args(["echo", "hi"]).is_empty());
        assert_eq!(CommandLine::args(["echo", "hi"]).to_string(), "echo hi");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn probe_returns_trimmed_stdout() {
        let executor = CommandExecutor::default();
        assert_eq!(executor.probe(&CommandLine::shell("printf '47%%\\n\\n'")), "47%");
        assert_eq!(executor.probe(&CommandLine::args(["echo", "a b"])), "a b");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn probe_failures_yield_empty_string() {
        let executor = CommandExecutor::default();
        assert_eq!(
            executor.probe(&CommandLine::args(["/nonexistent/controldeck-probe"])),
            ""
        );
        assert_eq!(executor.probe(&CommandLine::shell("")), "");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn probe_keeps_output_of_failing_commands() {
        let executor = CommandExecutor::default();
        assert_eq!(executor.probe(&CommandLine::shell("echo off; exit 3")), "off");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn probe_timeout_kills_the_command() {
        let executor = CommandExecutor::new(Some(Duration::from_millis(200)));
        let started = Instant::now();
        assert_eq!(executor.probe(&CommandLine::shell("echo early; sleep 5")), "");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn spawn_does_not_wait_for_the_command() {
        let executor = CommandExecutor::default();
        let started = Instant::now();
        executor.spawn(&CommandLine::shell("sleep 5"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
