//! Process execution for the external tools (yt-dlp, ffmpeg, ffprobe)
//!
//! A run streams stdout and stderr line by line to a handler while the child is
//! alive, then reports the exit code together with the captured lines. A
//! [`KillSwitch`] shared with the caller terminates the whole process tree,
//! including helpers the tool spawned itself.
//!
//! There is deliberately no timeout here: a tool that hangs blocks until the
//! kill switch fires.

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::config::Tool;

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Callback receiving every output line as soon as it is read.
///
/// Invoked concurrently from the stdout and stderr readers.
pub type LineHandler = Arc<dyn Fn(StreamKind, &str) + Send + Sync>;

/// Handler that ignores all lines, for one-shot probes
pub fn discard_lines() -> LineHandler {
    Arc::new(|_, _| {})
}

/// Errors raised while starting or supervising an external process
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{tool} not found at {}", path.display())]
    ToolMissing { tool: Tool, path: PathBuf },

    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: Tool,
        #[source]
        source: io::Error,
    },

    #[error("{0} was terminated")]
    Terminated(Tool),

    #[error("{0} is already running on this runner")]
    Busy(Tool),

    #[error("Failed while waiting for {tool}: {source}")]
    Io {
        tool: Tool,
        #[source]
        source: io::Error,
    },
}

/// A fully built command line for one of the external tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub tool: Tool,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Keep stdout lines in [`ToolOutput::stdout`]. Off for long runs whose
    /// stdout is only progress chatter; the handler still sees every line.
    pub capture_stdout: bool,
}

impl ToolCommand {
    pub fn new(tool: Tool, program: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            program: program.into(),
            args: Vec::new(),
            capture_stdout: true,
        }
    }

    /// Streams stdout to the line handler without keeping it
    #[must_use]
    pub fn streaming_stdout(mut self) -> Self {
        self.capture_stdout = false;
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Result of a finished tool run.
///
/// The exit code is informational: callers decide success by scanning the
/// captured lines for the tool's error marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ToolOutput {
    pub fn exited_cleanly(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Concatenated stderr lines
    pub fn diagnostics(&self) -> String {
        self.stderr.join("\n")
    }

    /// Concatenated stdout lines
    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n")
    }
}

/// Termination request shared between an operation and the runner.
///
/// `terminate()` can be called from any thread at any time, any number of times.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch(CancellationToken);

impl KillSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terminate(&self) {
        self.0.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolves once `terminate()` has been called
    pub async fn terminated(&self) {
        self.0.cancelled().await;
    }
}

/// Seam between the orchestrator and real processes, so tests can script tools.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(
        &self,
        command: &ToolCommand,
        on_line: LineHandler,
        kill_switch: &KillSwitch,
    ) -> Result<ToolOutput, ProcessError>;
}

/// Runs tools as real child processes via tokio.
#[derive(Debug, Default)]
pub struct ProcessRunner {
    busy: AtomicBool,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(
        &self,
        command: &ToolCommand,
        on_line: LineHandler,
        kill_switch: &KillSwitch,
    ) -> Result<ToolOutput, ProcessError> {
        let tool = command.tool;

        if kill_switch.is_terminated() {
            return Err(ProcessError::Terminated(tool));
        }

        if !command.program.is_file() {
            return Err(ProcessError::ToolMissing {
                tool,
                path: command.program.clone(),
            });
        }

        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(ProcessError::Busy(tool));
        }
        let _guard = BusyGuard(&self.busy);

        run_child(command, on_line, kill_switch).await
    }
}

async fn run_child(
    command: &ToolCommand,
    on_line: LineHandler,
    kill_switch: &KillSwitch,
) -> Result<ToolOutput, ProcessError> {
    let tool = command.tool;

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    isolate_process_tree(&mut cmd);

    log::debug!("Starting {}", command);

    let mut child = cmd.spawn().map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ProcessError::ToolMissing {
                tool,
                path: command.program.clone(),
            }
        } else {
            ProcessError::Spawn { tool, source }
        }
    })?;
    let pid = child.id();
    let mut tree_guard = TreeGuard::new(pid);

    let stdout_task = child
        .stdout
        .take()
        .map(|stream| spawn_reader(stream, StreamKind::Stdout, Arc::clone(&on_line), command.capture_stdout));
    let stderr_task = child
        .stderr
        .take()
        .map(|stream| spawn_reader(stream, StreamKind::Stderr, Arc::clone(&on_line), true));
    let reader_aborts: Vec<_> = [&stdout_task, &stderr_task]
        .into_iter()
        .flatten()
        .map(JoinHandle::abort_handle)
        .collect();

    let finished = async {
        let status = child.wait().await;
        let stdout = collect_reader(stdout_task).await;
        let stderr = collect_reader(stderr_task).await;
        (status, stdout, stderr)
    };

    tokio::select! {
        (status, stdout, stderr) = finished => {
            tree_guard.disarm();
            let status = status.map_err(|source| ProcessError::Io { tool, source })?;
            log::debug!("{} exited with {:?}", tool, status.code());
            Ok(ToolOutput {
                exit_code: status.code(),
                stdout,
                stderr,
            })
        }
        _ = kill_switch.terminated() => {
            log::info!("Terminating {} (pid {:?}) and its child processes", tool, pid);
            tree_guard.disarm();
            kill_process_tree(&mut child, pid);
            if let Err(e) = child.wait().await {
                log::warn!("Failed to reap {} after kill: {}", tool, e);
            }
            for abort in reader_aborts {
                abort.abort();
            }
            Err(ProcessError::Terminated(tool))
        }
    }
}

fn spawn_reader<R>(stream: R, kind: StreamKind, on_line: LineHandler, capture: bool) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut stream = stream;
        let mut splitter = LineSplitter::default();
        let mut captured = Vec::new();
        let mut buf = [0u8; 8192];

        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    for line in splitter.push(&buf[..n]) {
                        log::trace!("{:?}: {}", kind, line);
                        on_line(kind, &line);
                        if capture {
                            captured.push(line);
                        }
                    }
                }
                Err(e) => {
                    log::debug!("Stopped reading {:?}: {}", kind, e);
                    break;
                }
            }
        }

        if let Some(line) = splitter.finish() {
            on_line(kind, &line);
            if capture {
                captured.push(line);
            }
        }
        captured
    })
}

async fn collect_reader(task: Option<JoinHandle<Vec<String>>>) -> Vec<String> {
    match task {
        Some(handle) => handle.await.unwrap_or_else(|e| {
            log::warn!("Output reader task failed: {}", e);
            Vec::new()
        }),
        None => Vec::new(),
    }
}

/// Splits a byte stream into lines on `\n`, `\r` or `\r\n`.
///
/// yt-dlp redraws its progress line with bare carriage returns, so `\r` has to
/// count as a terminator or progress would only arrive at exit.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
    last_was_cr: bool,
}

impl LineSplitter {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            match byte {
                b'\n' if self.last_was_cr => {
                    self.last_was_cr = false;
                }
                b'\n' | b'\r' => {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                    self.last_was_cr = byte == b'\r';
                }
                _ => {
                    self.pending.push(byte);
                    self.last_was_cr = false;
                }
            }
        }
        lines
    }

    /// Trailing text without a terminator, if any
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

#[cfg(unix)]
fn isolate_process_tree(cmd: &mut Command) {
    // New process group led by the child; killpg then reaches every helper it spawns
    cmd.process_group(0);
}

#[cfg(windows)]
fn isolate_process_tree(cmd: &mut Command) {
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(any(unix, windows)))]
fn isolate_process_tree(_cmd: &mut Command) {}

/// Kills the process tree when a run is dropped mid-flight.
///
/// `kill_on_drop` only reaches the direct child; helpers it spawned would
/// otherwise outlive a dropped operation future.
struct TreeGuard {
    pid: Option<u32>,
}

impl TreeGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for TreeGuard {
    fn drop(&mut self) {
        if let Some(pid) = self.pid.take() {
            log::info!("Run dropped while pid {} was alive, killing its process tree", pid);
            if let Err(e) = kill_tree_by_pid(pid) {
                log::warn!("Failed to kill process tree of pid {}: {}", pid, e);
            }
        }
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_tree_by_pid(pid: u32) -> io::Result<()> {
    // SAFETY: killpg only sends a signal; the group id is the pid of our own child.
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(windows)]
fn kill_tree_by_pid(pid: u32) -> io::Result<()> {
    let status = std::process::Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {:?}", status.code())))
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_tree_by_pid(_pid: u32) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}

fn kill_process_tree(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        match kill_tree_by_pid(pid) {
            Ok(()) => return,
            Err(e) => log::warn!("Failed to kill process tree of pid {}: {}", pid, e),
        }
    }
    if let Err(e) = child.start_kill() {
        log::warn!("Failed to kill child process: {}", e);
    }
}
