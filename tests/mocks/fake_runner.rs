//! Scripted tool runner for orchestrator tests
//!
//! Stands in for yt-dlp, ffprobe and ffmpeg: each kind of call replays a fixed
//! script (output lines, exit code, files to create) and every command is
//! recorded for later assertions. Nothing is spawned.

#![allow(dead_code)] // Not every test binary uses every helper

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::Notify;

use mediagrab::core::config::{Tool, ToolPaths};
use mediagrab::core::process::{
    KillSwitch, LineHandler, ProcessError, StreamKind, ToolCommand, ToolOutput, ToolRunner,
};
use mediagrab::download::{Confirmation, Confirmer};

/// Which external call a command represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    PlaylistProbe,
    Metadata,
    Download,
    Duration,
    Transcode,
}

impl Call {
    pub fn of(command: &ToolCommand) -> Self {
        match command.tool {
            Tool::Downloader if command.args.iter().any(|a| a == "--flat-playlist") => Call::PlaylistProbe,
            Tool::Downloader if command.args.iter().any(|a| a == "-J") => Call::Metadata,
            Tool::Downloader => Call::Download,
            Tool::DurationProbe => Call::Duration,
            Tool::Transcoder => Call::Transcode,
        }
    }
}

/// How a scripted call fails before producing output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    Missing,
    Spawn,
}

/// Behaviour of one kind of call
#[derive(Debug, Clone)]
pub struct Script {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exit_code: Option<i32>,
    /// Files written before the lines are replayed
    pub creates: Vec<PathBuf>,
    /// Write an empty file at the last argument (ffmpeg's output)
    pub create_last_arg: bool,
    /// After replaying, block until the kill switch fires
    pub hang: bool,
    pub fail: Option<FakeFailure>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: Some(0),
            creates: Vec::new(),
            create_last_arg: false,
            hang: false,
            fail: None,
        }
    }
}

impl Script {
    pub fn stdout<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stdout.extend(lines.into_iter().map(Into::into));
        self
    }

    pub fn stderr<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stderr.extend(lines.into_iter().map(Into::into));
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    pub fn creates(mut self, path: impl Into<PathBuf>) -> Self {
        self.creates.push(path.into());
        self
    }

    pub fn creates_output(mut self) -> Self {
        self.create_last_arg = true;
        self
    }

    pub fn hangs(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn fails(mut self, failure: FakeFailure) -> Self {
        self.fail = Some(failure);
        self
    }
}

#[derive(Default)]
pub struct FakeRunner {
    scripts: Mutex<HashMap<Call, Script>>,
    commands: Mutex<Vec<ToolCommand>>,
    /// Signalled when a hanging script starts waiting for termination
    pub hanging: Notify,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, call: Call, script: Script) -> Self {
        self.scripts.lock().unwrap().insert(call, script);
        self
    }

    pub fn commands(&self) -> Vec<ToolCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.commands().iter().map(Call::of).collect()
    }

    pub fn command_for(&self, call: Call) -> Option<ToolCommand> {
        self.commands().into_iter().find(|c| Call::of(c) == call)
    }
}

#[async_trait]
impl ToolRunner for FakeRunner {
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

        self.commands.lock().unwrap().push(command.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&Call::of(command))
            .cloned()
            .unwrap_or_default();

        match script.fail {
            Some(FakeFailure::Missing) => {
                return Err(ProcessError::ToolMissing {
                    tool,
                    path: command.program.clone(),
                })
            }
            Some(FakeFailure::Spawn) => {
                return Err(ProcessError::Spawn {
                    tool,
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                })
            }
            None => {}
        }

        for path in &script.creates {
            std::fs::write(path, b"media").unwrap();
        }
        if script.create_last_arg {
            let output = command.args.last().expect("command without arguments");
            std::fs::write(output, b"converted").unwrap();
        }

        for line in &script.stdout {
            on_line(StreamKind::Stdout, line);
        }
        for line in &script.stderr {
            on_line(StreamKind::Stderr, line);
        }

        if script.hang {
            self.hanging.notify_one();
            kill_switch.terminated().await;
            return Err(ProcessError::Terminated(tool));
        }

        Ok(ToolOutput {
            exit_code: script.exit_code,
            stdout: if command.capture_stdout { script.stdout } else { Vec::new() },
            stderr: script.stderr,
        })
    }
}

/// Confirmer with fixed answers per question kind, recording what was asked
pub struct ScriptedConfirmer {
    pub expand_playlist: bool,
    pub convert: bool,
    asked: Mutex<Vec<Confirmation>>,
}

impl ScriptedConfirmer {
    pub fn new(expand_playlist: bool, convert: bool) -> Self {
        Self {
            expand_playlist,
            convert,
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<Confirmation> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, question: Confirmation) -> bool {
        let answer = match &question {
            Confirmation::ExpandPlaylist { .. } => self.expand_playlist,
            Confirmation::ConvertContainer { .. } => self.convert,
        };
        self.asked.lock().unwrap().push(question);
        answer
    }
}

/// Creates empty stand-ins for the three binaries so validation passes
pub fn install_fake_tools(dir: &Path) -> ToolPaths {
    let tools = ToolPaths::in_dir(dir);
    for path in [&tools.downloader, &tools.transcoder, &tools.prober] {
        std::fs::write(path, b"").unwrap();
    }
    tools
}

/// Confirmer that never answers, like a user who walked away from the prompt
#[derive(Default)]
pub struct PendingConfirmer {
    /// Signalled when a question is put to the user
    pub asked: Notify,
}

#[async_trait]
impl Confirmer for PendingConfirmer {
    async fn confirm(&self, _question: Confirmation) -> bool {
        self.asked.notify_one();
        std::future::pending().await
    }
}
