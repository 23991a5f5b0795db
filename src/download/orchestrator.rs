//! Download/conversion orchestration.
//!
//! Sequences one operation:
//!   validate tools and folder → detect playlist → download with progress
//!   → locate the file → ask about conversion → probe duration → transcode
//!   → delete the original
//!
//! Progress from both tools is normalized into [`ProgressEvent`]s and delivered
//! through a single pump. [`Orchestrator::stop_operation`] can be called at any
//! point from another task and turns the result into `Cancelled`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use strum::Display;

use crate::conversion::probe_duration;
use crate::conversion::video::{converted_path, transcode_command, TARGET_CONTAINER};
use crate::core::config::{Tool, ToolPaths};
use crate::core::process::{KillSwitch, LineHandler, StreamKind, ToolCommand, ToolOutput, ToolRunner};
use crate::download::confirm::{Confirmation, Confirmer};
use crate::download::error::DownloadError;
use crate::download::metadata::{extension_of, find_latest_file};
use crate::download::parser::{
    downloader_reports_error, parse_downloader_line, transcoder_reports_error, TranscodeProgress,
};
use crate::download::progress::{ProgressEvent, ProgressPump, ProgressSender};
use crate::download::request::{DownloadRequest, MediaFormat};
use crate::download::ytdlp::{download_command, probe_playlist};

/// Where an operation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OperationState {
    Idle,
    ValidatingEnvironment,
    DetectingPlaylist,
    Downloading,
    LocatingOutput,
    DecidingConversion,
    ProbingDuration,
    Converting,
    CleaningUp,
    Completed,
    Failed,
    Cancelled,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Idle | OperationState::Completed | OperationState::Failed | OperationState::Cancelled
        )
    }
}

/// How a successful operation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Audio extracted by the downloader; files are named by their titles
    Audio { output_dir: PathBuf },
    /// The download already had the target container
    AlreadyTarget(PathBuf),
    /// Conversion was declined; the native file is kept
    KeptNative(PathBuf),
    /// Transcoded to MP4. `source_removed` is false when deleting the original failed
    Converted { output: PathBuf, source_removed: bool },
}

/// Drives yt-dlp, ffprobe and ffmpeg for one operation at a time.
pub struct Orchestrator {
    tools: ToolPaths,
    runner: Arc<dyn ToolRunner>,
    confirmer: Arc<dyn Confirmer>,
    active: Mutex<Option<KillSwitch>>,
    state: Mutex<OperationState>,
}

/// Releases the active slot even when the operation future is dropped
struct ActiveSlot<'a>(&'a Mutex<Option<KillSwitch>>);

impl Drop for ActiveSlot<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Orchestrator {
    pub fn new(tools: ToolPaths, runner: Arc<dyn ToolRunner>, confirmer: Arc<dyn Confirmer>) -> Self {
        Self {
            tools,
            runner,
            confirmer,
            active: Mutex::new(None),
            state: Mutex::new(OperationState::Idle),
        }
    }

    pub fn tools(&self) -> &ToolPaths {
        &self.tools
    }

    pub fn state(&self) -> OperationState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while an operation is running
    pub fn is_busy(&self) -> bool {
        self.active.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Requests termination of the running operation.
    ///
    /// Safe to call when idle and any number of times.
    pub fn stop_operation(&self) {
        match self.active.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(kill_switch) => {
                if !kill_switch.is_terminated() {
                    log::info!("Stop requested during {}", self.state());
                }
                kill_switch.terminate();
            }
            None => log::debug!("Stop requested but no operation is running"),
        }
    }

    /// Runs one download operation to completion.
    ///
    /// # Arguments
    /// * `request` - URL, output folder and format
    /// * `on_progress` - Receives every progress event, in order, before this returns
    ///
    /// # Returns
    /// * `Ok(Completion)` - How the operation ended
    /// * `Err(DownloadError::AlreadyRunning)` - Another operation is active; it is left untouched
    /// * `Err(DownloadError::Cancelled)` - `stop_operation` was called, whatever the stage returned
    /// * `Err(_)` - Any other failure, reported once
    pub async fn start_operation<F>(&self, request: DownloadRequest, on_progress: F) -> Result<Completion, DownloadError>
    where
        F: FnMut(ProgressEvent) + Send + 'static,
    {
        let kill_switch = {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            if active.is_some() {
                log::warn!("Rejecting {}: another operation is running", request.url());
                return Err(DownloadError::AlreadyRunning);
            }
            let kill_switch = KillSwitch::new();
            *active = Some(kill_switch.clone());
            kill_switch
        };
        let _slot = ActiveSlot(&self.active);

        log::info!(
            "Starting {} download of {} into {}",
            request.format(),
            request.url(),
            request.output_dir().display()
        );

        let pump = ProgressPump::start(Box::new(on_progress), kill_switch.clone());
        let result = self.run_pipeline(&request, &pump.sender(), &kill_switch).await;
        pump.finish().await;

        let result = match result {
            _ if kill_switch.is_terminated() => Err(DownloadError::Cancelled),
            other => other,
        };

        match &result {
            Ok(completion) => {
                log::info!("Operation completed: {:?}", completion);
                self.set_state(OperationState::Completed);
            }
            Err(DownloadError::Cancelled) => {
                log::info!("Operation cancelled");
                self.set_state(OperationState::Cancelled);
            }
            Err(e) => {
                log::error!("Operation failed [{}]: {}", e.code(), e);
                self.set_state(OperationState::Failed);
            }
        }

        result
    }

    async fn run_pipeline(
        &self,
        request: &DownloadRequest,
        progress: &ProgressSender,
        kill_switch: &KillSwitch,
    ) -> Result<Completion, DownloadError> {
        self.enter(OperationState::ValidatingEnvironment, kill_switch)?;
        self.validate_environment(request.output_dir())?;

        self.enter(OperationState::DetectingPlaylist, kill_switch)?;
        let is_playlist =
            probe_playlist(self.runner.as_ref(), &self.tools.downloader, request.url(), kill_switch).await?;
        let expand_playlist = if is_playlist {
            let question = Confirmation::ExpandPlaylist {
                url: request.url().to_string(),
            };
            self.ask(question, kill_switch).await?
        } else {
            false
        };

        self.enter(OperationState::Downloading, kill_switch)?;
        let command = download_command(&self.tools.downloader, request, expand_playlist);
        self.run_reporting(&command, progress, kill_switch, parse_downloader_line, downloader_reports_error)
            .await?;

        if request.format() == MediaFormat::Audio {
            return Ok(Completion::Audio {
                output_dir: request.output_dir().to_path_buf(),
            });
        }

        self.enter(OperationState::LocatingOutput, kill_switch)?;
        let artifact = locate_output(request.output_dir())?;
        let extension = extension_of(&artifact);
        log::info!("Downloaded file: {}", artifact.display());
        if extension == TARGET_CONTAINER {
            return Ok(Completion::AlreadyTarget(artifact));
        }

        self.enter(OperationState::DecidingConversion, kill_switch)?;
        let question = Confirmation::ConvertContainer {
            found: extension,
            target: TARGET_CONTAINER.to_string(),
        };
        if !self.ask(question, kill_switch).await? {
            return Ok(Completion::KeptNative(artifact));
        }

        self.enter(OperationState::ProbingDuration, kill_switch)?;
        let total_secs = probe_duration(self.runner.as_ref(), &self.tools.prober, &artifact, kill_switch).await?;

        self.enter(OperationState::Converting, kill_switch)?;
        let output = converted_path(&artifact);
        let transcode = TranscodeProgress::new(total_secs);
        let command = transcode_command(&self.tools.transcoder, &artifact, &output);
        self.run_reporting(
            &command,
            progress,
            kill_switch,
            move |line: &str| transcode.parse_line(line),
            transcoder_reports_error,
        )
        .await?;

        self.enter(OperationState::CleaningUp, kill_switch)?;
        let source_removed = remove_source(&artifact);

        Ok(Completion::Converted { output, source_removed })
    }

    fn set_state(&self, state: OperationState) {
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != state {
            log::info!("State: {} -> {}", *current, state);
            *current = state;
        }
    }

    /// Moves to the next stage unless termination was requested
    fn enter(&self, state: OperationState, kill_switch: &KillSwitch) -> Result<(), DownloadError> {
        if kill_switch.is_terminated() {
            return Err(DownloadError::Cancelled);
        }
        self.set_state(state);
        Ok(())
    }

    /// Binaries first (downloader, transcoder, probe), then the output folder
    fn validate_environment(&self, output_dir: &Path) -> Result<(), DownloadError> {
        for tool in [Tool::Downloader, Tool::Transcoder, Tool::DurationProbe] {
            let path = self.tools.path_of(tool);
            if !path.is_file() {
                return Err(DownloadError::ToolMissing {
                    tool,
                    path: path.to_path_buf(),
                });
            }
        }

        if !output_dir.is_dir() {
            return Err(DownloadError::OutputFolderInvalid(output_dir.to_path_buf()));
        }

        Ok(())
    }

    async fn ask(&self, question: Confirmation, kill_switch: &KillSwitch) -> Result<bool, DownloadError> {
        log::info!("Asking: {}", question);
        tokio::select! {
            biased;
            _ = kill_switch.terminated() => Err(DownloadError::Cancelled),
            answer = self.confirmer.confirm(question) => {
                log::info!("Answer: {}", if answer { "yes" } else { "no" });
                Ok(answer)
            }
        }
    }

    /// Runs a tool whose failure is signalled by a marker in its output.
    ///
    /// Every line from either stream is checked for the marker and parsed for
    /// progress. The exit code alone never fails the run.
    async fn run_reporting<P>(
        &self,
        command: &ToolCommand,
        progress: &ProgressSender,
        kill_switch: &KillSwitch,
        parse: P,
        reports_error: fn(&str) -> bool,
    ) -> Result<ToolOutput, DownloadError>
    where
        P: Fn(&str) -> Option<ProgressEvent> + Send + Sync + 'static,
    {
        let failed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&failed);
        let sender = progress.clone();
        let tool = command.tool;

        let on_line: LineHandler = Arc::new(move |_stream: StreamKind, line: &str| {
            if reports_error(line) {
                log::warn!("{} reported: {}", tool, line);
                flag.store(true, Ordering::Release);
            }
            if let Some(event) = parse(line) {
                sender.send(event);
            }
        });

        let output = self.runner.run(command, on_line, kill_switch).await?;

        if failed.load(Ordering::Acquire) {
            return Err(DownloadError::ToolReportedFailure {
                tool,
                diagnostics: output.diagnostics(),
            });
        }
        if !output.exited_cleanly() {
            log::warn!(
                "{} exited with {:?} without an error marker, continuing",
                tool,
                output.exit_code
            );
        }

        Ok(output)
    }
}

fn locate_output(output_dir: &Path) -> Result<PathBuf, DownloadError> {
    match find_latest_file(output_dir) {
        Ok(Some(path)) => Ok(path),
        Ok(None) => Err(DownloadError::NoOutputProduced(output_dir.to_path_buf())),
        Err(e) => {
            log::warn!("Failed to scan {}: {}", output_dir.display(), e);
            Err(DownloadError::NoOutputProduced(output_dir.to_path_buf()))
        }
    }
}

/// Best-effort deletion of the pre-conversion file
fn remove_source(artifact: &Path) -> bool {
    match fs_err::remove_file(artifact) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Could not delete original file: {}", e);
            false
        }
    }
}
