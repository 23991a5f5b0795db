use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::core::config::Tool;
use crate::core::process::ProcessError;

/// Structured error type for one download/conversion operation.
///
/// Every variant is terminal: the operation ends with exactly one of these and
/// nothing is retried.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// A required binary is not at its configured path
    #[error("{tool} not found at {}", path.display())]
    ToolMissing { tool: Tool, path: PathBuf },

    /// Output directory does not exist or is not a directory
    #[error("Output folder does not exist: {}", .0.display())]
    OutputFolderInvalid(PathBuf),

    /// The OS refused to start a tool
    #[error("Failed to start {tool}: {source}")]
    ProcessStart {
        tool: Tool,
        #[source]
        source: io::Error,
    },

    /// The tool started but waiting on it failed
    #[error("Lost track of {tool} while it was running: {source}")]
    ProcessLost {
        tool: Tool,
        #[source]
        source: io::Error,
    },

    /// The tool printed its error marker
    #[error("{tool} reported an error:\n{diagnostics}")]
    ToolReportedFailure { tool: Tool, diagnostics: String },

    /// Downloader finished but the output folder holds no file
    #[error("No file was created in {}", .0.display())]
    NoOutputProduced(PathBuf),

    /// Duration probe output is not a positive number of seconds
    #[error("Could not read the duration of {} (ffprobe said '{raw}')", path.display())]
    DurationUnreadable { path: PathBuf, raw: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Another operation is already running")]
    AlreadyRunning,
}

impl DownloadError {
    /// Stable identifier for the failure kind
    pub fn code(&self) -> &'static str {
        match self {
            DownloadError::ToolMissing { tool, .. } => match tool {
                Tool::Downloader => "ERR_YTDLP_MISSING",
                Tool::Transcoder => "ERR_FFMPEG_MISSING",
                Tool::DurationProbe => "ERR_FFPROBE_MISSING",
            },
            DownloadError::OutputFolderInvalid(_) => "ERR_OUTPUT_FOLDER",
            DownloadError::ProcessStart { .. } => "ERR_PROCESS_START",
            DownloadError::ProcessLost { .. } => "ERR_PROCESS_WAIT",
            DownloadError::ToolReportedFailure { tool, .. } => match tool {
                Tool::Downloader => "ERR_YTDLP_FAILED",
                Tool::Transcoder => "ERR_FFMPEG_FAILED",
                Tool::DurationProbe => "ERR_FFPROBE_DURATION",
            },
            DownloadError::NoOutputProduced(_) => "ERR_NO_FILE_CREATED",
            DownloadError::DurationUnreadable { .. } => "ERR_FFPROBE_DURATION",
            DownloadError::Cancelled => "ERR_CANCELLED",
            DownloadError::InvalidRequest(_) => "ERR_INVALID_REQUEST",
            DownloadError::AlreadyRunning => "ERR_BUSY",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Cancelled)
    }
}

impl From<ProcessError> for DownloadError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::ToolMissing { tool, path } => DownloadError::ToolMissing { tool, path },
            ProcessError::Spawn { tool, source } => DownloadError::ProcessStart { tool, source },
            ProcessError::Io { tool, source } => DownloadError::ProcessLost { tool, source },
            ProcessError::Terminated(_) => DownloadError::Cancelled,
            ProcessError::Busy(_) => DownloadError::AlreadyRunning,
        }
    }
}
