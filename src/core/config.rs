use once_cell::sync::Lazy;
use std::env;
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

use crate::core::error::AppError;

/// Directory holding yt-dlp, ffmpeg and ffprobe
/// Read from MEDIAGRAB_TOOLS_DIR environment variable
/// Unset means "next to the running executable"
pub static TOOLS_DIR: Lazy<Option<String>> = Lazy::new(|| env::var("MEDIAGRAB_TOOLS_DIR").ok());

/// Default output folder when the CLI gets no --output
/// Read from DOWNLOAD_FOLDER environment variable
/// Supports tilde (~) expansion for home directory
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "~/Videos".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: mediagrab.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "mediagrab.log".to_string()));

/// Log level for console and file output
/// Read from LOG_LEVEL environment variable (error, warn, info, debug, trace)
/// Default: info
pub static LOG_LEVEL: Lazy<String> = Lazy::new(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

/// External tools the pipeline shells out to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Tool {
    #[strum(serialize = "yt-dlp")]
    Downloader,
    #[strum(serialize = "ffmpeg")]
    Transcoder,
    #[strum(serialize = "ffprobe")]
    DurationProbe,
}

impl Tool {
    /// File name of the executable on the current platform
    pub fn executable_name(&self) -> String {
        format!("{}{}", self, env::consts::EXE_SUFFIX)
    }
}

/// Resolved locations of the three external binaries.
///
/// Passed explicitly into the orchestrator; nothing in the pipeline looks the
/// tools up on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub downloader: PathBuf,
    pub transcoder: PathBuf,
    pub prober: PathBuf,
}

impl ToolPaths {
    /// All three tools inside one directory, named per platform convention
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            downloader: dir.join(Tool::Downloader.executable_name()),
            transcoder: dir.join(Tool::Transcoder.executable_name()),
            prober: dir.join(Tool::DurationProbe.executable_name()),
        }
    }

    /// Resolves the tools directory from MEDIAGRAB_TOOLS_DIR, or the directory
    /// containing the current executable when unset.
    pub fn from_env() -> Result<Self, AppError> {
        let dir = match TOOLS_DIR.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(dir) => expand_path(dir),
            None => {
                let exe = env::current_exe()?;
                exe.parent()
                    .map(Path::to_path_buf)
                    .ok_or_else(|| AppError::Config(format!("Cannot get parent directory of {}", exe.display())))?
            }
        };
        Ok(Self::in_dir(dir))
    }

    /// Path of the given tool
    pub fn path_of(&self, tool: Tool) -> &Path {
        match tool {
            Tool::Downloader => &self.downloader,
            Tool::Transcoder => &self.transcoder,
            Tool::DurationProbe => &self.prober,
        }
    }
}

/// Expands `~` and environment references in a user-supplied path
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw.trim()).to_string())
}

/// Default output directory with `~` expanded
pub fn default_output_dir() -> PathBuf {
    expand_path(&DOWNLOAD_FOLDER)
}

/// Parses LOG_LEVEL into a log filter
pub fn log_level_filter(raw: &str) -> Result<log::LevelFilter, AppError> {
    raw.trim()
        .parse::<log::LevelFilter>()
        .map_err(|_| AppError::Config(format!("Unknown LOG_LEVEL '{}'", raw)))
}
