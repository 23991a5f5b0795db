//! mediagrab - download and convert media by driving yt-dlp, ffmpeg and ffprobe
//!
//! The library runs the external tools, parses their progress output line by
//! line and sequences a whole download (playlist detection, download, optional
//! conversion to MP4, cleanup) with cancellation at any point.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging and process execution
//! - `download`: yt-dlp handling, progress parsing and the orchestrator
//! - `conversion`: Duration probing and MP4 re-encoding
//! - `cli`: Command-line definition and terminal confirmation

pub mod cli;
pub mod conversion;
pub mod core;
pub mod download;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, KillSwitch, ProcessRunner, ToolPaths, ToolRunner};
pub use download::{Completion, DownloadError, DownloadRequest, MediaFormat, Orchestrator, ProgressEvent};
