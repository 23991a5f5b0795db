//! Video re-encoding to MP4 (H.264 + AAC)

use std::path::{Path, PathBuf};

use crate::core::config::Tool;
use crate::core::process::ToolCommand;

/// Extension of the converted file
pub const TARGET_CONTAINER: &str = "mp4";

/// Where the converted file goes: same folder and stem, `.mp4` extension
pub fn converted_path(input: &Path) -> PathBuf {
    input.with_extension(TARGET_CONTAINER)
}

/// ffmpeg invocation re-encoding `input` into `output`.
///
/// `-progress pipe:1` makes ffmpeg print `key=value` progress blocks on stdout,
/// `-nostats` removes the interactive status line, `-y` overwrites.
pub fn transcode_command(transcoder: &Path, input: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new(Tool::Transcoder, transcoder)
        .arg("-i")
        .arg(input.to_string_lossy())
        .args(["-c:v", "libx264", "-preset", "medium", "-c:a", "aac"])
        .args(["-progress", "pipe:1", "-nostats", "-y"])
        .arg(output.to_string_lossy())
        .streaming_stdout()
}
