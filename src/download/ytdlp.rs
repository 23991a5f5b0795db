//! yt-dlp command lines and the playlist probe

use std::path::Path;

use crate::core::config::Tool;
use crate::core::process::{discard_lines, KillSwitch, ProcessError, ToolCommand, ToolRunner};
use crate::download::error::DownloadError;
use crate::download::request::{DownloadRequest, MediaFormat};

/// Format selector for video: best video + best audio, or best single file
pub const VIDEO_FORMAT_SELECTOR: &str = "bv*+ba/b";

/// Output template handed to `-o`.
///
/// Absolute directory with forward slashes only, followed by
/// `/%(title)s.%(ext)s`, so the downloader names files after the media title.
pub fn output_template(dir: &Path) -> String {
    let absolute = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
    let normalized = absolute.to_string_lossy().replace('\\', "/");
    format!("{}/%(title)s.%(ext)s", normalized.trim_end_matches('/'))
}

/// Builds the download command for a request.
///
/// # Arguments
/// * `downloader` - Path of the yt-dlp binary
/// * `request` - URL, output folder and format
/// * `expand_playlist` - Download every entry instead of passing `--no-playlist`
pub fn download_command(downloader: &Path, request: &DownloadRequest, expand_playlist: bool) -> ToolCommand {
    let mut command = ToolCommand::new(Tool::Downloader, downloader);

    command = match request.format() {
        MediaFormat::Audio => command.args(["-x", "--audio-format", "mp3", "--audio-quality", "0"]),
        MediaFormat::Video => command.args(["-f", VIDEO_FORMAT_SELECTOR]),
    };

    if !expand_playlist {
        command = command.arg("--no-playlist");
    }

    command
        .arg("-o")
        .arg(output_template(request.output_dir()))
        .arg(request.url())
        .streaming_stdout()
}

pub fn playlist_probe_command(downloader: &Path, url: &str) -> ToolCommand {
    ToolCommand::new(Tool::Downloader, downloader).args(["--flat-playlist", "--dump-single-json", url])
}

pub fn metadata_command(downloader: &Path, url: &str) -> ToolCommand {
    ToolCommand::new(Tool::Downloader, downloader).args(["-J", url])
}

/// True when the `--dump-single-json` output is an object with an `entries` key
pub fn is_playlist_json(stdout: &str) -> bool {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return false;
    }
    match serde_json::from_str::<serde_json::Value>(stdout) {
        Ok(json) => json.as_object().is_some_and(|o| o.contains_key("entries")),
        Err(e) => {
            log::debug!("Playlist probe output is not JSON: {}", e);
            false
        }
    }
}

/// Asks yt-dlp whether the URL is a playlist.
///
/// Fails open: any probe failure means "not a playlist". Only a termination
/// request is reported, as `DownloadError::Cancelled`.
pub async fn probe_playlist(
    runner: &dyn ToolRunner,
    downloader: &Path,
    url: &str,
    kill_switch: &KillSwitch,
) -> Result<bool, DownloadError> {
    let command = playlist_probe_command(downloader, url);

    match runner.run(&command, discard_lines(), kill_switch).await {
        Ok(output) => {
            let playlist = is_playlist_json(&output.stdout_text());
            log::debug!("Playlist probe for {}: {}", url, playlist);
            Ok(playlist)
        }
        Err(ProcessError::Terminated(_)) => Err(DownloadError::Cancelled),
        Err(e) => {
            log::warn!("Playlist probe failed, treating as single video: {}", e);
            Ok(false)
        }
    }
}
