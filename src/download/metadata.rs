//! Media metadata lookup and downloaded-file discovery

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::process::{discard_lines, KillSwitch, ToolRunner};
use crate::download::ytdlp::metadata_command;

/// Subset of the `yt-dlp -J` document the app shows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "thumbnail")]
    pub thumbnail_url: Option<String>,
}

/// Parses `yt-dlp -J` output
pub fn parse_metadata(stdout: &str) -> Option<VideoMetadata> {
    match serde_json::from_str::<VideoMetadata>(stdout.trim()) {
        Ok(meta) => Some(meta),
        Err(e) => {
            log::debug!("Failed to parse yt-dlp metadata: {}", e);
            None
        }
    }
}

/// Looks up title and thumbnail for a URL.
///
/// Any failure (tool missing, non-JSON output, termination) collapses to `None`.
pub async fn fetch_metadata(runner: &dyn ToolRunner, downloader: &Path, url: &str) -> Option<VideoMetadata> {
    let command = metadata_command(downloader, url.trim());
    match runner.run(&command, discard_lines(), &KillSwitch::new()).await {
        Ok(output) => parse_metadata(&output.stdout_text()),
        Err(e) => {
            log::warn!("Metadata lookup for {} failed: {}", url, e);
            None
        }
    }
}

/// Most recently modified regular file directly inside `dir`.
///
/// On equal modification times the entry enumerated first wins. This is a
/// heuristic: a file written concurrently by another program can be picked
/// instead of the download.
pub fn find_latest_file(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;

    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                log::debug!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let newer = match &latest {
            Some((best, _)) => modified > *best,
            None => true,
        };
        if newer {
            latest = Some((modified, entry.path()));
        }
    }

    Ok(latest.map(|(_, path)| path))
}

/// Lowercased extension without the dot, empty when there is none
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
