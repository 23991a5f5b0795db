use std::path::{Path, PathBuf};
use strum::{Display, EnumString};

use crate::download::error::DownloadError;

/// What the user wants to end up with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum MediaFormat {
    /// Audio only, extracted to mp3 by the downloader
    #[strum(to_string = "audio", serialize = "mp3")]
    Audio,
    /// Video, optionally transcoded to mp4
    #[strum(to_string = "video", serialize = "mp4")]
    Video,
}

impl MediaFormat {
    /// Container extension of the final file
    pub fn container(&self) -> &'static str {
        match self {
            MediaFormat::Audio => "mp3",
            MediaFormat::Video => "mp4",
        }
    }
}

/// Parameters of one download operation, fixed once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    url: String,
    output_dir: PathBuf,
    format: MediaFormat,
}

impl DownloadRequest {
    /// # Arguments
    /// * `url` - Source URL, surrounding whitespace is dropped
    /// * `output_dir` - Folder the downloader writes into
    /// * `format` - Audio or video
    ///
    /// # Returns
    /// * `Err(DownloadError::InvalidRequest)` - URL is empty after trimming
    pub fn new(url: &str, output_dir: impl Into<PathBuf>, format: MediaFormat) -> Result<Self, DownloadError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DownloadError::InvalidRequest("URL is empty".to_string()));
        }
        Ok(Self {
            url: url.to_string(),
            output_dir: output_dir.into(),
            format,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }
}
