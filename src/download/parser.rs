//! Line parsing for yt-dlp and ffmpeg output
//!
//! Pure text processing: every function takes a single output line and either
//! extracts a [`ProgressEvent`] or returns `None`. Unrecognized lines are
//! ignored.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::download::progress::{
    ProgressEvent, PHASE_CONVERSION_COMPLETE, PHASE_CONVERTING, PHASE_EXTRACTING_AUDIO, PHASE_MERGING,
};

/// Marker yt-dlp prints in front of fatal errors
pub const DOWNLOADER_ERROR_MARKER: &str = "ERROR:";

/// Marker looked for in ffmpeg output (case-sensitive)
pub const TRANSCODER_ERROR_MARKER: &str = "Error";

static DESTINATION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"Destination:\s(.+)").expect("destination regex"));

/// "[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10"
static PERCENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[download\]\s+(\d{1,3}\.\d)%\s+of\s+([\d.]+(?:KiB|MiB|GiB|KB|MB|GB))").expect("percent regex")
});

/// ffmpeg `-progress` timestamps: "00:01:02.700000", occasionally negative
static TIMESTAMP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(-)?(\d+):(\d{2}):(\d{2}(?:\.\d+)?)$").expect("timestamp regex"));

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}

/// Last path component, accepting both `/` and `\` separators
fn file_name_component(path: &str) -> &str {
    let path = path.trim();
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Parses one line of yt-dlp output.
///
/// Rules are tried in order and the first match wins:
/// destination announcement, percentage with size, audio extraction,
/// format merge, bare `[download] 100%`.
pub fn parse_downloader_line(line: &str) -> Option<ProgressEvent> {
    if contains_ignore_case(line, "[download]") {
        if let Some(caps) = DESTINATION_REGEX.captures(line) {
            let name = file_name_component(&caps[1]);
            return Some(ProgressEvent::new(0.0, name));
        }
    }

    if let Some(caps) = PERCENT_REGEX.captures(line) {
        match caps[1].parse::<f64>() {
            Ok(percent) if percent <= 100.0 => {
                return Some(ProgressEvent::new(percent, "").with_size(&caps[2]));
            }
            _ => log::debug!("Ignoring malformed percentage in: {}", line),
        }
    }

    if contains_ignore_case(line, "[ExtractAudio]") {
        return Some(ProgressEvent::new(100.0, PHASE_EXTRACTING_AUDIO));
    }

    if contains_ignore_case(line, "Merging formats") {
        return Some(ProgressEvent::new(99.0, PHASE_MERGING));
    }

    if line.contains("[download] 100%") {
        return Some(ProgressEvent::new(100.0, ""));
    }

    log::trace!("yt-dlp: {}", line);
    None
}

/// True when a yt-dlp line carries its error marker
pub fn downloader_reports_error(line: &str) -> bool {
    line.contains(DOWNLOADER_ERROR_MARKER)
}

/// True when an ffmpeg line carries its error marker
pub fn transcoder_reports_error(line: &str) -> bool {
    line.contains(TRANSCODER_ERROR_MARKER)
}

/// Parses an `[-]H:MM:SS[.fraction]` timestamp into seconds
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let caps = TIMESTAMP_REGEX.captures(raw.trim())?;
    let hours: f64 = caps[2].parse().ok()?;
    let minutes: f64 = caps[3].parse().ok()?;
    let seconds: f64 = caps[4].parse().ok()?;
    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    Some(if caps.get(1).is_some() { -total } else { total })
}

/// Turns ffmpeg `-progress pipe:1` lines into percentages of a known duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodeProgress {
    total_secs: f64,
}

impl TranscodeProgress {
    /// # Arguments
    /// * `total_secs` - Duration reported by ffprobe, expected to be positive
    pub fn new(total_secs: f64) -> Self {
        Self { total_secs }
    }

    pub fn total_secs(&self) -> f64 {
        self.total_secs
    }

    pub fn parse_line(&self, line: &str) -> Option<ProgressEvent> {
        let line = line.trim();

        if let Some(raw) = line.strip_prefix("out_time=") {
            if self.total_secs.is_nan() || self.total_secs <= 0.0 {
                return None;
            }
            // "N/A" and other placeholders fall through to None
            let elapsed = parse_timestamp(raw)?;
            let percent = (elapsed / self.total_secs * 100.0).clamp(0.0, 100.0);
            return Some(ProgressEvent::new(percent, PHASE_CONVERTING));
        }

        if line.contains("progress=end") {
            return Some(ProgressEvent::new(100.0, PHASE_CONVERSION_COMPLETE));
        }

        log::trace!("ffmpeg: {}", line);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_percentage_line() {
        let event = parse_downloader_line("[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10").unwrap();
        assert_eq!(event, ProgressEvent::new(45.2, "").with_size("10.00MiB"));
    }

    #[test]
    fn test_percentage_line_is_case_insensitive() {
        let event = parse_downloader_line("[DOWNLOAD]   3.0% of 1.5GB").unwrap();
        assert_eq!(event.percent, 3.0);
        assert_eq!(event.size, "1.5GB");
    }

    #[test]
    fn test_percentage_above_hundred_is_rejected() {
        assert_eq!(parse_downloader_line("[download] 150.0% of 10.00MiB"), None);
    }

    #[test]
    fn test_destination_line_yields_file_name() {
        let event = parse_downloader_line("[download] Destination: /home/me/Videos/My Clip.webm").unwrap();
        assert_eq!(event, ProgressEvent::new(0.0, "My Clip.webm"));

        let event = parse_downloader_line(r"[download] Destination: C:\Users\me\Videos\clip.f137.mp4").unwrap();
        assert_eq!(event.phase, "clip.f137.mp4");
    }

    #[test]
    fn test_destination_requires_download_tag() {
        let event = parse_downloader_line("[ExtractAudio] Destination: /tmp/song.mp3").unwrap();
        assert_eq!(event.phase, PHASE_EXTRACTING_AUDIO);
        assert_eq!(parse_downloader_line("[Merger] Destination: /tmp/x.mp4"), None);
    }

    #[test]
    fn test_phase_lines() {
        assert_eq!(
            parse_downloader_line("[Merger] Merging formats into \"/tmp/clip.webm\""),
            Some(ProgressEvent::new(99.0, PHASE_MERGING))
        );
        assert_eq!(
            parse_downloader_line("[download] 100% of   12.34MiB in 00:00:03"),
            Some(ProgressEvent::new(100.0, ""))
        );
    }

    #[test]
    fn test_unrelated_lines_are_ignored() {
        assert_eq!(parse_downloader_line("[youtube] abc123: Downloading webpage"), None);
        assert_eq!(parse_downloader_line(""), None);
    }

    #[test]
    fn test_error_markers() {
        assert!(downloader_reports_error("ERROR: [youtube] abc: Video unavailable"));
        assert!(!downloader_reports_error("WARNING: falling back to generic extractor"));
        assert!(transcoder_reports_error("Error while decoding stream #0:1"));
        assert!(!transcoder_reports_error("error in lowercase is not the marker"));
    }

    #[test]
    fn test_parse_timestamp() {
        let secs = parse_timestamp("00:01:02.700000").unwrap();
        assert!((secs - 62.7).abs() < 1e-9);
        assert_eq!(parse_timestamp("1:00:00"), Some(3600.0));
        assert_eq!(parse_timestamp("-00:00:01.5"), Some(-1.5));
        assert_eq!(parse_timestamp("N/A"), None);
        assert_eq!(parse_timestamp("12:3:45"), None);
    }

    #[test]
    fn test_transcode_progress() {
        let progress = TranscodeProgress::new(125.40);

        let event = progress.parse_line("out_time=00:01:02.700000").unwrap();
        assert_eq!(event.phase, PHASE_CONVERTING);
        assert!((event.percent - 50.0).abs() < 1e-9);

        assert_eq!(progress.parse_line("out_time=00:05:00.000000").unwrap().percent, 100.0);
        assert_eq!(progress.parse_line("out_time=-00:00:03.000000").unwrap().percent, 0.0);
        assert_eq!(progress.parse_line("out_time=N/A"), None);
        assert_eq!(progress.parse_line("out_time_ms=62700000"), None);
        assert_eq!(
            progress.parse_line("progress=end"),
            Some(ProgressEvent::new(100.0, PHASE_CONVERSION_COMPLETE))
        );
        assert_eq!(progress.parse_line("progress=continue"), None);
    }

    #[test]
    fn test_transcode_progress_is_monotonic_and_capped() {
        let progress = TranscodeProgress::new(125.40);
        let mut last = 0.0;

        // 0 s to 200 s in tenths, well past the end of the media
        for tenths in 0..=2000u32 {
            let line = format!(
                "out_time={:02}:{:02}:{:09.6}",
                tenths / 36_000,
                (tenths / 600) % 60,
                f64::from(tenths % 600) / 10.0
            );
            let percent = progress.parse_line(&line).unwrap().percent;
            assert!(percent >= last, "{} went back from {} to {}", line, last, percent);
            assert!((0.0..=100.0).contains(&percent), "{} gave {}", line, percent);
            last = percent;
        }

        assert_eq!(last, 100.0);
    }

    #[test]
    fn test_transcode_progress_without_duration() {
        assert_eq!(TranscodeProgress::new(0.0).parse_line("out_time=00:00:01.000000"), None);
    }
}
